//! Tracing subscriber setup.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

const LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Builds the filter: `RUST_LOG` wins, otherwise `level` applies to the
/// regbridge crates only.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    if !LEVELS.contains(&level) {
        return Err(anyhow!(
            "unknown log level: {} (expected one of {})",
            level,
            LEVELS.join(", ")
        ));
    }
    Ok(EnvFilter::new(format!(
        "regbridge={level},regbridge_cli={level}"
    )))
}

/// Installs a stderr `fmt` subscriber.
pub fn init(level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}
