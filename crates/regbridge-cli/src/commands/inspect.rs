//! Inspect command implementation
//!
//! Runs the result parsers on artifacts left by an earlier tool run.

use anyhow::{Context, Result};
use regbridge::{parse_iterations, parse_transform};
use std::path::Path;
use std::process::ExitCode;

/// Print a transform parameter file as JSON.
pub fn transform(file: &str) -> Result<ExitCode> {
    let record = parse_transform(Path::new(file))
        .with_context(|| format!("Failed to read transform file: {}", file))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(ExitCode::SUCCESS)
}

/// Print an iteration log as JSON.
pub fn iterations(file: &str) -> Result<ExitCode> {
    let record = parse_iterations(Path::new(file))
        .with_context(|| format!("Failed to read iteration log: {}", file))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(ExitCode::SUCCESS)
}
