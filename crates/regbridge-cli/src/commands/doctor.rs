//! Doctor command implementation
//!
//! Checks that the registration tool is installed and the temp directory is
//! writable.

use anyhow::Result;
use colored::Colorize;
use regbridge::{Invoker, InvokerConfig, TempSpace};
use std::process::{Command, ExitCode};

/// Run the doctor command
///
/// # Returns
/// Exit code: 0 if all checks pass, 1 if any fail
pub fn run(tool: Option<&str>) -> Result<ExitCode> {
    println!("{}", "regbridge Doctor".cyan().bold());
    println!("{}", "================".cyan());
    println!();

    let mut all_ok = true;

    println!("{}", "Versions:".bold());
    println!(
        "  {} regbridge-cli v{}",
        "->".green(),
        env!("CARGO_PKG_VERSION")
    );
    println!();

    println!("{}", "Dependencies:".bold());
    let mut config = InvokerConfig::default();
    if let Some(tool) = tool {
        config = config.tool_path(tool);
    }
    match Invoker::with_config(config).find_tool() {
        Ok(path) => {
            tracing::debug!(tool = %path.display(), "found registration tool");
            let version = tool_version(&path).unwrap_or_else(|| "unknown version".to_string());
            println!("  {} {} ({})", "ok".green(), path.display(), version);
        }
        Err(e) => {
            println!("  {} {}", "!!".red(), e);
            all_ok = false;
        }
    }
    println!();

    println!("{}", "Temporary files:".bold());
    let space = TempSpace::default();
    match space.acquire_temp_dir() {
        Ok(mut dir) => {
            dir.release();
            println!(
                "  {} {} is writable",
                "ok".green(),
                space.root().display()
            );
        }
        Err(e) => {
            println!("  {} {}", "!!".red(), e);
            all_ok = false;
        }
    }
    println!();

    if all_ok {
        println!("{} All checks passed!", "SUCCESS".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} Some checks failed. See above for details.",
            "WARNING".yellow().bold()
        );
        Ok(ExitCode::from(1))
    }
}

fn parse_tool_version(output: &str) -> Option<String> {
    // "elastix version: 5.1.0"
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("elastix version:"))
        .map(|v| v.trim().to_string())
}

fn tool_version(path: &std::path::Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_tool_version(&String::from_utf8_lossy(&output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_version() {
        assert_eq!(
            parse_tool_version("elastix version: 5.1.0\n"),
            Some("5.1.0".to_string())
        );
        assert_eq!(parse_tool_version("something else"), None);
    }
}
