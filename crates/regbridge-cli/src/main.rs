//! regbridge CLI - run image registrations from the command line
//!
//! This binary drives the registration tool through a regbridge session and
//! exposes the result parsers for ad-hoc inspection.

use clap::Parser;
use std::process::ExitCode;

use regbridge_cli::cli_args::{Cli, Commands, InspectCommands};
use regbridge_cli::commands::{self, register::RegisterArgs};
use regbridge_cli::logging;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        eprintln!("{}: {}", colored::Colorize::red("error"), e);
        return ExitCode::from(2);
    }

    let result = match cli.command {
        Commands::Register {
            params,
            fixed,
            moving,
            out,
            verbose,
            tool,
            timeout,
            json,
        } => commands::register::run(&RegisterArgs {
            params,
            fixed,
            moving,
            out,
            verbose,
            tool,
            timeout,
            json,
        }),
        Commands::Inspect { command } => match command {
            InspectCommands::Transform { file } => commands::inspect::transform(&file),
            InspectCommands::Iterations { file } => commands::inspect::iterations(&file),
        },
        Commands::Doctor { tool } => commands::doctor::run(tool.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_register() {
        let cli = Cli::try_parse_from([
            "regbridge",
            "register",
            "--params",
            "params.txt",
            "--fixed",
            "fixed.png",
            "--moving",
            "moving.png",
            "--out",
            "/tmp/out.png",
            "--timeout",
            "60",
        ])
        .unwrap();
        match cli.command {
            Commands::Register {
                params,
                out,
                timeout,
                verbose,
                json,
                ..
            } => {
                assert_eq!(params, "params.txt");
                assert_eq!(out.as_deref(), Some("/tmp/out.png"));
                assert_eq!(timeout, Some(60));
                assert!(!verbose);
                assert!(!json);
            }
            _ => panic!("expected register command"),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_cli_parses_inspect_iterations() {
        let cli = Cli::try_parse_from([
            "regbridge",
            "--log-level",
            "debug",
            "inspect",
            "iterations",
            "IterationInfo.0.R0.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Inspect {
                command: InspectCommands::Iterations { file },
            } => assert_eq!(file, "IterationInfo.0.R0.txt"),
            _ => panic!("expected inspect iterations command"),
        }
        assert_eq!(cli.log_level, "debug");
    }
}
