//! CLI argument definitions for the regbridge command-line interface.
//!
//! All `#[derive(Parser)]` and `#[derive(Subcommand)]` types are defined here,
//! keeping `main.rs` focused on dispatch logic.

use clap::{Parser, Subcommand};

/// regbridge - run image registrations without leftover files
#[derive(Parser)]
#[command(name = "regbridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a moving image onto a fixed image
    Register {
        /// Registration parameter file
        #[arg(short, long)]
        params: String,

        /// Fixed (reference) image
        #[arg(short, long)]
        fixed: String,

        /// Moving image to align onto the fixed image
        #[arg(short, long)]
        moving: String,

        /// Where to write the registered image (default: discard it)
        #[arg(short, long)]
        out: Option<String>,

        /// Show the registration tool's own output
        #[arg(short, long)]
        verbose: bool,

        /// Path to the registration tool executable
        #[arg(long)]
        tool: Option<String>,

        /// Kill the registration tool after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output machine-readable JSON (no colored output)
        #[arg(long)]
        json: bool,
    },

    /// Parse an existing result artifact and print it as JSON
    Inspect {
        #[command(subcommand)]
        command: InspectCommands,
    },

    /// Check that the registration tool can be found
    Doctor {
        /// Path to the registration tool executable
        #[arg(long)]
        tool: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum InspectCommands {
    /// Parse a TransformParameters file
    Transform {
        /// Path to the transform parameter file
        file: String,
    },

    /// Parse an IterationInfo log
    Iterations {
        /// Path to the iteration log
        file: String,
    },
}
