//! regbridge CLI library.
//!
//! Command implementations and logging setup for the `regbridge` binary.

pub mod cli_args;
pub mod commands;
pub mod logging;
