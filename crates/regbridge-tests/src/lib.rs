//! regbridge End-to-End Test Infrastructure
//!
//! Sessions are driven against scripted stand-ins for the registration tool,
//! so the full resolve/invoke/parse/relocate/cleanup cycle runs without a
//! real elastix installation.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p regbridge-tests
//! ```
//!
//! The fake tools are POSIX shell scripts; the end-to-end suites are
//! compiled on Unix only.

pub mod fixtures;
pub mod harness;

pub use harness::{FakeTool, ResultImage, TestWorkspace, ToolInvocation};
