//! Tooling & Integration Layer
//!
//! Command-line front end for running request batches through the scheduler.

pub mod cli;

pub use cli::{Cli, CliContext, Commands};
