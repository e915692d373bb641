//! Command-line interface for release-fetch.
//!
//! This module provides the `dl`, `purge` and `config` commands.

mod commands;

pub use commands::{Cli, Commands, run_command};
