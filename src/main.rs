//! release-fetch - download releases from a streaming catalog.
//!
//! Resolves album, track, artist, label and playlist URLs, picks the best
//! available quality, lays files out from naming templates, tags them and
//! remembers finished releases so re-runs skip them.

pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod download;
pub mod error;
pub mod metadata;
pub mod model;
pub mod organizer;
pub mod quality;
pub mod template;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<ExitCode> {
    let args = cli::Cli::parse();

    // Initialize logging
    let directive = if args.verbose {
        "release_fetch=debug"
    } else {
        "release_fetch=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    if cli::run_command(&args)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
