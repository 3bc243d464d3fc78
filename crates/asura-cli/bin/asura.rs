//! `asura` binary entry point.
//!
//! Parses the command line, installs the tracing subscriber and runs the
//! requested command. Logs go to stderr so JSON output stays clean.

use anyhow::Result;
use asura_cli::{Cli, commands};
use clap::Parser;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.as_filter())),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    commands::run(&cli)
}
