//! Asura command-line tool library
//!
//! This library provides the configuration, output helpers and command
//! handlers behind the `asura` binary.

pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use config::{Cli, Command, CompressionArgs, LogLevel};
pub use error::CliError;
pub use output::OutputFormat;
