//! Command-line configuration.
//!
//! Every option can also be set through an `ASURA_*` environment variable;
//! explicit arguments win over the environment, which wins over defaults.

use asura_formats::zbb::{DEFAULT_BLOCK_SIZE, DEFAULT_LEVEL};
use asura_formats::{ReadOptions, ZbbOptions};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::error::CliError;
use crate::output::OutputFormat;

/// Top-level command line
#[derive(Debug, Clone, Parser)]
#[command(
    name = "asura",
    about = "Inspect, verify and (de)compress Asura archives",
    version,
    long_about = "A command-line tool for Asura chunk archives (\"Asura   \") and their \
                  block-compressed Zbb envelopes (\"AsuraZbb\")."
)]
pub struct Cli {
    /// Set the logging level (RUST_LOG overrides it)
    #[arg(
        short,
        long,
        value_enum,
        global = true,
        env = "ASURA_LOG_LEVEL",
        default_value = "warn"
    )]
    pub log_level: LogLevel,

    /// Read chunk headers only, deferring payloads
    #[arg(long, global = true, env = "ASURA_SPARSE")]
    pub sparse: bool,

    /// Output format
    #[arg(
        short,
        long,
        value_enum,
        global = true,
        env = "ASURA_FORMAT",
        default_value = "text"
    )]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Read options for folder archives
    pub const fn read_options(&self) -> ReadOptions {
        if self.sparse {
            ReadOptions::sparse()
        } else {
            ReadOptions::eager()
        }
    }
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show archive kind, chunk counts or the block table
    Info {
        /// Archives to inspect
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// List every chunk instead of per-type counts
        #[arg(long)]
        chunks: bool,
    },

    /// Check that archives rebuild to identical bytes
    Verify {
        /// Archives to verify
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Unwrap a Zbb envelope
    Decompress {
        /// Zbb envelope to read
        input: PathBuf,

        /// Where to write the wrapped archive
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Wrap a folder archive in a Zbb envelope
    Compress {
        /// Folder archive to read
        input: PathBuf,

        /// Where to write the envelope
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        compression: CompressionArgs,
    },
}

/// Envelope compression settings
#[derive(Debug, Clone, Copy, Args)]
pub struct CompressionArgs {
    /// Uncompressed block size in KiB
    #[arg(long, env = "ASURA_BLOCK_SIZE", default_value_t = DEFAULT_BLOCK_SIZE / 1024)]
    pub block_size: usize,

    /// zlib compression level (0-9)
    #[arg(long, env = "ASURA_LEVEL", default_value_t = DEFAULT_LEVEL)]
    pub level: u32,

    /// Finish the zlib stream after every block
    #[arg(long, env = "ASURA_INDEPENDENT_BLOCKS")]
    pub independent_blocks: bool,
}

impl Default for CompressionArgs {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE / 1024,
            level: DEFAULT_LEVEL,
            independent_blocks: false,
        }
    }
}

impl CompressionArgs {
    /// Validate and convert into library options
    pub fn to_options(&self) -> Result<ZbbOptions, CliError> {
        let bytes = self
            .block_size
            .checked_mul(1024)
            .ok_or_else(|| CliError::Config(format!("block size {} KiB is too large", self.block_size)))?;
        let options = ZbbOptions::new()
            .with_block_size(bytes)
            .and_then(|options| options.with_level(self.level))
            .map_err(|e| CliError::Config(e.to_string()))?
            .with_independent_blocks(self.independent_blocks);
        Ok(options)
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Everything, including per-chunk and per-block records
    Trace,
    /// Per-archive summaries
    Debug,
    /// Progress messages
    Info,
    /// Recoverable anomalies
    Warn,
    /// Failures only
    Error,
}

impl LogLevel {
    /// Directive for `tracing_subscriber::EnvFilter`
    pub const fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}
