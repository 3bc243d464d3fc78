//! Error types for the `asura` command-line tool.

use asura_formats::AsuraError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid option value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A file could not be opened, read or written
    #[error("{}: {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The archive library rejected a file
    #[error("{}: {source}", path.display())]
    Archive {
        /// File being processed
        path: PathBuf,
        /// Underlying format error
        #[source]
        source: AsuraError,
    },

    /// A rebuilt archive differs from its source
    #[error("{}: {detail}", path.display())]
    Mismatch {
        /// File being verified
        path: PathBuf,
        /// What differed
        detail: String,
    },

    /// Input has the wrong archive kind for the command
    #[error("{}: expected {expected} archive, found {found}", path.display())]
    WrongKind {
        /// File being processed
        path: PathBuf,
        /// Kind the command needs
        expected: String,
        /// Kind found in the file
        found: String,
    },

    /// Some files of a batch failed
    #[error("{failed} of {total} files failed")]
    BatchFailed {
        /// Number of failed files
        failed: usize,
        /// Number of files processed
        total: usize,
    },
}

impl CliError {
    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a path to an archive error
    pub fn archive(path: impl Into<PathBuf>, source: AsuraError) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }
}
