//! Command handlers
//!
//! Batch commands process every file even when some fail, log each failure
//! with its file name, print a summary and report an error at the end.

pub mod compress;
pub mod decompress;
pub mod info;
pub mod verify;

use asura_formats::ChunkRegistry;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::error;

use crate::config::{Cli, Command};
use crate::error::CliError;
use crate::output::{OutputStyle, format_error, format_success};

/// Dispatch a parsed command line
pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let registry = ChunkRegistry::default();
    match &cli.command {
        Command::Info { files, chunks } => info::handle(files, *chunks, cli, &registry)?,
        Command::Verify { files } => verify::handle(files, cli, &registry)?,
        Command::Decompress { input, output } => {
            decompress::handle(input, output, cli)?;
        }
        Command::Compress {
            input,
            output,
            compression,
        } => {
            let options = compression.to_options()?;
            compress::handle(input, output, &options, cli)?;
        }
    }
    Ok(())
}

/// Open a file for buffered reading
pub(crate) fn open_input(path: &Path) -> Result<BufReader<File>, CliError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| CliError::io(path, e))
}

/// Outcome of one file in a batch
#[derive(Debug)]
pub struct FileOutcome<T> {
    /// File that was processed
    pub path: PathBuf,
    /// Result for the file
    pub result: Result<T, CliError>,
}

/// Run `f` on every file, logging failures instead of stopping
pub fn run_batch<T, F>(files: &[PathBuf], mut f: F) -> Vec<FileOutcome<T>>
where
    F: FnMut(&Path) -> Result<T, CliError>,
{
    files
        .iter()
        .map(|path| {
            let result = f(path);
            if let Err(e) = &result {
                error!("{e}");
            }
            FileOutcome {
                path: path.clone(),
                result,
            }
        })
        .collect()
}

/// Print the batch summary and turn failures into an error
pub fn finish_batch<T>(outcomes: &[FileOutcome<T>], verb: &str, show: bool) -> Result<(), CliError> {
    let total = outcomes.len();
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();

    if show {
        let style = OutputStyle::new();
        let line = format!("{verb} {} of {total} files", total - failed);
        if failed == 0 {
            println!("{}", format_success(&line, &style));
        } else {
            println!("{}", format_error(&format!("{line}, {failed} failed"), &style));
        }
    }

    if failed > 0 {
        return Err(CliError::BatchFailed { failed, total });
    }
    Ok(())
}
