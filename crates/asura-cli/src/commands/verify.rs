//! `asura verify`: rebuild archives and compare bytes
//!
//! Folder archives are parsed and rebuilt. Zbb envelopes are decompressed,
//! the wrapped archive is verified the same way, then it is recompressed with
//! the envelope's block size and decompressed again.

use asura_formats::zbb::{MAX_BLOCK_SIZE, MIN_BLOCK_SIZE};
use asura_formats::{
    ArchiveType, AsuraError, AsuraFormat, ChunkRegistry, FolderArchive, ZbbArchive, ZbbOptions,
};
use serde::Serialize;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{finish_batch, run_batch};
use crate::config::Cli;
use crate::error::CliError;
use crate::output::{OutputStyle, format_error, format_success, print_json};

/// Result of verifying one file
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    /// Path as given on the command line
    pub path: PathBuf,
    /// Whether every check passed
    pub ok: bool,
    /// Outermost archive kind, if it could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_type: Option<String>,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Verify one file, returning its archive kind
pub fn verify_file(path: &Path, registry: &ChunkRegistry) -> Result<ArchiveType, CliError> {
    let data = std::fs::read(path).map_err(|e| CliError::io(path, e))?;
    let kind = ArchiveType::read(&mut Cursor::new(&data)).map_err(|e| CliError::archive(path, e))?;

    match kind {
        ArchiveType::Folder => verify_folder(path, &data, registry)?,
        ArchiveType::Zbb => verify_envelope(path, &data, registry)?,
        other => return Err(CliError::archive(path, AsuraError::Unsupported(other).at(0))),
    }
    info!("{}: {kind} archive verified", path.display());
    Ok(kind)
}

fn verify_folder(path: &Path, data: &[u8], registry: &ChunkRegistry) -> Result<(), CliError> {
    FolderArchive::verify_round_trip(data, registry).map_err(|e| match e {
        AsuraError::RoundTripMismatch { .. } => CliError::Mismatch {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
        other => CliError::archive(path, other),
    })
}

fn verify_envelope(path: &Path, data: &[u8], registry: &ChunkRegistry) -> Result<(), CliError> {
    let archive_err = |e| CliError::archive(path, e);

    let mut reader = Cursor::new(data);
    let envelope = ZbbArchive::read(&mut reader).map_err(archive_err)?;
    let inner = envelope.decompress(&mut reader, None).map_err(archive_err)?;

    match ArchiveType::read(&mut Cursor::new(&inner)).map_err(archive_err)? {
        ArchiveType::Folder => verify_folder(path, &inner, registry)?,
        ArchiveType::Zbb => verify_envelope(path, &inner, registry)?,
        other => return Err(archive_err(AsuraError::Unsupported(other).at(0))),
    }

    let block_size = envelope
        .blocks
        .first()
        .map(|block| block.decompressed_size as usize)
        .filter(|size| (MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(size));
    let options = match block_size {
        Some(size) => ZbbOptions::new().with_block_size(size).map_err(archive_err)?,
        None => ZbbOptions::default(),
    };
    debug!(
        "{}: recompressing {} bytes in {} byte blocks",
        path.display(),
        inner.len(),
        options.block_size()
    );

    let mut recompressed = Cursor::new(Vec::new());
    ZbbArchive::compress_to(&mut Cursor::new(&inner), &mut recompressed, &options, None)
        .map_err(archive_err)?;
    recompressed.set_position(0);
    let rewrapped = ZbbArchive::read(&mut recompressed).map_err(archive_err)?;
    let again = rewrapped
        .decompress(&mut recompressed, None)
        .map_err(archive_err)?;

    if again != inner {
        return Err(CliError::Mismatch {
            path: path.to_path_buf(),
            detail: "recompressed envelope does not decompress to the same bytes".to_string(),
        });
    }
    Ok(())
}

/// Handle `asura verify`
pub fn handle(files: &[PathBuf], cli: &Cli, registry: &ChunkRegistry) -> Result<(), CliError> {
    let outcomes = run_batch(files, |path| verify_file(path, registry));
    let reports: Vec<VerifyReport> = outcomes
        .iter()
        .map(|outcome| VerifyReport {
            path: outcome.path.clone(),
            ok: outcome.result.is_ok(),
            archive_type: outcome.result.as_ref().ok().map(ToString::to_string),
            error: outcome.result.as_ref().err().map(ToString::to_string),
        })
        .collect();

    if cli.format.is_json() {
        print_json(&reports, cli.format).map_err(|e| CliError::Config(e.to_string()))?;
    } else {
        let style = OutputStyle::new();
        for report in &reports {
            match &report.error {
                None => println!(
                    "{} {}",
                    format_success("OK", &style),
                    report.path.display()
                ),
                Some(error) => println!("{} {error}", format_error("FAILED", &style)),
            }
        }
    }

    finish_batch(&outcomes, "verified", !cli.format.is_json())
}
