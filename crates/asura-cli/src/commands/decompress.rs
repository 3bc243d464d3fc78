//! `asura decompress`: unwrap a Zbb envelope

use asura_formats::{BlockProgress, ZbbArchive};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::ControlFlow;
use std::path::Path;
use tracing::{info, warn};

use super::compress::TransferSummary;
use super::open_input;
use crate::config::Cli;
use crate::error::CliError;
use crate::output::block_progress_bar;

/// Decompress the envelope in `input` into `output`
pub fn decompress_file(
    input: &Path,
    output: &Path,
    show_progress: bool,
) -> Result<TransferSummary, CliError> {
    let archive_err = |e| CliError::archive(input, e);
    let mut reader = open_input(input)?;
    let envelope = ZbbArchive::read(&mut reader).map_err(archive_err)?;

    let file = File::create(output).map_err(|e| CliError::io(output, e))?;
    let mut writer = BufWriter::new(file);

    let bar = show_progress
        .then(|| block_progress_bar(u64::from(envelope.decompressed_total), "decompressing"));
    let mut on_block = |p: BlockProgress| {
        if let Some(bar) = &bar {
            bar.inc(p.bytes);
        }
        ControlFlow::Continue(())
    };

    let result = envelope
        .decompress_to(&mut reader, &mut writer, Some(&mut on_block))
        .map_err(archive_err)
        .and_then(|written| {
            writer.flush().map_err(|e| CliError::io(output, e))?;
            Ok(written)
        });
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let written = match result {
        Ok(written) => written,
        Err(e) => {
            drop(writer);
            if let Err(remove) = fs::remove_file(output) {
                warn!("could not remove partial output {}: {remove}", output.display());
            }
            return Err(e);
        }
    };

    info!(
        "decompressed {} blocks from {} ({written} bytes)",
        envelope.block_count(),
        input.display()
    );
    Ok(TransferSummary {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        blocks: envelope.block_count(),
        decompressed_bytes: written,
        envelope_bytes: 16 + u64::from(envelope.compressed_total),
    })
}

/// Handle `asura decompress`
pub fn handle(input: &Path, output: &Path, cli: &Cli) -> Result<(), CliError> {
    let summary = decompress_file(input, output, !cli.format.is_json())?;
    summary.print("Decompressed", cli)
}
