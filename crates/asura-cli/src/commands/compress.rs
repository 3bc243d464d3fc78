//! `asura compress`: wrap a folder archive in a Zbb envelope

use asura_formats::{ArchiveType, BlockProgress, ChunkRegistry, FolderArchive, ReadOptions, ZbbArchive, ZbbOptions};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::open_input;
use crate::config::Cli;
use crate::error::CliError;
use crate::output::{OutputStyle, block_progress_bar, format_key_value, format_success, print_json};

/// What `compress` and `decompress` report
#[derive(Debug, Serialize)]
pub struct TransferSummary {
    /// Source file
    pub input: PathBuf,
    /// Destination file
    pub output: PathBuf,
    /// Number of envelope blocks
    pub blocks: usize,
    /// Bytes of the wrapped archive
    pub decompressed_bytes: u64,
    /// Bytes of the envelope file
    pub envelope_bytes: u64,
}

impl TransferSummary {
    pub(crate) fn print(&self, verb: &str, cli: &Cli) -> Result<(), CliError> {
        if cli.format.is_json() {
            return print_json(self, cli.format).map_err(|e| CliError::Config(e.to_string()));
        }
        let style = OutputStyle::new();
        println!(
            "{}",
            format_success(
                &format!("{verb} {} -> {}", self.input.display(), self.output.display()),
                &style
            )
        );
        println!("{}", format_key_value("Blocks", &self.blocks.to_string(), &style));
        println!(
            "{}",
            format_key_value("Archive bytes", &self.decompressed_bytes.to_string(), &style)
        );
        println!(
            "{}",
            format_key_value("Envelope bytes", &self.envelope_bytes.to_string(), &style)
        );
        Ok(())
    }
}

/// Compress `input` into `output`
pub fn compress_file(
    input: &Path,
    output: &Path,
    options: &ZbbOptions,
    show_progress: bool,
) -> Result<TransferSummary, CliError> {
    let archive_err = |e| CliError::archive(input, e);
    let mut reader = open_input(input)?;

    let kind = ArchiveType::read(&mut reader).map_err(archive_err)?;
    if kind != ArchiveType::Folder {
        return Err(CliError::WrongKind {
            path: input.to_path_buf(),
            expected: ArchiveType::Folder.to_string(),
            found: kind.to_string(),
        });
    }
    // headers only; rejects truncated or malformed chunk streams before writing
    FolderArchive::read_chunks(&mut reader, &ChunkRegistry::default(), ReadOptions::sparse())
        .map_err(archive_err)?;
    reader.rewind().map_err(|e| CliError::io(input, e))?;

    let total = fs::metadata(input).map_err(|e| CliError::io(input, e))?.len();
    let file = File::create(output).map_err(|e| CliError::io(output, e))?;
    let mut writer = BufWriter::new(file);

    let bar = show_progress.then(|| block_progress_bar(total, "compressing"));
    let mut on_block = |p: BlockProgress| {
        if let Some(bar) = &bar {
            bar.inc(p.bytes);
        }
        ControlFlow::Continue(())
    };

    let result = ZbbArchive::compress_to(&mut reader, &mut writer, options, Some(&mut on_block))
        .map_err(archive_err)
        .and_then(|envelope| {
            writer.flush().map_err(|e| CliError::io(output, e))?;
            Ok(envelope)
        });
    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }

    let envelope = match result {
        Ok(envelope) => envelope,
        Err(e) => {
            drop(writer);
            if let Err(remove) = fs::remove_file(output) {
                warn!("could not remove partial output {}: {remove}", output.display());
            }
            return Err(e);
        }
    };

    let envelope_bytes = 16 + u64::from(envelope.compressed_total);
    info!(
        "compressed {} into {} blocks ({total} -> {envelope_bytes} bytes)",
        input.display(),
        envelope.block_count()
    );
    Ok(TransferSummary {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        blocks: envelope.block_count(),
        decompressed_bytes: u64::from(envelope.decompressed_total),
        envelope_bytes,
    })
}

/// Handle `asura compress`
pub fn handle(input: &Path, output: &Path, options: &ZbbOptions, cli: &Cli) -> Result<(), CliError> {
    let summary = compress_file(input, output, options, !cli.format.is_json())?;
    summary.print("Compressed", cli)
}
