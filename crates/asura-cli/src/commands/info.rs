//! `asura info`: describe archives without modifying them

use asura_formats::{
    ArchiveType, Chunk, ChunkRegistry, FolderArchive, ReadOptions, ZbbArchive, open_archive,
};
use comfy_table::Cell;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{finish_batch, open_input, run_batch};
use crate::config::Cli;
use crate::error::CliError;
use crate::output::{
    OutputStyle, create_table, format_header, format_key_value, header_cell, numeric_cell,
    print_json,
};

/// Everything `info` reports about one file
#[derive(Debug, Serialize)]
pub struct FileInfo {
    /// Path as given on the command line
    pub path: PathBuf,
    /// Outermost archive kind
    pub archive_type: String,
    /// File size in bytes
    pub size: u64,
    /// Block table, for Zbb files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<EnvelopeInfo>,
    /// Innermost folder archive
    pub folder: FolderInfo,
}

/// Zbb envelope summary
#[derive(Debug, Serialize)]
pub struct EnvelopeInfo {
    /// Bytes of block records
    pub compressed_total: u32,
    /// Bytes of the wrapped archive
    pub decompressed_total: u32,
    /// Per-block sizes
    pub blocks: Vec<BlockInfo>,
}

/// One envelope block
#[derive(Debug, Serialize)]
pub struct BlockInfo {
    /// Compressed bytes
    pub compressed_size: u32,
    /// Decompressed bytes
    pub decompressed_size: u32,
    /// Offset of the compressed data in the file
    pub data_offset: u64,
}

/// Folder archive summary
#[derive(Debug, Serialize)]
pub struct FolderInfo {
    /// Payload chunks, EOF excluded
    pub chunk_count: usize,
    /// Payload chunks per tag
    pub chunk_types: BTreeMap<String, usize>,
    /// Every chunk, when requested
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chunks: Vec<ChunkInfo>,
}

/// One chunk header
#[derive(Debug, Serialize)]
pub struct ChunkInfo {
    /// Chunk tag
    pub chunk_type: String,
    /// Header version
    pub version: u32,
    /// Declared length, header included
    pub length: u32,
    /// Reserved word, hex encoded
    pub reserved: String,
    /// Whether the payload was deferred
    pub sparse: bool,
}

impl From<&ZbbArchive> for EnvelopeInfo {
    fn from(envelope: &ZbbArchive) -> Self {
        Self {
            compressed_total: envelope.compressed_total,
            decompressed_total: envelope.decompressed_total,
            blocks: envelope
                .blocks
                .iter()
                .map(|block| BlockInfo {
                    compressed_size: block.compressed_size,
                    decompressed_size: block.decompressed_size,
                    data_offset: block.data_offset,
                })
                .collect(),
        }
    }
}

impl From<&Chunk> for ChunkInfo {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_type: chunk.chunk_type().to_string(),
            version: chunk.header.version,
            length: chunk.header.length,
            reserved: hex::encode(chunk.header.reserved),
            sparse: chunk.is_sparse(),
        }
    }
}

impl FolderInfo {
    fn new(archive: &FolderArchive, list_chunks: bool) -> Self {
        Self {
            chunk_count: archive.iter_payload_chunks().count(),
            chunk_types: archive
                .chunk_type_counts()
                .into_iter()
                .map(|(chunk_type, count)| (chunk_type.to_string(), count))
                .collect(),
            chunks: if list_chunks {
                archive.iter_payload_chunks().map(ChunkInfo::from).collect()
            } else {
                Vec::new()
            },
        }
    }
}

/// Describe one file
pub fn inspect(
    path: &Path,
    list_chunks: bool,
    options: ReadOptions,
    registry: &ChunkRegistry,
) -> Result<FileInfo, CliError> {
    let size = std::fs::metadata(path)
        .map_err(|e| CliError::io(path, e))?
        .len();
    let mut reader = open_input(path)?;
    let opened =
        open_archive(&mut reader, registry, options).map_err(|e| CliError::archive(path, e))?;

    let archive_type = if opened.envelope.is_some() {
        ArchiveType::Zbb
    } else {
        ArchiveType::Folder
    };
    Ok(FileInfo {
        path: path.to_path_buf(),
        archive_type: archive_type.to_string(),
        size,
        envelope: opened.envelope.as_ref().map(EnvelopeInfo::from),
        folder: FolderInfo::new(&opened.archive, list_chunks),
    })
}

/// Handle `asura info`
pub fn handle(
    files: &[PathBuf],
    list_chunks: bool,
    cli: &Cli,
    registry: &ChunkRegistry,
) -> Result<(), CliError> {
    let options = cli.read_options();
    let outcomes = run_batch(files, |path| inspect(path, list_chunks, options, registry));

    if cli.format.is_json() {
        let infos: Vec<&FileInfo> = outcomes.iter().filter_map(|o| o.result.as_ref().ok()).collect();
        print_json(&infos, cli.format).map_err(|e| CliError::Config(e.to_string()))?;
    } else {
        let style = OutputStyle::new();
        for info in outcomes.iter().filter_map(|o| o.result.as_ref().ok()) {
            print_text(info, &style);
        }
    }

    finish_batch(&outcomes, "inspected", !cli.format.is_json() && files.len() > 1)
}

fn print_text(info: &FileInfo, style: &OutputStyle) {
    println!("{}", format_header(&info.path.display().to_string(), style));
    println!("{}", format_key_value("Type", &info.archive_type, style));
    println!("{}", format_key_value("Size", &info.size.to_string(), style));

    if let Some(envelope) = &info.envelope {
        println!(
            "{}",
            format_key_value(
                "Envelope",
                &format!(
                    "{} blocks, {} -> {} bytes",
                    envelope.blocks.len(),
                    envelope.compressed_total,
                    envelope.decompressed_total
                ),
                style
            )
        );
        let mut table = create_table();
        table.set_header(vec![
            header_cell("Block", style),
            header_cell("Compressed", style),
            header_cell("Decompressed", style),
            header_cell("Offset", style),
        ]);
        for (index, block) in envelope.blocks.iter().enumerate() {
            table.add_row(vec![
                numeric_cell(index),
                numeric_cell(block.compressed_size),
                numeric_cell(block.decompressed_size),
                numeric_cell(block.data_offset),
            ]);
        }
        println!("{table}");
    }

    println!(
        "{}",
        format_key_value("Chunks", &info.folder.chunk_count.to_string(), style)
    );
    let mut table = create_table();
    if info.folder.chunks.is_empty() {
        table.set_header(vec![header_cell("Type", style), header_cell("Count", style)]);
        for (chunk_type, count) in &info.folder.chunk_types {
            table.add_row(vec![chunk_type.into(), numeric_cell(count)]);
        }
    } else {
        table.set_header(vec![
            header_cell("Type", style),
            header_cell("Version", style),
            header_cell("Length", style),
            header_cell("Reserved", style),
            header_cell("Loaded", style),
        ]);
        for chunk in &info.folder.chunks {
            table.add_row(vec![
                chunk.chunk_type.as_str().into(),
                numeric_cell(chunk.version),
                numeric_cell(chunk.length),
                chunk.reserved.as_str().into(),
                Cell::new(if chunk.sparse { "no" } else { "yes" }),
            ]);
        }
    }
    println!("{table}");
    println!();
}
