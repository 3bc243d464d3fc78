//! Zbb block-compressed envelope
//!
//! A Zbb file wraps a serialized archive in zlib-compressed blocks:
//!
//! ```text
//! "AsuraZbb"
//! compressed_total:u32    bytes of block records that follow, headers included
//! decompressed_total:u32  length of the wrapped archive
//! repeated until compressed_total bytes are consumed:
//!     compressed_size:u32
//!     decompressed_size:u32
//!     data[compressed_size]
//! ```
//!
//! Blocks are produced from one zlib stream with a sync flush after every
//! block and the stream finished on the last one, so they must be decoded in
//! order. Envelopes whose blocks are each a complete zlib stream decode too.
//!
//! Compression reads its input slice by slice; decompression streams output to
//! any writer. Both accept a progress callback that can cancel between blocks.

mod stream;

use binrw::{BinRead, BinWrite};
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use std::ops::ControlFlow;
use tracing::{debug, trace};

use crate::archive_type::ArchiveType;
use crate::error::{AsuraError, AsuraResult};
use crate::folder::{FolderArchive, ReadOptions};
use crate::io::{AsuraWrite, ByteCounter, stream_len, wire_u32, with_bookmark};
use crate::registry::ChunkRegistry;
use stream::{BlockCompressor, BlockDecompressor};

/// Default block size (2 MiB)
pub const DEFAULT_BLOCK_SIZE: usize = 2 * 1024 * 1024;

/// Minimum allowed block size (1 KiB)
pub const MIN_BLOCK_SIZE: usize = 1024;

/// Maximum allowed block size (64 MiB)
pub const MAX_BLOCK_SIZE: usize = 64 * 1024 * 1024;

/// zlib's default compression level
pub const DEFAULT_LEVEL: u32 = 6;

/// Size of a block record header
pub const BLOCK_HEADER_SIZE: u64 = 8;

#[derive(Debug, Clone, Copy, BinRead, BinWrite)]
#[brw(little)]
struct EnvelopeHeader {
    compressed_total: u32,
    decompressed_total: u32,
}

#[derive(Debug, Clone, Copy, BinRead, BinWrite)]
#[brw(little)]
struct BlockHeader {
    compressed_size: u32,
    decompressed_size: u32,
}

/// Reported after each block is compressed or decompressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockProgress {
    /// Zero-based index of the finished block
    pub index: usize,
    /// Number of blocks in the envelope
    pub total: usize,
    /// Decompressed bytes in the finished block
    pub bytes: u64,
}

/// Progress callback; returning [`ControlFlow::Break`] cancels the operation
pub type ProgressFn<'a> = &'a mut dyn FnMut(BlockProgress) -> ControlFlow<()>;

fn report(
    progress: &mut Option<ProgressFn<'_>>,
    index: usize,
    total: usize,
    bytes: u64,
) -> AsuraResult<()> {
    if let Some(callback) = progress.as_mut() {
        if callback(BlockProgress {
            index,
            total,
            bytes,
        })
        .is_break()
        {
            return Err(AsuraError::Cancelled { index, total });
        }
    }
    Ok(())
}

/// Envelope compression settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZbbOptions {
    block_size: usize,
    level: u32,
    independent_blocks: bool,
}

impl Default for ZbbOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            level: DEFAULT_LEVEL,
            independent_blocks: false,
        }
    }
}

impl ZbbOptions {
    /// Default settings: 2 MiB blocks, level 6, one shared stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the uncompressed size of each block
    ///
    /// # Arguments
    /// * `size` - Block size in bytes (must be between 1 KiB and 64 MiB)
    pub fn with_block_size(mut self, size: usize) -> AsuraResult<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&size) {
            return Err(AsuraError::InvalidBlockSize {
                size,
                min: MIN_BLOCK_SIZE,
                max: MAX_BLOCK_SIZE,
            });
        }
        self.block_size = size;
        Ok(self)
    }

    /// Set the block size without validation (for testing purposes)
    #[must_use]
    pub fn with_block_size_unchecked(mut self, size: usize) -> Self {
        self.block_size = size.max(1);
        self
    }

    /// Set the zlib compression level (0-9)
    pub fn with_level(mut self, level: u32) -> AsuraResult<Self> {
        if level > 9 {
            return Err(AsuraError::InvalidLevel(level));
        }
        self.level = level;
        Ok(self)
    }

    /// Finish the zlib stream after every block instead of sync-flushing
    #[must_use]
    pub fn with_independent_blocks(mut self, independent: bool) -> Self {
        self.independent_blocks = independent;
        self
    }

    /// Uncompressed bytes per block
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// zlib compression level
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Whether each block is a complete zlib stream
    pub const fn independent_blocks(&self) -> bool {
        self.independent_blocks
    }
}

/// One compressed block of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZbbBlock {
    /// Bytes of compressed data
    pub compressed_size: u32,
    /// Bytes the block decompresses to
    pub decompressed_size: u32,
    /// Absolute offset of the compressed data in the source stream
    pub data_offset: u64,
}

/// Envelope header and block table
///
/// Reading records where each block's data lives without decompressing
/// anything; decompression goes back to the source stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZbbArchive {
    /// Bytes of block records (headers included) after the envelope header
    pub compressed_total: u32,
    /// Length of the wrapped archive
    pub decompressed_total: u32,
    /// Block table in stream order
    pub blocks: Vec<ZbbBlock>,
}

impl ZbbArchive {
    /// Archive kind, always [`ArchiveType::Zbb`]
    pub const fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zbb
    }

    /// Read the magic, envelope header and block table
    pub fn read<R: Read + Seek>(reader: &mut R) -> AsuraResult<Self> {
        let offset = reader.stream_position()?;
        let kind = ArchiveType::read(reader)?;
        if kind != ArchiveType::Zbb {
            return Err(AsuraError::Decode {
                what: "zbb envelope magic",
                value: kind.magic().to_vec(),
            }
            .at(offset));
        }
        Self::read_blocks(reader)
    }

    /// Read the envelope header and block table after an already consumed magic
    ///
    /// Leaves the reader after the last block record.
    pub fn read_blocks<R: Read + Seek>(reader: &mut R) -> AsuraResult<Self> {
        let header = EnvelopeHeader::read(reader)?;
        let end = reader.stream_position()? + u64::from(header.compressed_total);

        let mut blocks = Vec::new();
        let mut position = reader.stream_position()?;
        while position < end {
            let block = BlockHeader::read(reader)?;
            let data_offset = reader.stream_position()?;
            position = reader.seek(SeekFrom::Current(i64::from(block.compressed_size)))?;
            blocks.push(ZbbBlock {
                compressed_size: block.compressed_size,
                decompressed_size: block.decompressed_size,
                data_offset,
            });
        }
        if position != end {
            return Err(AsuraError::BlockTableOverrun {
                expected_end: end,
                actual_end: position,
            });
        }

        debug!(
            "read zbb envelope: {} blocks, {} -> {} bytes",
            blocks.len(),
            header.compressed_total,
            header.decompressed_total
        );
        Ok(Self {
            compressed_total: header.compressed_total,
            decompressed_total: header.decompressed_total,
            blocks,
        })
    }

    /// Number of blocks
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Sum of the per-block decompressed sizes
    pub fn declared_block_total(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| u64::from(block.decompressed_size))
            .sum()
    }

    /// Decompress every block in order into `writer`
    ///
    /// Each block must produce exactly its declared size and the blocks
    /// together the declared total. The reader is restored afterwards.
    pub fn decompress_to<R, W>(
        &self,
        reader: &mut R,
        writer: &mut W,
        mut progress: Option<ProgressFn<'_>>,
    ) -> AsuraResult<u64>
    where
        R: Read + Seek,
        W: Write + ?Sized,
    {
        let total_blocks = self.blocks.len();
        let total = with_bookmark(reader, |r| {
            let mut decompressor = BlockDecompressor::new();
            let mut total = 0u64;
            for (index, block) in self.blocks.iter().enumerate() {
                r.seek(SeekFrom::Start(block.data_offset))?;
                let produced = decompressor.decompress_block(
                    r,
                    u64::from(block.compressed_size),
                    u64::from(block.decompressed_size),
                    index,
                    writer,
                )?;
                if produced != u64::from(block.decompressed_size) {
                    return Err(AsuraError::BlockSizeMismatch {
                        index,
                        expected: u64::from(block.decompressed_size),
                        actual: produced,
                    });
                }
                total += produced;
                trace!(
                    "decompressed zbb block {index}: {} -> {produced} bytes",
                    block.compressed_size
                );
                report(&mut progress, index, total_blocks, produced)?;
            }
            Ok(total)
        })?;

        if total != u64::from(self.decompressed_total) {
            return Err(AsuraError::EnvelopeSizeMismatch {
                expected: u64::from(self.decompressed_total),
                actual: total,
            });
        }
        debug!("decompressed zbb envelope: {total_blocks} blocks, {total} bytes");
        Ok(total)
    }

    /// Decompress into memory
    pub fn decompress<R: Read + Seek>(
        &self,
        reader: &mut R,
        progress: Option<ProgressFn<'_>>,
    ) -> AsuraResult<Vec<u8>> {
        let mut buffer = Vec::new();
        self.decompress_to(reader, &mut buffer, progress)?;
        Ok(buffer)
    }

    /// Compress everything from the input's current position to its end
    ///
    /// Writes the magic, the envelope header and one record per block,
    /// backpatching each compressed size and the compressed total.
    pub fn compress_to<R, W>(
        input: &mut R,
        output: &mut W,
        options: &ZbbOptions,
        mut progress: Option<ProgressFn<'_>>,
    ) -> AsuraResult<Self>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        let length = stream_len(input)?.saturating_sub(input.stream_position()?);
        let decompressed_total = wire_u32("decompressed total", length)?;
        let block_size = options.block_size as u64;
        let total_blocks = length.div_ceil(block_size) as usize;

        ArchiveType::Zbb.write(output)?;
        let compressed_slot = output.reserve_u32()?;
        output.write_u32(decompressed_total)?;

        let records = ByteCounter::start(output)?;
        let mut compressor = BlockCompressor::new(options.level, options.independent_blocks);
        let mut blocks = Vec::with_capacity(total_blocks);
        for index in 0..total_blocks {
            let slice = block_size.min(length - index as u64 * block_size);
            let size_slot = output.reserve_u32()?;
            output.write_u32(slice as u32)?;
            let data_offset = output.stream_position()?;

            let compressed =
                compressor.compress_block(input, slice as usize, index + 1 == total_blocks, output)?;
            let compressed_size = wire_u32("block compressed size", compressed)?;
            size_slot.fill(output, compressed_size)?;

            blocks.push(ZbbBlock {
                compressed_size,
                decompressed_size: slice as u32,
                data_offset,
            });
            trace!("compressed zbb block {index}: {slice} -> {compressed} bytes");
            report(&mut progress, index, total_blocks, slice)?;
        }

        let compressed_total = wire_u32("compressed total", records.length(output)?)?;
        compressed_slot.fill(output, compressed_total)?;

        debug!(
            "compressed zbb envelope: {total_blocks} blocks, {length} -> {compressed_total} bytes"
        );
        Ok(Self {
            compressed_total,
            decompressed_total,
            blocks,
        })
    }

    /// Serialize `archive` and wrap it in an envelope
    pub fn compress_archive<W: Write + Seek>(
        archive: &FolderArchive,
        registry: &ChunkRegistry,
        output: &mut W,
        options: &ZbbOptions,
        progress: Option<ProgressFn<'_>>,
    ) -> AsuraResult<Self> {
        let mut buffer = Cursor::new(Vec::new());
        archive.write(&mut buffer, registry)?;
        buffer.set_position(0);
        Self::compress_to(&mut buffer, output, options, progress)
    }

    /// Decompress and eagerly parse the wrapped archive
    ///
    /// Envelopes nested inside the decompressed data are unwrapped as well,
    /// up to [`MAX_NESTING`](crate::dispatch::MAX_NESTING) levels.
    pub fn decompress_archive<R: Read + Seek>(
        &self,
        reader: &mut R,
        registry: &ChunkRegistry,
        progress: Option<ProgressFn<'_>>,
    ) -> AsuraResult<FolderArchive> {
        let buffer = self.decompress(reader, progress)?;
        let (archive, _) =
            crate::dispatch::open_nested(buffer, registry, ReadOptions::eager(), 1)?;
        Ok(archive)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::io::AsuraRead;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn envelope(data: &[u8], options: &ZbbOptions) -> (ZbbArchive, Vec<u8>) {
        let mut output = Cursor::new(Vec::new());
        let archive = ZbbArchive::compress_to(&mut Cursor::new(data), &mut output, options, None)
            .expect("Test operation should succeed");
        (archive, output.into_inner())
    }

    #[test]
    fn test_options_validation() {
        assert!(matches!(
            ZbbOptions::new().with_block_size(512),
            Err(AsuraError::InvalidBlockSize { size: 512, .. })
        ));
        assert!(ZbbOptions::new().with_block_size(MAX_BLOCK_SIZE + 1).is_err());
        assert!(matches!(
            ZbbOptions::new().with_level(10),
            Err(AsuraError::InvalidLevel(10))
        ));

        let options = ZbbOptions::new()
            .with_block_size(4096)
            .unwrap()
            .with_level(9)
            .unwrap();
        assert_eq!(options.block_size(), 4096);
        assert_eq!(options.level(), 9);
        assert!(!options.independent_blocks());
    }

    #[test]
    fn test_layout_and_block_table() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 97) as u8).collect();
        let options = ZbbOptions::new().with_block_size(4096).unwrap();
        let (written, bytes) = envelope(&data, &options);

        assert_eq!(&bytes[..8], b"AsuraZbb");
        let mut cursor = Cursor::new(&bytes[..]);
        cursor.set_position(8);
        assert_eq!(cursor.read_u32().unwrap(), written.compressed_total);
        assert_eq!(cursor.read_u32().unwrap(), 10_000);
        assert_eq!(bytes.len() as u64, 16 + u64::from(written.compressed_total));

        let sizes: Vec<u32> = written.blocks.iter().map(|b| b.decompressed_size).collect();
        assert_eq!(sizes, vec![4096, 4096, 1808]);

        let read = ZbbArchive::read(&mut Cursor::new(&bytes[..])).unwrap();
        assert_eq!(read, written);
        assert_eq!(read.declared_block_total(), 10_000);
    }

    #[test]
    fn test_empty_input_has_no_blocks() {
        let (written, bytes) = envelope(&[], &ZbbOptions::new());
        assert_eq!(written.block_count(), 0);
        assert_eq!(written.compressed_total, 0);
        assert_eq!(bytes.len(), 16);

        let mut cursor = Cursor::new(&bytes[..]);
        let read = ZbbArchive::read(&mut cursor).unwrap();
        assert!(read.decompress(&mut cursor, None).unwrap().is_empty());
    }

    #[test]
    fn test_decompress_restores_position_and_reports_progress() {
        let data = vec![0x42u8; 5000];
        let options = ZbbOptions::new().with_block_size(2048).unwrap();
        let (_, bytes) = envelope(&data, &options);

        let mut cursor = Cursor::new(&bytes[..]);
        let archive = ZbbArchive::read(&mut cursor).unwrap();
        let before = cursor.position();

        let mut seen = Vec::new();
        let mut callback = |p: BlockProgress| {
            seen.push((p.index, p.total, p.bytes));
            ControlFlow::Continue(())
        };
        let out = archive.decompress(&mut cursor, Some(&mut callback)).unwrap();

        assert_eq!(out, data);
        assert_eq!(cursor.position(), before);
        assert_eq!(seen, vec![(0, 3, 2048), (1, 3, 2048), (2, 3, 904)]);
    }

    #[test]
    fn test_cancel_from_progress() {
        let data = vec![1u8; 4096];
        let options = ZbbOptions::new().with_block_size(1024).unwrap();
        let mut output = Cursor::new(Vec::new());
        let mut stop_after_first = |p: BlockProgress| {
            if p.index == 0 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        let err = ZbbArchive::compress_to(
            &mut Cursor::new(&data[..]),
            &mut output,
            &options,
            Some(&mut stop_after_first),
        )
        .unwrap_err();
        assert!(matches!(err, AsuraError::Cancelled { index: 0, total: 4 }));
    }

    #[test]
    fn test_block_size_mismatch_is_detected() {
        let data = vec![7u8; 3000];
        let options = ZbbOptions::new().with_block_size(1024).unwrap();
        let (mut archive, bytes) = envelope(&data, &options);
        archive.blocks[1].decompressed_size = 1000;

        let err = archive
            .decompress(&mut Cursor::new(&bytes[..]), None)
            .unwrap_err();
        assert!(err.is_consistency());
        assert!(matches!(
            err,
            AsuraError::BlockSizeMismatch {
                index: 1,
                expected: 1000,
                actual: 1024
            }
        ));
    }

    #[test]
    fn test_total_mismatch_is_detected() {
        let data = vec![7u8; 3000];
        let (mut archive, bytes) = envelope(&data, &ZbbOptions::new());
        archive.decompressed_total = 3001;

        let err = archive
            .decompress(&mut Cursor::new(&bytes[..]), None)
            .unwrap_err();
        assert!(matches!(
            err,
            AsuraError::EnvelopeSizeMismatch {
                expected: 3001,
                actual: 3000
            }
        ));
    }

    #[test]
    fn test_block_table_overrun_is_detected() {
        let data = vec![3u8; 3000];
        let options = ZbbOptions::new().with_block_size(1024).unwrap();
        let (archive, mut bytes) = envelope(&data, &options);
        let declared = archive.compressed_total - 1;
        bytes[8..12].copy_from_slice(&declared.to_le_bytes());

        let err = ZbbArchive::read(&mut Cursor::new(&bytes[..])).unwrap_err();
        assert!(err.is_consistency());
        let end = 16 + u64::from(archive.compressed_total);
        assert!(matches!(
            err,
            AsuraError::BlockTableOverrun { expected_end, actual_end }
                if expected_end == end - 1 && actual_end == end
        ));
    }

    #[test]
    fn test_truncated_headers_are_io_errors() {
        let err = ZbbArchive::read(&mut Cursor::new(b"AsuraZbb\x10\x00")).unwrap_err();
        assert!(matches!(err, AsuraError::Io(_)), "{err:?}");

        let (_, bytes) = envelope(&[5u8; 2000], &ZbbOptions::new());
        let err = ZbbArchive::read(&mut Cursor::new(&bytes[..20])).unwrap_err();
        assert!(matches!(err, AsuraError::Io(_)), "{err:?}");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn compress_then_decompress_is_identity(
            data in proptest::collection::vec(any::<u8>(), 0..20_000),
            block_size in 1024usize..8192,
            independent in any::<bool>(),
        ) {
            let options = ZbbOptions::new()
                .with_block_size(block_size)
                .expect("Test operation should succeed")
                .with_independent_blocks(independent);
            let (written, bytes) = envelope(&data, &options);
            prop_assert_eq!(written.declared_block_total(), data.len() as u64);

            let mut cursor = Cursor::new(&bytes[..]);
            let read = ZbbArchive::read(&mut cursor).expect("Test operation should succeed");
            let out = read.decompress(&mut cursor, None).expect("Test operation should succeed");
            prop_assert_eq!(out, data);
        }
    }
}
