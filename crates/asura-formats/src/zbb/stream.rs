//! Shared zlib streams driven one block at a time

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use std::io::{Read, Write};
use tracing::{trace, warn};

use crate::error::{AsuraError, AsuraResult};

/// Input and output are processed in windows of this size
const WINDOW: usize = 64 * 1024;

/// Compresses consecutive blocks through one zlib stream
///
/// Blocks are separated by sync flushes so each block's compressed bytes end
/// on a byte boundary; the final block finishes the stream. In independent
/// mode every block finishes its own stream and the compressor is reset.
pub(super) struct BlockCompressor {
    inner: Compress,
    independent: bool,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl BlockCompressor {
    pub(super) fn new(level: u32, independent: bool) -> Self {
        Self {
            inner: Compress::new(Compression::new(level), true),
            independent,
            input: vec![0; WINDOW],
            output: vec![0; WINDOW],
        }
    }

    /// Compress exactly `len` bytes from `reader` into `writer`
    ///
    /// Returns the number of compressed bytes written.
    pub(super) fn compress_block<R, W>(
        &mut self,
        reader: &mut R,
        len: usize,
        last: bool,
        writer: &mut W,
    ) -> AsuraResult<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut written = 0u64;
        let mut remaining = len;

        while remaining > 0 {
            let take = remaining.min(WINDOW);
            reader.read_exact(&mut self.input[..take])?;
            remaining -= take;

            let mut consumed = 0;
            while consumed < take {
                let (used, produced, _) =
                    self.step(consumed, take, FlushCompress::None)?;
                consumed += used;
                writer.write_all(&self.output[..produced])?;
                written += produced as u64;
            }
        }

        let finish = last || self.independent;
        let flush = if finish {
            FlushCompress::Finish
        } else {
            FlushCompress::Sync
        };
        loop {
            let (_, produced, status) = self.step(0, 0, flush)?;
            writer.write_all(&self.output[..produced])?;
            written += produced as u64;

            let done = if finish {
                status == Status::StreamEnd
            } else {
                produced < self.output.len()
            };
            if done {
                break;
            }
        }

        if finish {
            self.inner.reset();
        }
        Ok(written)
    }

    /// One call into zlib over `input[start..end]`; returns (consumed, produced, status)
    fn step(
        &mut self,
        start: usize,
        end: usize,
        flush: FlushCompress,
    ) -> AsuraResult<(usize, usize, Status)> {
        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .compress(&self.input[start..end], &mut self.output, flush)
            .map_err(|e| AsuraError::Compression(format!("zlib compression failed: {e}")))?;
        let consumed = (self.inner.total_in() - before_in) as usize;
        let produced = (self.inner.total_out() - before_out) as usize;
        Ok((consumed, produced, status))
    }
}

/// Decompresses consecutive blocks through one zlib stream
///
/// When a block's stream ends the decompressor is reset, so envelopes whose
/// blocks are independent streams decode as well as single-stream ones.
pub(super) struct BlockDecompressor {
    inner: Decompress,
    input: Vec<u8>,
    output: Vec<u8>,
}

impl BlockDecompressor {
    pub(super) fn new() -> Self {
        Self {
            inner: Decompress::new(true),
            input: vec![0; WINDOW],
            output: vec![0; WINDOW],
        }
    }

    /// Decompress `compressed_size` bytes from `reader` into `writer`
    ///
    /// Returns the number of decompressed bytes written. Fails with
    /// [`AsuraError::BlockSizeMismatch`] before writing past `decompressed_size`.
    pub(super) fn decompress_block<R, W>(
        &mut self,
        reader: &mut R,
        compressed_size: u64,
        decompressed_size: u64,
        index: usize,
        writer: &mut W,
    ) -> AsuraResult<u64>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let mut written = 0u64;
        let mut remaining = compressed_size;

        while remaining > 0 {
            let take = remaining.min(WINDOW as u64) as usize;
            reader.read_exact(&mut self.input[..take])?;
            remaining -= take as u64;

            let mut consumed = 0;
            loop {
                let before_in = self.inner.total_in();
                let before_out = self.inner.total_out();
                let status = self
                    .inner
                    .decompress(
                        &self.input[consumed..take],
                        &mut self.output,
                        FlushDecompress::None,
                    )
                    .map_err(|e| {
                        AsuraError::Compression(format!("zlib decompression failed in block {index}: {e}"))
                    })?;
                let used = (self.inner.total_in() - before_in) as usize;
                let produced = (self.inner.total_out() - before_out) as usize;
                consumed += used;
                if written + produced as u64 > decompressed_size {
                    return Err(AsuraError::BlockSizeMismatch {
                        index,
                        expected: decompressed_size,
                        actual: written + produced as u64,
                    });
                }
                writer.write_all(&self.output[..produced])?;
                written += produced as u64;

                if status == Status::StreamEnd {
                    self.inner.reset(true);
                    let left = (take - consumed) as u64 + remaining;
                    if left > 0 {
                        warn!("zlib stream in block {index} ended with {left} bytes unread, skipping them");
                    } else {
                        trace!("zlib stream ended with block {index}, decompressor reset");
                    }
                    return Ok(written);
                }

                let stalled = used == 0 && produced == 0;
                if stalled || (consumed == take && produced < self.output.len()) {
                    break;
                }
            }
        }

        Ok(written)
    }
}
