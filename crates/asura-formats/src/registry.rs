//! Chunk type registry
//!
//! Maps chunk tags to the codecs that read, write, unpack and repack them.
//! Tags without a registered codec fall back to [`RawCodec`], which keeps the
//! payload as opaque bytes. The registry is built once and passed by
//! reference to the folder engine; there is no global registration.
//!
//! ```
//! use asura_formats::chunk::{ChunkType, RawCodec};
//! use asura_formats::registry::ChunkRegistry;
//!
//! let registry = ChunkRegistry::builder()
//!     .register(ChunkType::HText, RawCodec)
//!     .expect("HTXT is not reserved")
//!     .build();
//! assert!(registry.is_registered(ChunkType::HText));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::chunk::{Chunk, ChunkBody, ChunkHeader, ChunkType, RawCodec};
use crate::error::{AsuraError, AsuraResult};
use crate::io::{ByteCounter, ReadSeek, WriteSeek, wire_u32};

/// Codec for one chunk type
///
/// Only [`ChunkCodec::read`] is required. The default `write` serializes the
/// chunk body; the default `unpack`/`repack` store the complete serialized
/// chunk (header and payload) in `<destination>.<TAG>`.
pub trait ChunkCodec: Send + Sync + fmt::Debug {
    /// Decode a payload, consuming exactly `header.payload_size()` bytes
    fn read(&self, reader: &mut dyn ReadSeek, header: &ChunkHeader) -> AsuraResult<ChunkBody>;

    /// Encode a chunk's payload, without its header
    fn write(&self, writer: &mut dyn WriteSeek, chunk: &Chunk) -> AsuraResult<()> {
        chunk.write_body(writer)
    }

    /// Write `chunk` next to `destination`; returns whether a file was written
    fn unpack(&self, chunk: &Chunk, destination: &Path, overwrite: bool) -> AsuraResult<bool> {
        let path = unpacked_path(destination, chunk.chunk_type());
        let mut buffer = Cursor::new(Vec::new());
        write_chunk_with(self, &mut buffer, chunk)?;
        let bytes = buffer.into_inner();

        if !overwrite && fs::read(&path).is_ok_and(|existing| existing == bytes) {
            trace!("{} unchanged, skipping", path.display());
            return Ok(false);
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(true)
    }

    /// Rebuild a chunk from a file produced by [`ChunkCodec::unpack`]
    fn repack(&self, source: &Path) -> AsuraResult<Chunk> {
        let mut cursor = Cursor::new(fs::read(source)?);
        let header = ChunkHeader::read(&mut cursor)?;
        read_chunk_with(self, &mut cursor, &header)
    }
}

/// `<destination>.<TAG>`, with the tag's trailing spaces trimmed
pub fn unpacked_path(destination: &Path, chunk_type: ChunkType) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".");
    name.push(chunk_type.extension());
    PathBuf::from(name)
}

/// Read one chunk body with `codec`, checking it consumed exactly the declared payload
pub fn read_chunk_with<C: ChunkCodec + ?Sized>(
    codec: &C,
    reader: &mut dyn ReadSeek,
    header: &ChunkHeader,
) -> AsuraResult<Chunk> {
    let Some(payload_size) = header.payload_size() else {
        return Ok(Chunk::eof());
    };

    let counter = ByteCounter::start(reader)?;
    let start = counter.start_position();
    let expected_end = start + u64::from(payload_size);
    let chunk_start = start.saturating_sub(u64::from(header.wire_size()));
    let body = codec
        .read(reader, header)
        .map_err(|e| e.locate(chunk_start))?;
    let actual_end = reader.stream_position()?;

    if actual_end != expected_end {
        return Err(AsuraError::ChunkSizeMismatch {
            chunk_type: header.chunk_type,
            start,
            expected_end,
            actual_end,
        });
    }

    trace!(
        "read {} chunk at {start}: {payload_size} payload bytes",
        header.chunk_type
    );
    Ok(Chunk {
        header: *header,
        body,
    })
}

/// Write one complete chunk with `codec`, backpatching the header length
///
/// Returns the bytes written. The in-memory header is left untouched.
pub fn write_chunk_with<C: ChunkCodec + ?Sized>(
    codec: &C,
    writer: &mut dyn WriteSeek,
    chunk: &Chunk,
) -> AsuraResult<u64> {
    if chunk.is_eof() {
        return chunk.header.write(writer);
    }

    let length = chunk.header.write_placeholder(writer)?;
    let counter = ByteCounter::start(writer)?;
    codec.write(writer, chunk)?;
    let payload = counter.length(writer)?;
    let total = payload + u64::from(chunk.header.wire_size());
    length.fill(writer, wire_u32("chunk length", total)?)?;

    trace!("wrote {} chunk: {payload} payload bytes", chunk.chunk_type());
    Ok(total)
}

/// Registry of chunk codecs
#[derive(Debug, Clone)]
pub struct ChunkRegistry {
    codecs: HashMap<ChunkType, Arc<dyn ChunkCodec>>,
    fallback: Arc<dyn ChunkCodec>,
}

impl Default for ChunkRegistry {
    /// Only the raw fallback
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ChunkRegistry {
    /// Start composing a registry
    pub fn builder() -> ChunkRegistryBuilder {
        ChunkRegistryBuilder::default()
    }

    /// Whether `chunk_type` has its own codec
    pub fn is_registered(&self, chunk_type: ChunkType) -> bool {
        self.codecs.contains_key(&chunk_type)
    }

    /// Registered chunk types, sorted
    pub fn registered_types(&self) -> Vec<ChunkType> {
        let mut types: Vec<ChunkType> = self.codecs.keys().copied().collect();
        types.sort();
        types
    }

    /// Codec for `chunk_type`, or the fallback
    pub fn codec(&self, chunk_type: ChunkType) -> &dyn ChunkCodec {
        self.codecs
            .get(&chunk_type)
            .map_or(self.fallback.as_ref(), |codec| codec.as_ref())
    }

    /// Read a chunk body positioned just after `header`
    ///
    /// Fails with [`AsuraError::ChunkSizeMismatch`] when the codec consumes
    /// anything other than the declared payload size.
    pub fn read_chunk(
        &self,
        reader: &mut dyn ReadSeek,
        header: &ChunkHeader,
    ) -> AsuraResult<Chunk> {
        read_chunk_with(self.codec(header.chunk_type), reader, header)
    }

    /// Write a chunk's payload and return the bytes written
    pub fn write_payload(&self, writer: &mut dyn WriteSeek, chunk: &Chunk) -> AsuraResult<u64> {
        let counter = ByteCounter::start(writer)?;
        self.codec(chunk.chunk_type()).write(writer, chunk)?;
        counter.length(writer)
    }

    /// Write a complete chunk (header, payload, backpatched length)
    pub fn write_chunk(&self, writer: &mut dyn WriteSeek, chunk: &Chunk) -> AsuraResult<u64> {
        write_chunk_with(self.codec(chunk.chunk_type()), writer, chunk)
    }

    /// Unpack a chunk with its type's codec
    pub fn unpack(&self, chunk: &Chunk, destination: &Path, overwrite: bool) -> AsuraResult<bool> {
        self.codec(chunk.chunk_type())
            .unpack(chunk, destination, overwrite)
    }

    /// Repack a chunk of a known type
    pub fn repack(&self, chunk_type: ChunkType, source: &Path) -> AsuraResult<Chunk> {
        self.codec(chunk_type).repack(source)
    }

    /// Repack a chunk, taking its type from the file extension
    pub fn repack_from_path(&self, source: &Path) -> AsuraResult<Chunk> {
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| AsuraError::Decode {
                what: "chunk type extension",
                value: source
                    .extension()
                    .map(|ext| ext.as_encoded_bytes().to_vec())
                    .unwrap_or_default(),
            })?;
        let chunk_type = ChunkType::from_extension(extension)?;
        self.repack(chunk_type, source)
    }
}

/// Builder for [`ChunkRegistry`]
#[derive(Debug, Default)]
pub struct ChunkRegistryBuilder {
    codecs: HashMap<ChunkType, Arc<dyn ChunkCodec>>,
    fallback: Option<Arc<dyn ChunkCodec>>,
}

impl ChunkRegistryBuilder {
    /// Register `codec` for `chunk_type`, replacing any earlier registration
    ///
    /// The EOF sentinel is handled by the archive engine and cannot be registered.
    pub fn register<C: ChunkCodec + 'static>(
        mut self,
        chunk_type: ChunkType,
        codec: C,
    ) -> AsuraResult<Self> {
        if chunk_type.is_eof() {
            return Err(AsuraError::ReservedChunkType(chunk_type));
        }
        if self.codecs.insert(chunk_type, Arc::new(codec)).is_some() {
            debug!("replaced codec for {chunk_type}");
        }
        Ok(self)
    }

    /// Replace the codec used for unregistered chunk types
    #[must_use]
    pub fn with_fallback<C: ChunkCodec + 'static>(mut self, codec: C) -> Self {
        self.fallback = Some(Arc::new(codec));
        self
    }

    /// Finish the registry
    pub fn build(self) -> ChunkRegistry {
        ChunkRegistry {
            codecs: self.codecs,
            fallback: self.fallback.unwrap_or_else(|| Arc::new(RawCodec)),
        }
    }
}
