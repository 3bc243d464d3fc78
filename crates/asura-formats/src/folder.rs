//! Folder archives: a magic followed by a chunk stream ending in EOF
//!
//! Reading walks the stream header by header. In eager mode every payload is
//! decoded through the [`ChunkRegistry`] as it is reached; in sparse mode only
//! headers are read and each payload is replaced by a placeholder recording
//! its offset, to be loaded later with [`FolderArchive::load_chunk`],
//! [`FolderArchive::load`] or [`FolderArchive::load_filtered`].
//!
//! Writing emits the magic, then each chunk with a backpatched length field,
//! then the bare EOF tag.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};
use tracing::debug;

use crate::AsuraFormat;
use crate::archive_type::ArchiveType;
use crate::chunk::{Chunk, ChunkBody, ChunkHeader, ChunkType};
use crate::error::{AsuraError, AsuraResult};
use crate::io::with_bookmark;
use crate::registry::ChunkRegistry;

/// How payloads are handled while reading
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Record payload offsets instead of decoding payloads
    pub sparse: bool,
}

impl ReadOptions {
    /// Decode every payload while reading
    pub const fn eager() -> Self {
        Self { sparse: false }
    }

    /// Defer every payload
    pub const fn sparse() -> Self {
        Self { sparse: true }
    }
}

/// An ordered chunk sequence terminated by exactly one EOF chunk
#[derive(Debug, Clone, PartialEq)]
pub struct FolderArchive {
    chunks: Vec<Chunk>,
}

impl Default for FolderArchive {
    fn default() -> Self {
        Self::new()
    }
}

impl FolderArchive {
    /// An archive with no payload chunks
    pub fn new() -> Self {
        Self {
            chunks: vec![Chunk::eof()],
        }
    }

    /// Build from chunks, appending the EOF terminator if it is missing
    ///
    /// An EOF anywhere but last is rejected.
    pub fn from_chunks(mut chunks: Vec<Chunk>) -> AsuraResult<Self> {
        let last = chunks.len().saturating_sub(1);
        if let Some(index) = chunks
            .iter()
            .enumerate()
            .position(|(i, chunk)| chunk.is_eof() && i != last)
        {
            return Err(AsuraError::MisplacedEof { index });
        }
        if !chunks.last().is_some_and(Chunk::is_eof) {
            chunks.push(Chunk::eof());
        }
        Ok(Self { chunks })
    }

    /// Archive kind, always [`ArchiveType::Folder`]
    pub const fn archive_type(&self) -> ArchiveType {
        ArchiveType::Folder
    }

    /// Read a complete archive, magic included
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        registry: &ChunkRegistry,
        options: ReadOptions,
    ) -> AsuraResult<Self> {
        let offset = reader.stream_position()?;
        let kind = ArchiveType::read(reader)?;
        if kind != ArchiveType::Folder {
            return Err(AsuraError::Decode {
                what: "folder archive magic",
                value: kind.magic().to_vec(),
            }
            .at(offset));
        }
        Self::read_chunks(reader, registry, options)
    }

    /// Read the chunk stream that follows an already consumed magic
    pub fn read_chunks<R: Read + Seek>(
        reader: &mut R,
        registry: &ChunkRegistry,
        options: ReadOptions,
    ) -> AsuraResult<Self> {
        let mut chunks = Vec::new();
        loop {
            let header = ChunkHeader::read(reader)?;
            let Some(payload_size) = header.payload_size() else {
                chunks.push(Chunk::eof());
                break;
            };

            if options.sparse {
                let offset = reader.stream_position()?;
                reader.seek(SeekFrom::Current(i64::from(payload_size)))?;
                chunks.push(Chunk {
                    header,
                    body: ChunkBody::Sparse { offset },
                });
            } else {
                chunks.push(registry.read_chunk(reader, &header)?);
            }
        }

        debug!(
            "read folder archive: {} chunks (sparse: {})",
            chunks.len(),
            options.sparse
        );
        Ok(Self { chunks })
    }

    /// Load one sparse placeholder in place
    ///
    /// Returns `false` if the chunk was already loaded. The reader is left
    /// where it was before the call.
    pub fn load_chunk<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        registry: &ChunkRegistry,
        index: usize,
    ) -> AsuraResult<bool> {
        let len = self.chunks.len();
        let chunk = self
            .chunks
            .get(index)
            .ok_or(AsuraError::ChunkIndexOutOfRange { index, len })?;
        let ChunkBody::Sparse { offset } = chunk.body else {
            return Ok(false);
        };
        let header = chunk.header;

        let loaded = with_bookmark(reader, |r| {
            r.seek(SeekFrom::Start(offset))?;
            registry.read_chunk(r, &header)
        })?;
        self.chunks[index] = loaded;
        Ok(true)
    }

    /// Load every sparse placeholder; returns whether any was replaced
    pub fn load<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        registry: &ChunkRegistry,
    ) -> AsuraResult<bool> {
        self.load_matching(reader, registry, |_| true)
    }

    /// Load sparse placeholders whose type is listed; returns whether any was replaced
    pub fn load_filtered<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        registry: &ChunkRegistry,
        types: &[ChunkType],
    ) -> AsuraResult<bool> {
        self.load_matching(reader, registry, |chunk_type| types.contains(&chunk_type))
    }

    fn load_matching<R, F>(
        &mut self,
        reader: &mut R,
        registry: &ChunkRegistry,
        wanted: F,
    ) -> AsuraResult<bool>
    where
        R: Read + Seek,
        F: Fn(ChunkType) -> bool,
    {
        let mut replaced = false;
        for index in 0..self.chunks.len() {
            let chunk = &self.chunks[index];
            if chunk.is_sparse() && wanted(chunk.chunk_type()) {
                replaced |= self.load_chunk(reader, registry, index)?;
            }
        }
        Ok(replaced)
    }

    /// Write the archive and return the total bytes written
    ///
    /// Header lengths are recomputed from the written payloads; the
    /// in-memory headers are not modified.
    pub fn write<W: Write + Seek>(
        &self,
        writer: &mut W,
        registry: &ChunkRegistry,
    ) -> AsuraResult<u64> {
        let mut written = ArchiveType::Folder.write(writer)?;
        for (index, chunk) in self.chunks.iter().enumerate() {
            if chunk.is_eof() {
                continue;
            }
            if chunk.is_sparse() {
                return Err(AsuraError::ChunkNotLoaded {
                    chunk_type: chunk.chunk_type(),
                    index,
                });
            }
            written += registry.write_chunk(writer, chunk)?;
        }
        written += ChunkHeader::eof().write(writer)?;

        debug!(
            "wrote folder archive: {} chunks, {written} bytes",
            self.chunks.len()
        );
        Ok(written)
    }

    /// Append a payload chunk before the EOF terminator
    pub fn push(&mut self, chunk: Chunk) -> AsuraResult<()> {
        if chunk.is_eof() {
            return Err(AsuraError::MisplacedEof {
                index: self.chunks.len() - 1,
            });
        }
        let eof = self.chunks.len() - 1;
        self.chunks.insert(eof, chunk);
        Ok(())
    }

    /// All chunks, EOF included
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Consume the archive, returning its chunks (EOF included)
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.chunks
    }

    /// Number of chunks, EOF included
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the archive has no payload chunks
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Chunk::is_eof)
    }

    /// Whether no sparse placeholders remain
    pub fn is_loaded(&self) -> bool {
        !self.chunks.iter().any(Chunk::is_sparse)
    }

    /// Chunks other than the EOF terminator
    pub fn iter_payload_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|chunk| !chunk.is_eof())
    }

    /// Number of payload chunks of each type
    pub fn chunk_type_counts(&self) -> BTreeMap<ChunkType, usize> {
        let mut counts = BTreeMap::new();
        for chunk in self.iter_payload_chunks() {
            *counts.entry(chunk.chunk_type()).or_insert(0) += 1;
        }
        counts
    }
}

impl AsuraFormat for FolderArchive {
    fn parse(data: &[u8], registry: &ChunkRegistry) -> AsuraResult<Self> {
        Self::read(&mut Cursor::new(data), registry, ReadOptions::eager())
    }

    fn build(&self, registry: &ChunkRegistry) -> AsuraResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor, registry)?;
        Ok(cursor.into_inner())
    }
}

impl AsuraFormat for Chunk {
    fn parse(data: &[u8], registry: &ChunkRegistry) -> AsuraResult<Self> {
        let mut cursor = Cursor::new(data);
        let header = ChunkHeader::read(&mut cursor)?;
        registry.read_chunk(&mut cursor, &header)
    }

    fn build(&self, registry: &ChunkRegistry) -> AsuraResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        registry.write_chunk(&mut cursor, self)?;
        Ok(cursor.into_inner())
    }
}
