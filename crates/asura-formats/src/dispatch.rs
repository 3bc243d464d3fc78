//! Route a stream to the right archive reader by its magic
//!
//! [`read_archive`] returns whatever the outermost container is. For a Zbb
//! envelope that is only the block table; [`open_archive`] goes further and
//! decompresses envelopes until it reaches the folder archive inside.

use std::io::{Cursor, Read, Seek};
use tracing::debug;

use crate::archive_type::ArchiveType;
use crate::error::{AsuraError, AsuraResult};
use crate::folder::{FolderArchive, ReadOptions};
use crate::registry::ChunkRegistry;
use crate::zbb::ZbbArchive;

/// Maximum number of envelopes wrapped around one folder archive
pub const MAX_NESTING: usize = 8;

/// Outermost container of a stream
#[derive(Debug, Clone, PartialEq)]
pub enum Archive {
    /// A chunk archive
    Folder(FolderArchive),
    /// A block-compressed envelope, not yet decompressed
    Zbb(ZbbArchive),
}

impl Archive {
    /// Kind of the outermost container
    pub const fn archive_type(&self) -> ArchiveType {
        match self {
            Self::Folder(_) => ArchiveType::Folder,
            Self::Zbb(_) => ArchiveType::Zbb,
        }
    }
}

/// Read the magic and parse the container it names
///
/// Recognized kinds without an implementation fail with
/// [`AsuraError::Unsupported`] at the magic's offset.
pub fn read_archive<R: Read + Seek>(
    reader: &mut R,
    registry: &ChunkRegistry,
    options: ReadOptions,
) -> AsuraResult<Archive> {
    let offset = reader.stream_position()?;
    match ArchiveType::read(reader)? {
        ArchiveType::Folder => Ok(Archive::Folder(FolderArchive::read_chunks(
            reader, registry, options,
        )?)),
        ArchiveType::Zbb => Ok(Archive::Zbb(ZbbArchive::read_blocks(reader)?)),
        kind @ (ArchiveType::Compressed | ArchiveType::ZLib) => {
            Err(AsuraError::Unsupported(kind).at(offset))
        }
    }
}

/// A folder archive together with whatever it was unwrapped from
#[derive(Debug, Clone)]
pub struct OpenedArchive {
    /// The innermost folder archive
    pub archive: FolderArchive,
    /// Outermost envelope, if the stream was compressed
    pub envelope: Option<ZbbArchive>,
    buffer: Option<Vec<u8>>,
}

impl OpenedArchive {
    /// Decompressed bytes that sparse chunk offsets refer to
    ///
    /// `None` when the archive was read straight from the source stream.
    pub fn buffer(&self) -> Option<&[u8]> {
        self.buffer.as_deref()
    }

    /// Load every sparse chunk
    ///
    /// Chunks of an unwrapped archive are loaded from the decompressed buffer;
    /// otherwise `reader` must be the stream the archive was opened from.
    pub fn load<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        registry: &ChunkRegistry,
    ) -> AsuraResult<bool> {
        match &self.buffer {
            Some(buffer) => self
                .archive
                .load(&mut Cursor::new(buffer.as_slice()), registry),
            None => self.archive.load(reader, registry),
        }
    }

    /// Drop the envelope and buffer, keeping the archive
    pub fn into_archive(self) -> FolderArchive {
        self.archive
    }
}

/// Read a stream and unwrap any envelopes down to the folder archive
pub fn open_archive<R: Read + Seek>(
    reader: &mut R,
    registry: &ChunkRegistry,
    options: ReadOptions,
) -> AsuraResult<OpenedArchive> {
    match read_archive(reader, registry, options)? {
        Archive::Folder(archive) => Ok(OpenedArchive {
            archive,
            envelope: None,
            buffer: None,
        }),
        Archive::Zbb(envelope) => {
            let inner = envelope.decompress(reader, None)?;
            let (archive, buffer) = open_nested(inner, registry, options, 1)?;
            Ok(OpenedArchive {
                archive,
                envelope: Some(envelope),
                buffer: Some(buffer),
            })
        }
    }
}

/// Dispatch a decompressed buffer found `depth` envelopes deep
///
/// Returns the folder archive and the buffer it was read from.
pub(crate) fn open_nested(
    buffer: Vec<u8>,
    registry: &ChunkRegistry,
    options: ReadOptions,
    depth: usize,
) -> AsuraResult<(FolderArchive, Vec<u8>)> {
    if depth > MAX_NESTING {
        return Err(AsuraError::NestingTooDeep(MAX_NESTING));
    }

    let mut cursor = Cursor::new(buffer);
    match read_archive(&mut cursor, registry, options)? {
        Archive::Folder(archive) => {
            debug!("unwrapped folder archive from {depth} envelope(s)");
            Ok((archive, cursor.into_inner()))
        }
        Archive::Zbb(envelope) => {
            let inner = envelope.decompress(&mut cursor, None)?;
            open_nested(inner, registry, options, depth + 1)
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::AsuraFormat;
    use crate::chunk::{Chunk, ChunkType};
    use crate::zbb::ZbbOptions;
    use pretty_assertions::assert_eq;

    fn sample_archive() -> FolderArchive {
        FolderArchive::from_chunks(vec![
            Chunk::raw(ChunkType::Text, 1, [0; 4], b"hello world".to_vec()).unwrap(),
            Chunk::raw(ChunkType::Other(*b"XYZW"), 0, [1, 2, 3, 4], vec![9; 40]).unwrap(),
        ])
        .unwrap()
    }

    fn wrap(data: Vec<u8>, times: usize) -> Vec<u8> {
        let options = ZbbOptions::new().with_block_size(1024).unwrap();
        (0..times).fold(data, |inner, _| {
            let mut output = Cursor::new(Vec::new());
            ZbbArchive::compress_to(&mut Cursor::new(inner), &mut output, &options, None).unwrap();
            output.into_inner()
        })
    }

    #[test]
    fn test_read_archive_routes_by_magic() {
        let registry = ChunkRegistry::default();
        let folder = sample_archive().build(&registry).unwrap();

        let archive = read_archive(&mut Cursor::new(&folder), &registry, ReadOptions::eager()).unwrap();
        assert_eq!(archive.archive_type(), ArchiveType::Folder);
        assert_eq!(archive, Archive::Folder(sample_archive()));

        let wrapped = wrap(folder, 1);
        let archive = read_archive(&mut Cursor::new(&wrapped), &registry, ReadOptions::eager()).unwrap();
        assert_eq!(archive.archive_type(), ArchiveType::Zbb);
    }

    #[test]
    fn test_recognized_but_unsupported_kinds() {
        let registry = ChunkRegistry::default();
        for magic in [b"AsuraCmp", b"AsuraZlb"] {
            let err = read_archive(&mut Cursor::new(&magic[..]), &registry, ReadOptions::eager())
                .unwrap_err();
            assert!(err.is_unsupported(), "{err}");
            assert_eq!(err.offset(), Some(0));
        }

        let mut data = vec![0xEE; 8];
        data.extend_from_slice(b"AsuraZlb");
        let mut cursor = Cursor::new(data);
        cursor.set_position(8);
        let err = read_archive(&mut cursor, &registry, ReadOptions::eager()).unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(err.offset(), Some(8));
    }

    #[test]
    fn test_unknown_magic_reports_offset() {
        let registry = ChunkRegistry::default();
        let mut cursor = Cursor::new(b"xxNotAsura!".to_vec());
        cursor.set_position(2);

        let err = read_archive(&mut cursor, &registry, ReadOptions::eager()).unwrap_err();
        assert_eq!(err.offset(), Some(2));
        assert!(!err.is_unsupported());
    }

    #[test]
    fn test_open_archive_unwraps_nested_envelopes() {
        let registry = ChunkRegistry::default();
        let wrapped = wrap(sample_archive().build(&registry).unwrap(), 3);

        let opened =
            open_archive(&mut Cursor::new(&wrapped), &registry, ReadOptions::eager()).unwrap();
        assert!(opened.envelope.is_some());
        assert_eq!(opened.into_archive(), sample_archive());
    }

    #[test]
    fn test_sparse_chunks_load_from_decompressed_buffer() {
        let registry = ChunkRegistry::default();
        let wrapped = wrap(sample_archive().build(&registry).unwrap(), 1);
        let mut source = Cursor::new(&wrapped);

        let mut opened = open_archive(&mut source, &registry, ReadOptions::sparse()).unwrap();
        assert!(!opened.archive.is_loaded());
        assert!(opened.buffer().is_some());

        assert!(opened.load(&mut source, &registry).unwrap());
        assert_eq!(opened.archive, sample_archive());
    }

    #[test]
    fn test_nesting_limit() {
        let registry = ChunkRegistry::default();
        let folder = sample_archive().build(&registry).unwrap();

        let deepest = wrap(folder.clone(), MAX_NESTING);
        assert!(open_archive(&mut Cursor::new(&deepest), &registry, ReadOptions::eager()).is_ok());

        let too_deep = wrap(folder, MAX_NESTING + 1);
        let err = open_archive(&mut Cursor::new(&too_deep), &registry, ReadOptions::eager())
            .unwrap_err();
        assert!(matches!(err, AsuraError::NestingTooDeep(MAX_NESTING)));
    }
}
