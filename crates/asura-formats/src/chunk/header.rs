//! Chunk header codec
//!
//! ```text
//! offset  size  field
//! 0       4     chunk type tag
//! 4       4     length (u32, includes these 16 header bytes)
//! 8       4     version (u32)
//! 12      4     reserved
//! ```
//!
//! The end-of-archive header is the four-byte zero tag alone.

use binrw::{BinRead, BinWrite};
use std::io::{Read, Seek, Write};

use super::ChunkType;
use crate::error::{AsuraError, AsuraResult};
use crate::io::{AsuraWrite, ReservedU32, wire_u32};

/// Size of a full chunk header
pub const HEADER_SIZE: u32 = 16;

/// Size of the end-of-archive header
pub const EOF_SIZE: u32 = 4;

/// Fields that follow the tag in a non-EOF header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
struct HeaderTail {
    length: u32,
    version: u32,
    reserved: [u8; 4],
}

/// Header preceding every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkHeader {
    /// Chunk tag
    pub chunk_type: ChunkType,
    /// Total chunk length including this header (0 for EOF)
    pub length: u32,
    /// Payload version
    pub version: u32,
    /// Reserved bytes, preserved verbatim
    pub reserved: [u8; 4],
}

impl ChunkHeader {
    /// Header for a payload of `payload_size` bytes
    pub fn new(
        chunk_type: ChunkType,
        version: u32,
        reserved: [u8; 4],
        payload_size: usize,
    ) -> AsuraResult<Self> {
        let length = wire_u32("chunk length", payload_size as u64 + u64::from(HEADER_SIZE))?;
        Ok(Self {
            chunk_type,
            length,
            version,
            reserved,
        })
    }

    /// The end-of-archive header
    pub const fn eof() -> Self {
        Self {
            chunk_type: ChunkType::Eof,
            length: 0,
            version: 0,
            reserved: [0; 4],
        }
    }

    /// Whether this is the end-of-archive header
    pub const fn is_eof(&self) -> bool {
        self.chunk_type.is_eof()
    }

    /// Payload bytes following the header, `None` for EOF
    pub const fn payload_size(&self) -> Option<u32> {
        if self.is_eof() {
            None
        } else {
            Some(self.length.saturating_sub(HEADER_SIZE))
        }
    }

    /// Bytes this header occupies on the wire
    pub const fn wire_size(&self) -> u32 {
        if self.is_eof() { EOF_SIZE } else { HEADER_SIZE }
    }

    /// Read a header, branching on the EOF tag before the remaining fields
    ///
    /// Failures are reported as parsing errors at the header's first byte.
    pub fn read<R: Read + Seek + ?Sized>(reader: &mut R) -> AsuraResult<Self> {
        let offset = reader.stream_position()?;
        Self::read_fields(reader).map_err(|e| e.at(offset))
    }

    fn read_fields<R: Read + Seek + ?Sized>(reader: &mut R) -> AsuraResult<Self> {
        let mut tag = [0u8; 4];
        reader.read_exact(&mut tag)?;
        let chunk_type = ChunkType::from_tag(tag)?;
        if chunk_type.is_eof() {
            return Ok(Self::eof());
        }

        let mut stream = &mut *reader;
        let tail = HeaderTail::read(&mut stream)?;
        if tail.length < HEADER_SIZE {
            return Err(AsuraError::InvalidHeaderLength {
                chunk_type,
                length: tail.length,
            });
        }

        Ok(Self {
            chunk_type,
            length: tail.length,
            version: tail.version,
            reserved: tail.reserved,
        })
    }

    /// Write the header as-is and return the bytes written
    pub fn write<W: Write + Seek + ?Sized>(&self, writer: &mut W) -> AsuraResult<u64> {
        writer.write_word(self.chunk_type.tag())?;
        if self.is_eof() {
            return Ok(u64::from(EOF_SIZE));
        }

        let mut stream = &mut *writer;
        self.tail().write(&mut stream)?;
        Ok(u64::from(HEADER_SIZE))
    }

    /// Write the header with a reserved length field to backpatch later
    ///
    /// EOF headers have no length field and are written with [`ChunkHeader::write`].
    pub fn write_placeholder<W: Write + Seek + ?Sized>(
        &self,
        writer: &mut W,
    ) -> AsuraResult<ReservedU32> {
        if self.is_eof() {
            return Err(AsuraError::ReservedChunkType(ChunkType::Eof));
        }

        writer.write_word(self.chunk_type.tag())?;
        let length = writer.reserve_u32()?;
        writer.write_u32(self.version)?;
        writer.write_word(self.reserved)?;
        Ok(length)
    }

    const fn tail(&self) -> HeaderTail {
        HeaderTail {
            length: self.length,
            version: self.version,
            reserved: self.reserved,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    #[test]
    fn test_header_wire_layout() {
        let header = ChunkHeader {
            chunk_type: ChunkType::Resource,
            length: 0x20,
            version: 2,
            reserved: [0xAA, 0xBB, 0xCC, 0xDD],
        };

        let mut cursor = Cursor::new(Vec::new());
        assert_eq!(header.write(&mut cursor).unwrap(), 16);
        assert_eq!(
            cursor.get_ref().as_slice(),
            b"RSCF\x20\x00\x00\x00\x02\x00\x00\x00\xAA\xBB\xCC\xDD"
        );

        cursor.set_position(0);
        let parsed = ChunkHeader::read(&mut cursor).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.payload_size(), Some(0x10));
    }

    #[test]
    fn test_eof_header_is_tag_only() {
        let mut cursor = Cursor::new(vec![0u8; 4]);
        let header = ChunkHeader::read(&mut cursor).unwrap();
        assert!(header.is_eof());
        assert_eq!(header.payload_size(), None);
        assert_eq!(cursor.position(), 4);

        let mut out = Cursor::new(Vec::new());
        assert_eq!(ChunkHeader::eof().write(&mut out).unwrap(), 4);
        assert_eq!(out.into_inner(), vec![0u8; 4]);
    }

    #[test]
    fn test_short_length_is_rejected_at_header_offset() {
        let mut data = vec![0xEE; 8];
        data.extend_from_slice(b"XYZW\x0F\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00");
        let mut cursor = Cursor::new(data);
        cursor.set_position(8);

        let err = ChunkHeader::read(&mut cursor).unwrap_err();
        assert_eq!(err.offset(), Some(8));
        match err {
            AsuraError::Parsing { source, .. } => assert!(matches!(
                *source,
                AsuraError::InvalidHeaderLength { length: 15, .. }
            )),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_truncated_header_is_io_error() {
        let mut cursor = Cursor::new(b"XYZW\x14\x00".to_vec());
        let err = ChunkHeader::read(&mut cursor).unwrap_err();
        match err {
            AsuraError::Parsing { offset, source } => {
                assert_eq!(offset, 0);
                assert!(matches!(*source, AsuraError::Io(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_placeholder_backpatch() {
        let header = ChunkHeader::new(ChunkType::Other(*b"XYZW"), 1, [0; 4], 0).unwrap();
        let mut cursor = Cursor::new(Vec::new());
        let slot = header.write_placeholder(&mut cursor).unwrap();
        cursor.write_all(b"DATA").unwrap();
        slot.fill(&mut cursor, 20).unwrap();

        cursor.set_position(0);
        let parsed = ChunkHeader::read(&mut cursor).unwrap();
        assert_eq!(parsed.length, 20);
        assert_eq!(parsed.version, 1);

        assert!(ChunkHeader::eof().write_placeholder(&mut cursor).is_err());
    }
}
