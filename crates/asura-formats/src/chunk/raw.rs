//! Opaque fallback codec

use std::io::{self, Read};

use super::{ChunkBody, ChunkHeader};
use crate::error::AsuraResult;
use crate::io::ReadSeek;
use crate::registry::ChunkCodec;

/// Keeps the payload as exactly `payload_size` opaque bytes
///
/// Used for every chunk type without a registered codec. Writing emits the
/// bytes unchanged, so unknown chunks round-trip byte for byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawCodec;

impl ChunkCodec for RawCodec {
    fn read(&self, reader: &mut dyn ReadSeek, header: &ChunkHeader) -> AsuraResult<ChunkBody> {
        let size = u64::from(header.payload_size().unwrap_or(0));
        let mut payload = Vec::new();
        (&mut *reader).take(size).read_to_end(&mut payload)?;

        if payload.len() as u64 != size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} payload truncated: {} of {size} bytes",
                    header.chunk_type,
                    payload.len()
                ),
            )
            .into());
        }
        Ok(ChunkBody::Raw(payload))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::chunk::ChunkType;
    use crate::error::AsuraError;
    use std::io::Cursor;

    #[test]
    fn test_truncated_payload_is_io_error() {
        let header = ChunkHeader::new(ChunkType::Sound, 0, [0; 4], 8).unwrap();
        let mut cursor = Cursor::new(vec![0u8; 5]);

        let err = RawCodec.read(&mut cursor, &header).unwrap_err();
        assert!(matches!(err, AsuraError::Io(_)));
    }

    #[test]
    fn test_empty_payload() {
        let header = ChunkHeader::new(ChunkType::Sound, 0, [0; 4], 0).unwrap();
        let mut cursor = Cursor::new(Vec::new());

        let body = RawCodec.read(&mut cursor, &header).unwrap();
        assert_eq!(body, ChunkBody::Raw(Vec::new()));
    }
}
