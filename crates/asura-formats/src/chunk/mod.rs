//! Chunks: a header plus a type-specific body
//!
//! Bodies are either opaque bytes preserved verbatim, a payload produced by a
//! registered [`ChunkCodec`](crate::registry::ChunkCodec), a sparse
//! placeholder that remembers where its payload lives, or the EOF sentinel.

mod chunk_type;
mod header;
mod raw;

pub use chunk_type::ChunkType;
pub use header::{ChunkHeader, EOF_SIZE, HEADER_SIZE};
pub use raw::RawCodec;

use std::any::Any;
use std::fmt;

use crate::error::{AsuraError, AsuraResult};
use crate::io::WriteSeek;

/// Object-safe clone, equality and downcast support for payloads
///
/// Implemented automatically for every `ChunkPayload + Clone + PartialEq`.
pub trait PayloadBase: Any + Send + Sync {
    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Clone into a new box
    fn clone_payload(&self) -> Box<dyn ChunkPayload>;

    /// Equality against another payload of any concrete type
    fn payload_eq(&self, other: &dyn ChunkPayload) -> bool;
}

impl<T> PayloadBase for T
where
    T: ChunkPayload + Clone + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_payload(&self) -> Box<dyn ChunkPayload> {
        Box::new(self.clone())
    }

    fn payload_eq(&self, other: &dyn ChunkPayload) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }
}

/// A decoded, type-specific chunk payload
pub trait ChunkPayload: PayloadBase + fmt::Debug {
    /// Serialize the payload (without the chunk header)
    fn write_payload(&self, writer: &mut dyn WriteSeek) -> AsuraResult<()>;
}

impl dyn ChunkPayload {
    /// Borrow the payload as its concrete type
    pub fn downcast_ref<T: ChunkPayload>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Chunk body variants
#[derive(Debug)]
pub enum ChunkBody {
    /// Opaque payload bytes
    Raw(Vec<u8>),
    /// Payload decoded by a registered codec
    Parsed(Box<dyn ChunkPayload>),
    /// Not yet loaded; the payload starts at `offset` in the source stream
    Sparse {
        /// Absolute offset of the payload's first byte
        offset: u64,
    },
    /// End-of-archive sentinel
    Eof,
}

impl Clone for ChunkBody {
    fn clone(&self) -> Self {
        match self {
            Self::Raw(bytes) => Self::Raw(bytes.clone()),
            Self::Parsed(payload) => Self::Parsed(payload.clone_payload()),
            Self::Sparse { offset } => Self::Sparse { offset: *offset },
            Self::Eof => Self::Eof,
        }
    }
}

impl PartialEq for ChunkBody {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Raw(a), Self::Raw(b)) => a == b,
            (Self::Parsed(a), Self::Parsed(b)) => a.payload_eq(&**b),
            (Self::Sparse { offset: a }, Self::Sparse { offset: b }) => a == b,
            (Self::Eof, Self::Eof) => true,
            _ => false,
        }
    }
}

/// A single chunk of an archive
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Header as read, or as constructed
    pub header: ChunkHeader,
    /// Chunk body
    pub body: ChunkBody,
}

impl Chunk {
    /// Opaque chunk around `payload`, with a header length that matches it
    pub fn raw(
        chunk_type: ChunkType,
        version: u32,
        reserved: [u8; 4],
        payload: Vec<u8>,
    ) -> AsuraResult<Self> {
        let header = ChunkHeader::new(chunk_type, version, reserved, payload.len())?;
        Ok(Self {
            header,
            body: ChunkBody::Raw(payload),
        })
    }

    /// Chunk wrapping a decoded payload
    pub fn parsed<P: ChunkPayload>(header: ChunkHeader, payload: P) -> Self {
        Self {
            header,
            body: ChunkBody::Parsed(Box::new(payload)),
        }
    }

    /// The end-of-archive sentinel
    pub const fn eof() -> Self {
        Self {
            header: ChunkHeader::eof(),
            body: ChunkBody::Eof,
        }
    }

    /// Chunk tag
    pub const fn chunk_type(&self) -> ChunkType {
        self.header.chunk_type
    }

    /// Whether this is the end-of-archive sentinel
    pub const fn is_eof(&self) -> bool {
        self.header.is_eof()
    }

    /// Whether the body is still a sparse placeholder
    pub const fn is_sparse(&self) -> bool {
        matches!(self.body, ChunkBody::Sparse { .. })
    }

    /// Opaque payload bytes, if the body is raw
    pub fn raw_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            ChunkBody::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Decoded payload as its concrete type
    pub fn payload<T: ChunkPayload>(&self) -> Option<&T> {
        match &self.body {
            ChunkBody::Parsed(payload) => payload.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Serialize the body without its header
    ///
    /// Sparse placeholders must be loaded first; EOF has no body.
    pub fn write_body(&self, writer: &mut dyn WriteSeek) -> AsuraResult<()> {
        match &self.body {
            ChunkBody::Raw(bytes) => {
                writer.write_all(bytes)?;
                Ok(())
            }
            ChunkBody::Parsed(payload) => payload.write_payload(writer),
            ChunkBody::Sparse { .. } => Err(AsuraError::ChunkNotLoaded {
                chunk_type: self.chunk_type(),
                index: 0,
            }),
            ChunkBody::Eof => Err(AsuraError::ReservedChunkType(ChunkType::Eof)),
        }
    }
}
