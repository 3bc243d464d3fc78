//! Asura error types

use thiserror::Error;

use crate::archive_type::ArchiveType;
use crate::chunk::ChunkType;

/// Text encoding named in string decode failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringEncoding {
    /// UTF-8
    Utf8,
    /// UTF-16, little-endian
    Utf16Le,
}

impl std::fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Utf8 => f.write_str("UTF-8"),
            Self::Utf16Le => f.write_str("UTF-16LE"),
        }
    }
}

/// Asura-specific error type
#[derive(Debug, Error)]
pub enum AsuraError {
    /// A tag or field could not be resolved to a known or open value
    #[error("cannot decode {what} from {value:02X?}")]
    Decode {
        /// What was being decoded
        what: &'static str,
        /// The raw bytes that failed to decode
        value: Vec<u8>,
    },

    /// Strict boolean decode saw something other than 0x00 or 0x01
    #[error("invalid strict boolean byte: 0x{0:02X}")]
    InvalidBool(u8),

    /// String bytes are not valid in the requested encoding
    #[error("invalid {encoding} string: {bytes:02X?}")]
    InvalidString {
        /// Encoding that was requested
        encoding: StringEncoding,
        /// Raw bytes of the string
        bytes: Vec<u8>,
    },

    /// Terminator scan reached the end of the stream
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString {
        /// Offset of the string's first byte
        offset: u64,
    },

    /// Non-EOF chunk header declares a length shorter than the header itself
    #[error("invalid chunk length {length} for {chunk_type} (minimum is 16)")]
    InvalidHeaderLength {
        /// Chunk type from the header
        chunk_type: ChunkType,
        /// Declared length
        length: u32,
    },

    /// A lower-level failure, annotated with where it was detected
    #[error("parsing failed at offset {offset}: {source}")]
    Parsing {
        /// Byte offset of the failing field
        offset: u64,
        /// Underlying cause
        #[source]
        source: Box<AsuraError>,
    },

    /// A chunk handler consumed a different number of bytes than declared
    #[error(
        "chunk {chunk_type} starting at offset {start} should end at {expected_end}, handler stopped at {actual_end}"
    )]
    ChunkSizeMismatch {
        /// Chunk type being read
        chunk_type: ChunkType,
        /// Offset of the chunk payload
        start: u64,
        /// `start + payload_size`
        expected_end: u64,
        /// Position after the handler returned
        actual_end: u64,
    },

    /// A Zbb block decompressed to the wrong number of bytes
    #[error("block {index} decompressed to {actual} bytes, header declares {expected}")]
    BlockSizeMismatch {
        /// Block index
        index: usize,
        /// Declared decompressed size
        expected: u64,
        /// Bytes actually produced
        actual: u64,
    },

    /// Sum of decompressed blocks disagrees with the envelope total
    #[error("envelope decompressed to {actual} bytes, header declares {expected}")]
    EnvelopeSizeMismatch {
        /// Declared decompressed total
        expected: u64,
        /// Bytes actually produced
        actual: u64,
    },

    /// Zbb block records run past the envelope's declared compressed total
    #[error("zbb block table ends at {actual_end}, envelope header declares {expected_end}")]
    BlockTableOverrun {
        /// End of the block records according to the envelope header
        expected_end: u64,
        /// Where the last block record actually ends
        actual_end: u64,
    },

    /// EOF appeared somewhere other than the end of a chunk sequence
    #[error("EOF chunk at index {index} is not the last chunk")]
    MisplacedEof {
        /// Position of the offending EOF
        index: usize,
    },

    /// Recognized archive kind without an implementation
    #[error("archive type {0} is recognized but not supported")]
    Unsupported(ArchiveType),

    /// Operation needs a parsed chunk but found a sparse placeholder
    #[error("chunk {chunk_type} at index {index} has not been loaded")]
    ChunkNotLoaded {
        /// Chunk type of the placeholder
        chunk_type: ChunkType,
        /// Index in the chunk sequence (or 0 when detached)
        index: usize,
    },

    /// Chunk index past the end of the archive
    #[error("chunk index {index} out of range (archive has {len} chunks)")]
    ChunkIndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of chunks, including EOF
        len: usize,
    },

    /// Chunk type the archive engine handles itself
    #[error("chunk type {0} is reserved for the archive engine")]
    ReservedChunkType(ChunkType),

    /// Invalid block size for the envelope codec
    #[error("invalid block size: {size} bytes (must be between {min} and {max} bytes)")]
    InvalidBlockSize {
        /// The invalid size that was provided
        size: usize,
        /// Minimum allowed size
        min: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Invalid zlib compression level
    #[error("invalid compression level: {0} (must be 0-9)")]
    InvalidLevel(u32),

    /// A string is longer than its fixed-size field
    #[error("{encoding} string of {length} units does not fit a fixed field of {capacity}")]
    FixedStringOverflow {
        /// Encoding being written
        encoding: StringEncoding,
        /// Units the value needs
        length: usize,
        /// Units the field holds
        capacity: usize,
    },

    /// A value does not fit its fixed-width wire field
    #[error("{what} of {value} does not fit in a 32-bit field")]
    FieldOverflow {
        /// Field being written
        what: &'static str,
        /// Value that overflowed
        value: u64,
    },

    /// Progress callback requested an abort
    #[error("cancelled after block {index} of {total}")]
    Cancelled {
        /// Last completed block index
        index: usize,
        /// Total number of blocks
        total: usize,
    },

    /// Envelope contains envelopes deeper than the dispatcher allows
    #[error("archive nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    /// zlib compression/decompression failure
    #[error("compression error: {0}")]
    Compression(String),

    /// Rebuilt bytes differ from the parsed input
    #[error("round-trip mismatch at byte {offset} (original {original_len} bytes, rebuilt {rebuilt_len} bytes)")]
    RoundTripMismatch {
        /// First differing byte
        offset: usize,
        /// Length of the input
        original_len: usize,
        /// Length of the rebuilt output
        rebuilt_len: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(binrw::Error),
}

impl From<binrw::Error> for AsuraError {
    fn from(error: binrw::Error) -> Self {
        match error {
            binrw::Error::Io(e) => Self::Io(e),
            // derived readers wrap field failures in a backtrace
            binrw::Error::Backtrace(backtrace) if is_binrw_io(&backtrace.error) => {
                Self::from(*backtrace.error)
            }
            other => Self::BinRw(other),
        }
    }
}

fn is_binrw_io(error: &binrw::Error) -> bool {
    match error {
        binrw::Error::Io(_) => true,
        binrw::Error::Backtrace(backtrace) => is_binrw_io(&backtrace.error),
        _ => false,
    }
}

impl AsuraError {
    /// Wrap an error with the offset where it was detected
    pub fn at(self, offset: u64) -> Self {
        Self::Parsing {
            offset,
            source: Box::new(self),
        }
    }

    /// Attach `offset` unless the error already names one
    pub fn locate(self, offset: u64) -> Self {
        if self.offset().is_some() {
            self
        } else {
            self.at(offset)
        }
    }

    /// Recognized-but-unimplemented input, as opposed to corrupt input
    pub fn is_unsupported(&self) -> bool {
        match self {
            Self::Unsupported(_) => true,
            Self::Parsing { source, .. } => source.is_unsupported(),
            _ => false,
        }
    }

    /// Byte accounting disagreed with a declared length
    pub fn is_consistency(&self) -> bool {
        match self {
            Self::ChunkSizeMismatch { .. }
            | Self::BlockSizeMismatch { .. }
            | Self::EnvelopeSizeMismatch { .. }
            | Self::BlockTableOverrun { .. }
            | Self::MisplacedEof { .. } => true,
            Self::Parsing { source, .. } => source.is_consistency(),
            _ => false,
        }
    }

    /// Outermost byte offset attached to this error, if any
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Parsing { offset, .. } => Some(*offset),
            Self::ChunkSizeMismatch { start, .. } => Some(*start),
            Self::UnterminatedString { offset } => Some(*offset),
            _ => None,
        }
    }
}

/// Result type for Asura operations
pub type AsuraResult<T> = Result<T, AsuraError>;
