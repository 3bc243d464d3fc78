//! Parsers and builders for Asura chunk archives
//!
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Intentional for binary operations
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Chunk tags don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::needless_pass_by_value)] // Configuration types
#![allow(clippy::redundant_closure_for_method_calls)] // Iterator chains
#![allow(clippy::return_self_not_must_use)] // Builder patterns
#![allow(clippy::use_self)] // Type clarity
//! Asura archives are a flat stream of tagged chunks behind an 8-byte magic.
//! This crate reads and writes them symmetrically, and wraps them in the
//! block-compressed Zbb envelope.
//!
//! # Supported Formats
//!
//! - **Folder** (`"Asura   "`): chunk stream terminated by an EOF chunk
//! - **Zbb** (`"AsuraZbb"`): zlib blocks wrapping a serialized archive
//!
//! `"AsuraCmp"` and `"AsuraZlb"` are recognized and reported as unsupported.
//!
//! # Chunk Codecs
//!
//! Chunk payloads are decoded by codecs registered per tag in a
//! [`ChunkRegistry`]. Tags without a codec are kept as raw bytes, so any
//! archive round-trips byte for byte whether or not its chunk types are
//! understood.
//!
//! # Example
//!
//! ```
//! use asura_formats::{AsuraFormat, Chunk, ChunkRegistry, ChunkType, FolderArchive};
//!
//! let registry = ChunkRegistry::default();
//! let archive = FolderArchive::from_chunks(vec![
//!     Chunk::raw(ChunkType::Text, 0, [0; 4], b"hello".to_vec())?,
//! ])?;
//!
//! let bytes = archive.build(&registry)?;
//! assert_eq!(&bytes[..8], b"Asura   ");
//! assert_eq!(FolderArchive::parse(&bytes, &registry)?, archive);
//! # Ok::<(), asura_formats::AsuraError>(())
//! ```

#![warn(missing_docs)]

/// Archive magics
pub mod archive_type;
pub mod chunk;
pub mod dispatch;
/// Error types
pub mod error;
pub mod folder;
/// Stream primitives: little-endian scalars, strings, bookmarks and backpatching
pub mod io;
pub mod registry;
pub mod zbb;

// Test utilities module
#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_utils;

pub use archive_type::ArchiveType;
pub use chunk::{Chunk, ChunkBody, ChunkHeader, ChunkPayload, ChunkType, RawCodec};
pub use dispatch::{Archive, OpenedArchive, open_archive, read_archive};
pub use error::{AsuraError, AsuraResult};
pub use folder::{FolderArchive, ReadOptions};
pub use registry::{ChunkCodec, ChunkRegistry};
pub use zbb::{BlockProgress, ZbbArchive, ZbbBlock, ZbbOptions};

/// Symmetric parse/build for formats whose payloads go through a registry
pub trait AsuraFormat: Sized {
    /// Parse from bytes
    fn parse(data: &[u8], registry: &ChunkRegistry) -> AsuraResult<Self>;

    /// Build to bytes
    fn build(&self, registry: &ChunkRegistry) -> AsuraResult<Vec<u8>>;

    /// Verify that building the parsed value reproduces `data` exactly
    fn verify_round_trip(data: &[u8], registry: &ChunkRegistry) -> AsuraResult<()> {
        let rebuilt = Self::parse(data, registry)?.build(registry)?;
        if data != rebuilt.as_slice() {
            let offset = data
                .iter()
                .zip(&rebuilt)
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| data.len().min(rebuilt.len()));
            return Err(AsuraError::RoundTripMismatch {
                offset,
                original_len: data.len(),
                rebuilt_len: rebuilt.len(),
            });
        }
        Ok(())
    }
}
