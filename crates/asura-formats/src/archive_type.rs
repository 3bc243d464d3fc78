//! Archive kinds and their 8-byte magics

use std::fmt;
use std::io::{Read, Seek, Write};

use crate::error::{AsuraError, AsuraResult};

/// Length of every archive magic
pub const MAGIC_LEN: usize = 8;

/// Kind of Asura container, identified by its leading magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveType {
    /// Plain chunk stream (`"Asura   "`)
    Folder,
    /// Legacy compressed container (`"AsuraCmp"`), not supported
    Compressed,
    /// Single-stream zlib container (`"AsuraZlb"`), not supported
    ZLib,
    /// Block-compressed envelope (`"AsuraZbb"`)
    Zbb,
}

impl ArchiveType {
    /// All archive kinds, in magic order
    pub const ALL: [Self; 4] = [Self::Folder, Self::Compressed, Self::ZLib, Self::Zbb];

    /// The magic bytes for this kind
    pub const fn magic(self) -> &'static [u8; MAGIC_LEN] {
        match self {
            Self::Folder => b"Asura   ",
            Self::Compressed => b"AsuraCmp",
            Self::ZLib => b"AsuraZlb",
            Self::Zbb => b"AsuraZbb",
        }
    }

    /// Resolve a magic to its archive kind
    pub fn from_magic(magic: &[u8]) -> AsuraResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.magic().as_slice() == magic)
            .ok_or_else(|| AsuraError::Decode {
                what: "archive type",
                value: magic.to_vec(),
            })
    }

    /// Whether this crate can parse archives of this kind
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Folder | Self::Zbb)
    }

    /// Read the magic at the current position
    ///
    /// An unknown magic is reported as a parsing error at the magic's offset.
    pub fn read<R: Read + Seek + ?Sized>(reader: &mut R) -> AsuraResult<Self> {
        let offset = reader.stream_position()?;
        let mut magic = [0u8; MAGIC_LEN];
        reader.read_exact(&mut magic)?;
        Self::from_magic(&magic).map_err(|e| e.at(offset))
    }

    /// Write the magic for this kind
    pub fn write<W: Write + ?Sized>(self, writer: &mut W) -> AsuraResult<u64> {
        writer.write_all(self.magic())?;
        Ok(MAGIC_LEN as u64)
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Folder => "Folder",
            Self::Compressed => "Compressed",
            Self::ZLib => "ZLib",
            Self::Zbb => "Zbb",
        };
        f.write_str(name)
    }
}
