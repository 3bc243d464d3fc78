//! Four-byte chunk tags

use std::fmt;

use crate::error::{AsuraError, AsuraResult};

macro_rules! known_chunk_types {
    ($($(#[$meta:meta])* $variant:ident => $tag:literal,)+) => {
        /// A chunk tag
        ///
        /// Tags with a dedicated variant never decode to [`ChunkType::Other`];
        /// any other valid-UTF-8 tag is kept verbatim.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ChunkType {
            /// End-of-archive sentinel (four zero bytes)
            Eof,
            $($(#[$meta])* $variant,)+
            /// Any other tag
            Other([u8; 4]),
        }

        impl ChunkType {
            /// Every tag with a dedicated variant, excluding [`ChunkType::Eof`]
            pub const KNOWN: &'static [Self] = &[$(Self::$variant,)+];

            /// The four wire bytes of this tag
            pub const fn tag(self) -> [u8; 4] {
                match self {
                    Self::Eof => [0; 4],
                    $(Self::$variant => *$tag,)+
                    Self::Other(tag) => tag,
                }
            }

            /// Resolve four bytes into a tag, normalizing known values
            pub fn from_tag(tag: [u8; 4]) -> AsuraResult<Self> {
                if std::str::from_utf8(&tag).is_err() {
                    return Err(AsuraError::Decode {
                        what: "chunk type",
                        value: tag.to_vec(),
                    });
                }
                Ok(match &tag {
                    [0, 0, 0, 0] => Self::Eof,
                    $($tag => Self::$variant,)+
                    _ => Self::Other(tag),
                })
            }
        }
    };
}

known_chunk_types! {
    /// Resource file
    Resource => b"RSCF",
    /// Resource list
    ResourceList => b"RSFL",
    /// Font
    Font => b"FONT",
    /// Font metadata
    FontInfo => b"FNFO",
    /// Font description
    FontDescription => b"FNTK",
    /// Hashed text table
    HText => b"HTXT",
    /// Text table
    LText => b"LTXT",
    /// Text table
    PText => b"PTXT",
    /// Text table
    TText => b"TTXT",
    /// Text table
    Text => b"TEXT",
    /// Sound clip
    Sound => b"ASTS",
    /// Texture set
    Texture => b"TXST",
    /// Dialogue table
    DialogueLt => b"DLLT",
    /// Dialogue table
    DialogueIg => b"DLIG",
    /// Dialogue table
    DialogueLn => b"DLLN",
    /// Dialogue events
    DialogueEv => b"DLEV",
    /// Dialogue events
    DialogueEt => b"DLET",
    /// Skinned mesh
    Hskn => b"HSKN",
    /// Skinned mesh bounding boxes
    Hsbb => b"HSBB",
    /// Skeleton
    Hske => b"HSKE",
    /// Skeleton links
    Hskl => b"HSKL",
    /// Skeleton nodes
    Hsnd => b"HSND",
    /// Morph targets
    Hmpt => b"HMPT",
    /// Environment base
    EnvironmentBase => b"bsnf",
}

impl ChunkType {
    /// Whether this is the end-of-archive sentinel
    pub const fn is_eof(self) -> bool {
        matches!(self, Self::Eof)
    }

    /// Resolve a file extension such as `"RSCF"` or `"FOG"`, right-padding to four bytes with spaces
    pub fn from_extension(extension: &str) -> AsuraResult<Self> {
        let bytes = extension.as_bytes();
        if bytes.is_empty() || bytes.len() > 4 {
            return Err(AsuraError::Decode {
                what: "chunk type extension",
                value: bytes.to_vec(),
            });
        }
        let mut tag = [b' '; 4];
        tag[..bytes.len()].copy_from_slice(bytes);
        Self::from_tag(tag)
    }

    /// File extension for unpacked chunks: the tag with trailing spaces trimmed
    pub fn extension(&self) -> String {
        self.to_string().trim_end_matches(' ').to_string()
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eof => f.write_str("EOF"),
            other => {
                let tag = other.tag();
                match std::str::from_utf8(&tag) {
                    Ok(text) => f.write_str(text),
                    Err(_) => write!(f, "{}", hex_tag(&tag)),
                }
            }
        }
    }
}

fn hex_tag(tag: &[u8; 4]) -> String {
    tag.iter().map(|b| format!("{b:02x}")).collect()
}
