//! Word-aligned binary stream primitives
//!
//! Every Asura structure is little-endian and many variable-length fields are
//! padded to a 4-byte word boundary measured from the field's own start. The
//! helpers here are shared by the chunk header codec, the folder archive
//! engine, the Zbb envelope codec and any external payload codec:
//!
//! - [`AsuraRead`] / [`AsuraWrite`]: fixed-width integers, words, booleans
//!   and strings on any `Read + Seek` / `Write + Seek` stream
//! - [`Bookmark`]: restores the stream position on every exit path
//! - [`ByteCounter`]: measures how far a stream moved
//! - [`ReservedU32`]: the placeholder/backpatch idiom used for every length
//!   field that is only known after its content has been written

mod strings;

pub use strings::{StringOptions, StringSize, Terminator};

use binrw::{BinRead, BinWrite};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::{Deref, DerefMut};

use crate::error::{AsuraError, AsuraResult};

/// Alignment unit for padded fields
pub const WORD_SIZE: usize = 4;

/// Object-safe alias for readable, seekable streams
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Object-safe alias for writable, seekable streams
pub trait WriteSeek: Write + Seek {}

impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// Number of zero bytes needed to extend `len` to the next word boundary
pub const fn word_padding(len: usize) -> usize {
    (WORD_SIZE - len % WORD_SIZE) % WORD_SIZE
}

/// Total stream length, leaving the current position untouched
pub fn stream_len<S: Seek + ?Sized>(stream: &mut S) -> AsuraResult<u64> {
    with_bookmark(stream, |s| Ok(s.seek(SeekFrom::End(0))?))
}

/// Convert a length to its 32-bit wire representation
pub(crate) fn wire_u32(what: &'static str, value: u64) -> AsuraResult<u32> {
    u32::try_from(value).map_err(|_| AsuraError::FieldOverflow { what, value })
}

/// Little-endian read primitives for Asura streams
pub trait AsuraRead: Read + Seek {
    /// Read an unsigned 16-bit integer
    fn read_u16(&mut self) -> AsuraResult<u16> {
        let mut stream = self;
        Ok(u16::read_le(&mut stream)?)
    }

    /// Read an unsigned 32-bit integer
    fn read_u32(&mut self) -> AsuraResult<u32> {
        let mut stream = self;
        Ok(u32::read_le(&mut stream)?)
    }

    /// Read an unsigned 64-bit integer
    fn read_u64(&mut self) -> AsuraResult<u64> {
        let mut stream = self;
        Ok(u64::read_le(&mut stream)?)
    }

    /// Read a signed 16-bit integer
    fn read_i16(&mut self) -> AsuraResult<i16> {
        let mut stream = self;
        Ok(i16::read_le(&mut stream)?)
    }

    /// Read a signed 32-bit integer
    fn read_i32(&mut self) -> AsuraResult<i32> {
        let mut stream = self;
        Ok(i32::read_le(&mut stream)?)
    }

    /// Read a signed 64-bit integer
    fn read_i64(&mut self) -> AsuraResult<i64> {
        let mut stream = self;
        Ok(i64::read_le(&mut stream)?)
    }

    /// Read a single byte
    fn read_byte(&mut self) -> AsuraResult<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    /// Read a boolean that must be exactly `0x00` or `0x01`
    fn read_bool(&mut self) -> AsuraResult<bool> {
        match self.read_byte()? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            other => Err(AsuraError::InvalidBool(other)),
        }
    }

    /// Read a boolean where any non-zero byte is `true`
    fn read_bool_lenient(&mut self) -> AsuraResult<bool> {
        Ok(self.read_byte()? != 0x00)
    }

    /// Read a raw 4-byte word
    fn read_word(&mut self) -> AsuraResult<[u8; 4]> {
        let mut word = [0u8; WORD_SIZE];
        self.read_exact(&mut word)?;
        Ok(word)
    }

    /// Read a UTF-8 string
    fn read_utf8(&mut self, options: StringOptions) -> AsuraResult<String> {
        strings::read_utf8(self, options)
    }

    /// Read a UTF-16LE string
    fn read_utf16(&mut self, options: StringOptions) -> AsuraResult<String> {
        strings::read_utf16(self, options)
    }

    /// Read a size-prefixed block of NUL-separated UTF-8 strings
    fn read_utf8_list(&mut self) -> AsuraResult<Vec<String>> {
        strings::read_utf8_list(self)
    }
}

impl<R: Read + Seek + ?Sized> AsuraRead for R {}

/// Little-endian write primitives for Asura streams
///
/// Methods that emit variable-length data return the number of bytes written.
pub trait AsuraWrite: Write + Seek {
    /// Write an unsigned 16-bit integer
    fn write_u16(&mut self, value: u16) -> AsuraResult<()> {
        let mut stream = self;
        Ok(value.write_le(&mut stream)?)
    }

    /// Write an unsigned 32-bit integer
    fn write_u32(&mut self, value: u32) -> AsuraResult<()> {
        let mut stream = self;
        Ok(value.write_le(&mut stream)?)
    }

    /// Write an unsigned 64-bit integer
    fn write_u64(&mut self, value: u64) -> AsuraResult<()> {
        let mut stream = self;
        Ok(value.write_le(&mut stream)?)
    }

    /// Write a signed 16-bit integer
    fn write_i16(&mut self, value: i16) -> AsuraResult<()> {
        let mut stream = self;
        Ok(value.write_le(&mut stream)?)
    }

    /// Write a signed 32-bit integer
    fn write_i32(&mut self, value: i32) -> AsuraResult<()> {
        let mut stream = self;
        Ok(value.write_le(&mut stream)?)
    }

    /// Write a signed 64-bit integer
    fn write_i64(&mut self, value: i64) -> AsuraResult<()> {
        let mut stream = self;
        Ok(value.write_le(&mut stream)?)
    }

    /// Write a single byte
    fn write_byte(&mut self, value: u8) -> AsuraResult<()> {
        self.write_all(&[value])?;
        Ok(())
    }

    /// Write a boolean as `0x00`/`0x01`
    fn write_bool(&mut self, value: bool) -> AsuraResult<()> {
        self.write_byte(u8::from(value))
    }

    /// Write a raw 4-byte word
    fn write_word(&mut self, word: [u8; 4]) -> AsuraResult<()> {
        self.write_all(&word)?;
        Ok(())
    }

    /// Write a UTF-8 string
    fn write_utf8(&mut self, value: &str, options: StringOptions) -> AsuraResult<u64> {
        strings::write_utf8(self, value, options)
    }

    /// Write a UTF-16LE string
    fn write_utf16(&mut self, value: &str, options: StringOptions) -> AsuraResult<u64> {
        strings::write_utf16(self, value, options)
    }

    /// Write a size-prefixed block of NUL-terminated UTF-8 strings
    fn write_utf8_list(&mut self, values: &[String]) -> AsuraResult<u64> {
        strings::write_utf8_list(self, values)
    }

    /// Write a zero placeholder for a 32-bit field to be backpatched later
    fn reserve_u32(&mut self) -> AsuraResult<ReservedU32> {
        let offset = self.stream_position()?;
        self.write_u32(0)?;
        Ok(ReservedU32 { offset })
    }
}

impl<W: Write + Seek + ?Sized> AsuraWrite for W {}

/// A 32-bit field written as a placeholder whose value is known later
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a reserved field must be filled"]
pub struct ReservedU32 {
    offset: u64,
}

impl ReservedU32 {
    /// Absolute offset of the reserved field
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Overwrite the placeholder and return to where writing stopped
    pub fn fill<W: Write + Seek + ?Sized>(self, writer: &mut W, value: u32) -> AsuraResult<()> {
        let mut guard = Bookmark::new(writer)?;
        guard.seek(SeekFrom::Start(self.offset))?;
        guard.write_u32(value)?;
        guard.restore()
    }
}

/// Scope guard that seeks back to where it was created when dropped
///
/// Dropping restores on a best-effort basis (seek errors cannot surface from
/// `Drop`); call [`Bookmark::restore`] on the success path to observe them.
pub struct Bookmark<'a, S: Seek + ?Sized> {
    stream: &'a mut S,
    position: u64,
    restored: bool,
}

impl<'a, S: Seek + ?Sized> Bookmark<'a, S> {
    /// Remember the current position of `stream`
    pub fn new(stream: &'a mut S) -> AsuraResult<Self> {
        let position = stream.stream_position()?;
        Ok(Self {
            stream,
            position,
            restored: false,
        })
    }

    /// The remembered position
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Seek back to the remembered position
    pub fn restore(mut self) -> AsuraResult<()> {
        self.restored = true;
        self.stream.seek(SeekFrom::Start(self.position))?;
        Ok(())
    }
}

impl<S: Seek + ?Sized> Deref for Bookmark<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stream
    }
}

impl<S: Seek + ?Sized> DerefMut for Bookmark<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stream
    }
}

impl<S: Seek + ?Sized> Drop for Bookmark<'_, S> {
    fn drop(&mut self) {
        if !self.restored {
            let _ = self.stream.seek(SeekFrom::Start(self.position));
        }
    }
}

/// Run `f` and put the stream back where it was, whether `f` succeeds or not
pub fn with_bookmark<S, T, F>(stream: &mut S, f: F) -> AsuraResult<T>
where
    S: Seek + ?Sized,
    F: FnOnce(&mut S) -> AsuraResult<T>,
{
    let mut guard = Bookmark::new(stream)?;
    let value = f(&mut *guard)?;
    guard.restore()?;
    Ok(value)
}

/// Measures the distance a stream has moved since the counter was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCounter {
    start: u64,
}

impl ByteCounter {
    /// Start counting from the current position
    pub fn start<S: Seek + ?Sized>(stream: &mut S) -> AsuraResult<Self> {
        Ok(Self {
            start: stream.stream_position()?,
        })
    }

    /// Position the counter started at
    pub fn start_position(&self) -> u64 {
        self.start
    }

    /// Bytes between the start and the current position
    pub fn length<S: Seek + ?Sized>(&self, stream: &mut S) -> AsuraResult<u64> {
        Ok(stream.stream_position()?.saturating_sub(self.start))
    }
}

/// Run `f` and report how many bytes it moved the stream
pub fn counted<S, T, F>(stream: &mut S, f: F) -> AsuraResult<(T, u64)>
where
    S: Seek + ?Sized,
    F: FnOnce(&mut S) -> AsuraResult<T>,
{
    let counter = ByteCounter::start(stream)?;
    let value = f(stream)?;
    let length = counter.length(stream)?;
    Ok((value, length))
}
