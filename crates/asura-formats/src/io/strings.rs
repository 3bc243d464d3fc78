//! UTF-8 and UTF-16LE string fields

use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};

use super::{AsuraRead, AsuraWrite, Bookmark, ByteCounter, word_padding, wire_u32};
use crate::error::{AsuraError, AsuraResult, StringEncoding};

/// Terminator scans read the stream in windows of this many bytes
const SCAN_WINDOW: usize = 256;

/// How the length of a string field is determined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringSize {
    /// Scan forward for a NUL terminator; the size includes it
    #[default]
    Terminated,
    /// Exactly this many bytes (UTF-8) or code units (UTF-16); writes are zero-filled to it
    Fixed(usize),
    /// A leading `u32` count of bytes (UTF-8) or code units (UTF-16)
    Prefixed,
}

/// Whether trailing NULs are managed or passed through verbatim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Terminator {
    /// Strip trailing NULs on read, append one on write if missing
    #[default]
    Strip,
    /// Leave string contents exactly as stored or given
    Keep,
}

/// Options for string fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringOptions {
    /// Length source
    pub size: StringSize,
    /// Pad the field to a 4-byte boundary from its first byte
    pub padded: bool,
    /// Terminator handling
    pub terminator: Terminator,
}

impl StringOptions {
    /// NUL-terminated, unpadded
    pub const fn terminated() -> Self {
        Self {
            size: StringSize::Terminated,
            padded: false,
            terminator: Terminator::Strip,
        }
    }

    /// Fixed size in bytes (UTF-8) or code units (UTF-16)
    pub const fn fixed(size: usize) -> Self {
        Self {
            size: StringSize::Fixed(size),
            padded: false,
            terminator: Terminator::Strip,
        }
    }

    /// Prefixed with a `u32` count
    pub const fn prefixed() -> Self {
        Self {
            size: StringSize::Prefixed,
            padded: false,
            terminator: Terminator::Strip,
        }
    }

    /// Enable word padding
    #[must_use]
    pub const fn padded(mut self) -> Self {
        self.padded = true;
        self
    }

    /// Keep NULs verbatim
    #[must_use]
    pub const fn keep_terminator(mut self) -> Self {
        self.terminator = Terminator::Keep;
        self
    }
}

pub(super) fn read_utf8<R>(reader: &mut R, options: StringOptions) -> AsuraResult<String>
where
    R: Read + Seek + ?Sized,
{
    let size = match options.size {
        StringSize::Terminated => scan_terminator(reader, 1)?,
        StringSize::Fixed(size) => size,
        StringSize::Prefixed => reader.read_u32()? as usize,
    };

    let mut bytes = read_field(reader, size, options.padded)?;
    if options.terminator == Terminator::Strip {
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        bytes.truncate(end);
    }

    String::from_utf8(bytes).map_err(|e| AsuraError::InvalidString {
        encoding: StringEncoding::Utf8,
        bytes: e.into_bytes(),
    })
}

pub(super) fn read_utf16<R>(reader: &mut R, options: StringOptions) -> AsuraResult<String>
where
    R: Read + Seek + ?Sized,
{
    let size = match options.size {
        StringSize::Terminated => scan_terminator(reader, 2)?,
        StringSize::Fixed(units) => units * 2,
        StringSize::Prefixed => reader.read_u32()? as usize * 2,
    };

    let bytes = read_field(reader, size, options.padded)?;
    let mut units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    if options.terminator == Terminator::Strip {
        let end = units.iter().rposition(|&u| u != 0).map_or(0, |i| i + 1);
        units.truncate(end);
    }

    String::from_utf16(&units).map_err(|_| AsuraError::InvalidString {
        encoding: StringEncoding::Utf16Le,
        bytes,
    })
}

pub(super) fn read_utf8_list<R>(reader: &mut R) -> AsuraResult<Vec<String>>
where
    R: Read + Seek + ?Sized,
{
    let size = reader.read_u32()? as usize;
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut bytes = vec![0u8; size];
    reader.read_exact(&mut bytes)?;
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    bytes.truncate(end);

    let joined = String::from_utf8(bytes).map_err(|e| AsuraError::InvalidString {
        encoding: StringEncoding::Utf8,
        bytes: e.into_bytes(),
    })?;
    Ok(joined.split('\0').map(str::to_owned).collect())
}

pub(super) fn write_utf8<W>(writer: &mut W, value: &str, options: StringOptions) -> AsuraResult<u64>
where
    W: Write + Seek + ?Sized,
{
    let mut encoded = value.as_bytes().to_vec();
    if let StringSize::Fixed(size) = options.size {
        fit_fixed(&mut encoded, size, StringEncoding::Utf8)?;
    } else if options.terminator == Terminator::Strip && encoded.last() != Some(&0) {
        encoded.push(0);
    }
    if options.padded {
        encoded.resize(encoded.len() + word_padding(encoded.len()), 0);
    }

    emit(writer, &encoded, options.size, encoded.len())
}

pub(super) fn write_utf16<W>(writer: &mut W, value: &str, options: StringOptions) -> AsuraResult<u64>
where
    W: Write + Seek + ?Sized,
{
    let mut units: Vec<u16> = value.encode_utf16().collect();
    if let StringSize::Fixed(size) = options.size {
        fit_fixed(&mut units, size, StringEncoding::Utf16Le)?;
    } else if options.terminator == Terminator::Strip && units.last() != Some(&0) {
        units.push(0);
    }

    let mut encoded: Vec<u8> = units.iter().flat_map(|u| u.to_le_bytes()).collect();
    if options.padded {
        encoded.resize(encoded.len() + word_padding(encoded.len()), 0);
    }

    let count = encoded.len() / 2;
    emit(writer, &encoded, options.size, count)
}

pub(super) fn write_utf8_list<W>(writer: &mut W, values: &[String]) -> AsuraResult<u64>
where
    W: Write + Seek + ?Sized,
{
    let slot = writer.reserve_u32()?;
    let counter = ByteCounter::start(writer)?;
    for value in values {
        write_utf8(writer, value, StringOptions::terminated())?;
    }
    let size = counter.length(writer)?;
    slot.fill(writer, wire_u32("string list size", size)?)?;
    Ok(4 + size)
}

/// Zero-fill `units` to exactly `size` entries
fn fit_fixed<T: Copy + Default>(
    units: &mut Vec<T>,
    size: usize,
    encoding: StringEncoding,
) -> AsuraResult<()> {
    if units.len() > size {
        return Err(AsuraError::FixedStringOverflow {
            encoding,
            length: units.len(),
            capacity: size,
        });
    }
    units.resize(size, T::default());
    Ok(())
}

fn emit<W>(writer: &mut W, encoded: &[u8], size: StringSize, count: usize) -> AsuraResult<u64>
where
    W: Write + Seek + ?Sized,
{
    let mut written = encoded.len() as u64;
    if size == StringSize::Prefixed {
        writer.write_u32(wire_u32("string length", count as u64)?)?;
        written += 4;
    }
    writer.write_all(encoded)?;
    Ok(written)
}

/// Read `size` bytes, then skip the padding that follows them
fn read_field<R>(reader: &mut R, size: usize, padded: bool) -> AsuraResult<Vec<u8>>
where
    R: Read + Seek + ?Sized,
{
    let mut bytes = vec![0u8; size];
    reader.read_exact(&mut bytes)?;
    if padded {
        let mut padding = [0u8; 3];
        reader.read_exact(&mut padding[..word_padding(size)])?;
    }
    Ok(bytes)
}

/// Size of a terminated string including its terminator, position unchanged
fn scan_terminator<R>(reader: &mut R, unit: usize) -> AsuraResult<usize>
where
    R: Read + Seek + ?Sized,
{
    let mut guard = Bookmark::new(reader)?;
    let start = guard.position();
    let mut window = [0u8; SCAN_WINDOW];
    let mut scanned = 0usize;

    loop {
        guard.seek(SeekFrom::Start(start + scanned as u64))?;
        let filled = fill_window(&mut *guard, &mut window)?;
        // an odd trailing byte is re-read with the next window
        let usable = filled - filled % unit;
        if usable == 0 {
            return Err(AsuraError::UnterminatedString { offset: start });
        }

        if let Some(index) = window[..usable]
            .chunks_exact(unit)
            .position(|code| code.iter().all(|&b| b == 0))
        {
            guard.restore()?;
            return Ok(scanned + (index + 1) * unit);
        }
        scanned += usable;
    }
}

fn fill_window<R: Read + ?Sized>(reader: &mut R, window: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < window.len() {
        match reader.read(&mut window[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
