#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for codecs registered by callers

use asura_formats::chunk::{ChunkBody, ChunkHeader, ChunkType};
use asura_formats::io::{AsuraRead, AsuraWrite, ReadSeek, StringOptions, WriteSeek};
use asura_formats::{
    AsuraError, AsuraFormat, AsuraResult, Chunk, ChunkCodec, ChunkPayload, ChunkRegistry,
    FolderArchive, ReadOptions,
};
use pretty_assertions::assert_eq;
use std::io::Cursor;

/// A count, an opaque word, then word-padded NUL-terminated keys
#[derive(Debug, Clone, PartialEq)]
struct KeyTable {
    reserved: [u8; 4],
    keys: Vec<String>,
}

impl ChunkPayload for KeyTable {
    fn write_payload(&self, writer: &mut dyn WriteSeek) -> AsuraResult<()> {
        writer.write_u32(self.keys.len() as u32)?;
        writer.write_word(self.reserved)?;
        for key in &self.keys {
            writer.write_utf8(key, StringOptions::terminated().padded())?;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct KeyTableCodec;

impl ChunkCodec for KeyTableCodec {
    fn read(&self, reader: &mut dyn ReadSeek, _header: &ChunkHeader) -> AsuraResult<ChunkBody> {
        let count = reader.read_u32()?;
        let reserved = reader.read_word()?;
        let keys = (0..count)
            .map(|_| reader.read_utf8(StringOptions::terminated().padded()))
            .collect::<AsuraResult<Vec<_>>>()?;
        Ok(ChunkBody::Parsed(Box::new(KeyTable { reserved, keys })))
    }
}

/// Reads one byte too few
#[derive(Debug)]
struct SloppyCodec;

impl ChunkCodec for SloppyCodec {
    fn read(&self, reader: &mut dyn ReadSeek, header: &ChunkHeader) -> AsuraResult<ChunkBody> {
        let size = header.payload_size().unwrap_or(0).saturating_sub(1) as usize;
        let mut payload = vec![0; size];
        reader.read_exact(&mut payload)?;
        Ok(ChunkBody::Raw(payload))
    }
}

fn registry() -> ChunkRegistry {
    ChunkRegistry::builder()
        .register(ChunkType::ResourceList, KeyTableCodec)
        .expect("Test operation should succeed")
        .build()
}

fn key_table_archive() -> Vec<u8> {
    let payload = [
        0x01, 0x00, 0x00, 0x00, 0xFF, 0xFE, 0xFD, 0xFC, 0x54, 0x45, 0x53, 0x54, 0x00, 0x00, 0x00,
        0x00,
    ];
    let mut data = b"Asura   ".to_vec();
    data.extend_from_slice(b"RSFL");
    data.extend_from_slice(&32u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&payload);
    data.extend_from_slice(&[0; 4]);
    data
}

#[test]
fn registered_codec_decodes_payload() {
    let registry = registry();
    let data = key_table_archive();
    let archive = FolderArchive::parse(&data, &registry).unwrap();

    let table = archive.chunks()[0]
        .payload::<KeyTable>()
        .expect("RSFL should decode to a key table");
    assert_eq!(table.reserved, [0xFF, 0xFE, 0xFD, 0xFC]);
    assert_eq!(table.keys, vec!["TEST".to_string()]);

    assert_eq!(archive.build(&registry).unwrap(), data);
}

#[test]
fn registered_chunk_round_trips_from_value() {
    let registry = registry();
    let header = ChunkHeader::new(ChunkType::ResourceList, 1, [0; 4], 0).unwrap();
    let chunk = Chunk::parsed(
        header,
        KeyTable {
            reserved: [1, 2, 3, 4],
            keys: vec![String::new(), "abc".into(), "abcd".into(), "tree_02".into()],
        },
    );
    let archive = FolderArchive::from_chunks(vec![chunk]).unwrap();

    let bytes = archive.build(&registry).unwrap();
    let reparsed = FolderArchive::parse(&bytes, &registry).unwrap();
    let length = reparsed.chunks()[0].header.length;
    assert_eq!(length as usize % 4, 0);
    assert_eq!(
        reparsed.chunks()[0].payload::<KeyTable>(),
        archive.chunks()[0].payload::<KeyTable>()
    );
}

#[test]
fn same_bytes_without_codec_stay_raw() {
    let data = key_table_archive();
    let archive = FolderArchive::parse(&data, &ChunkRegistry::default()).unwrap();
    assert_eq!(archive.chunks()[0].raw_bytes().map(<[u8]>::len), Some(16));
    assert!(archive.chunks()[0].payload::<KeyTable>().is_none());
}

#[test]
fn codec_that_under_reads_is_a_consistency_error() {
    let registry = ChunkRegistry::builder()
        .register(ChunkType::ResourceList, SloppyCodec)
        .unwrap()
        .build();

    let err = FolderArchive::parse(&key_table_archive(), &registry).unwrap_err();
    assert!(err.is_consistency());
    match err {
        AsuraError::ChunkSizeMismatch {
            chunk_type,
            start,
            expected_end,
            actual_end,
        } => {
            assert_eq!(chunk_type, ChunkType::ResourceList);
            assert_eq!(start, 24);
            assert_eq!(expected_end, 40);
            assert_eq!(actual_end, 39);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn eof_cannot_be_registered() {
    let err = ChunkRegistry::builder()
        .register(ChunkType::Eof, KeyTableCodec)
        .unwrap_err();
    assert!(matches!(err, AsuraError::ReservedChunkType(ChunkType::Eof)));
}

#[test]
fn sparse_chunks_load_through_registered_codec() {
    let registry = registry();
    let data = key_table_archive();
    let mut reader = Cursor::new(&data);

    let mut archive = FolderArchive::read(&mut reader, &registry, ReadOptions::sparse()).unwrap();
    assert!(archive.chunks()[0].payload::<KeyTable>().is_none());
    archive.load(&mut reader, &registry).unwrap();
    assert!(archive.chunks()[0].payload::<KeyTable>().is_some());
}

#[test]
fn unpack_and_repack_through_codec() {
    let registry = registry();
    let archive = FolderArchive::parse(&key_table_archive(), &registry).unwrap();
    let chunk = &archive.chunks()[0];

    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("nested/keys");
    assert!(registry.unpack(chunk, &destination, false).unwrap());
    assert!(!registry.unpack(chunk, &destination, false).unwrap());
    assert!(registry.unpack(chunk, &destination, true).unwrap());

    let unpacked = dir.path().join("nested/keys.RSFL");
    assert!(unpacked.exists());
    let repacked = registry.repack_from_path(&unpacked).unwrap();
    assert_eq!(&repacked, chunk);
    assert_eq!(
        repacked.build(&registry).unwrap(),
        chunk.build(&registry).unwrap()
    );
}
