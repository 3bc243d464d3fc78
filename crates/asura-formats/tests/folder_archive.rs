#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for folder archive reading and writing

use asura_formats::chunk::{ChunkBody, ChunkType, HEADER_SIZE};
use asura_formats::{AsuraError, AsuraFormat, Chunk, ChunkRegistry, FolderArchive, ReadOptions};
use pretty_assertions::assert_eq;
use std::io::Cursor;

/// One unregistered `XYZW` chunk with a 4-byte payload, then EOF
fn xyzw_bytes() -> Vec<u8> {
    let mut data = b"Asura   ".to_vec();
    data.extend_from_slice(b"XYZW");
    data.extend_from_slice(&20u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    data.extend_from_slice(&[0; 4]);
    data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
    data.extend_from_slice(&[0; 4]);
    data
}

fn mixed_archive() -> FolderArchive {
    FolderArchive::from_chunks(vec![
        Chunk::raw(ChunkType::Resource, 2, [0; 4], vec![0x11; 37]).unwrap(),
        Chunk::raw(ChunkType::Text, 0, [1, 0, 0, 0], b"line one\0line two\0".to_vec()).unwrap(),
        Chunk::raw(ChunkType::Sound, 7, [0; 4], Vec::new()).unwrap(),
        Chunk::raw(ChunkType::Hske, 1, [9, 9, 9, 9], vec![0xAB; 1000]).unwrap(),
        Chunk::raw(ChunkType::Text, 0, [0; 4], b"again".to_vec()).unwrap(),
    ])
    .unwrap()
}

#[test]
fn unregistered_chunk_round_trips_byte_for_byte() {
    let data = xyzw_bytes();
    let registry = ChunkRegistry::default();

    let archive = FolderArchive::parse(&data, &registry).unwrap();
    assert_eq!(archive.len(), 2);

    let chunk = &archive.chunks()[0];
    assert_eq!(chunk.chunk_type(), ChunkType::Other(*b"XYZW"));
    assert_eq!(chunk.header.length, 20);
    assert_eq!(chunk.header.version, 0);
    assert_eq!(chunk.raw_bytes(), Some(&[0xDE, 0xAD, 0xBE, 0xEF][..]));
    assert!(archive.chunks()[1].is_eof());

    assert_eq!(archive.build(&registry).unwrap(), data);
}

#[test]
fn written_lengths_cover_header_and_payload() {
    let registry = ChunkRegistry::default();
    let bytes = mixed_archive().build(&registry).unwrap();
    let reparsed = FolderArchive::parse(&bytes, &registry).unwrap();

    for chunk in reparsed.iter_payload_chunks() {
        let payload = chunk.raw_bytes().unwrap();
        assert_eq!(chunk.header.length as usize, HEADER_SIZE as usize + payload.len());
    }
    assert_eq!(reparsed, mixed_archive());
}

#[test]
fn every_parse_ends_in_a_single_eof() {
    let registry = ChunkRegistry::default();
    let bytes = mixed_archive().build(&registry).unwrap();

    for options in [ReadOptions::eager(), ReadOptions::sparse()] {
        let archive = FolderArchive::read(&mut Cursor::new(&bytes), &registry, options).unwrap();
        let eofs: Vec<usize> = archive
            .chunks()
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_eof())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(eofs, vec![archive.len() - 1]);
    }
}

#[test]
fn sparse_read_then_full_load_equals_eager_read() {
    let registry = ChunkRegistry::default();
    let bytes = mixed_archive().build(&registry).unwrap();
    let eager = FolderArchive::parse(&bytes, &registry).unwrap();

    let mut reader = Cursor::new(&bytes);
    let mut sparse = FolderArchive::read(&mut reader, &registry, ReadOptions::sparse()).unwrap();
    assert!(
        sparse
            .iter_payload_chunks()
            .all(|c| matches!(c.body, ChunkBody::Sparse { .. }))
    );
    assert_eq!(reader.position() as usize, bytes.len());

    sparse.load(&mut reader, &registry).unwrap();
    assert!(sparse.is_loaded());
    assert_eq!(sparse, eager);
}

#[test]
fn loading_one_chunk_leaves_the_rest_sparse() {
    let registry = ChunkRegistry::default();
    let bytes = mixed_archive().build(&registry).unwrap();
    let mut reader = Cursor::new(&bytes);
    let mut sparse = FolderArchive::read(&mut reader, &registry, ReadOptions::sparse()).unwrap();

    assert!(sparse.load_chunk(&mut reader, &registry, 3).unwrap());
    assert!(!sparse.load_chunk(&mut reader, &registry, 3).unwrap());
    assert_eq!(sparse.chunks()[3].raw_bytes(), Some(&[0xAB; 1000][..]));
    assert_eq!(
        sparse.chunks().iter().filter(|c| c.is_sparse()).count(),
        4
    );
}

#[test]
fn truncated_archive_is_an_io_error() {
    let registry = ChunkRegistry::default();
    let mut bytes = mixed_archive().build(&registry).unwrap();
    bytes.truncate(bytes.len() - 10);

    let err = FolderArchive::parse(&bytes, &registry).unwrap_err();
    assert!(!err.is_unsupported());
    assert!(!err.is_consistency());
}

#[test]
fn verify_round_trip_reports_first_difference() {
    let registry = ChunkRegistry::default();
    FolderArchive::verify_round_trip(&xyzw_bytes(), &registry).unwrap();

    // bytes after the EOF tag are not part of the archive
    let mut data = xyzw_bytes();
    data.extend_from_slice(b"junk");
    let err = FolderArchive::verify_round_trip(&data, &registry).unwrap_err();
    match err {
        AsuraError::RoundTripMismatch {
            offset,
            original_len,
            rebuilt_len,
        } => {
            assert_eq!(offset, 32);
            assert_eq!(original_len, 36);
            assert_eq!(rebuilt_len, 32);
        }
        other => panic!("unexpected error: {other}"),
    }
}
