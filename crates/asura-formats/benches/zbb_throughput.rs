//! Compression and decompression throughput for Zbb envelopes.
//!
//! Run with:
//! ```bash
//! cargo bench --bench zbb_throughput
//! ```

#![allow(clippy::expect_used)]

use asura_formats::{ZbbArchive, ZbbOptions};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::io::Cursor;

const INPUT_SIZE: usize = 8 * 1024 * 1024;

/// Half repetitive text, half pseudo-random bytes
fn sample_input() -> Vec<u8> {
    let mut data = Vec::with_capacity(INPUT_SIZE);
    let text = b"HTXT dialogue line with some repetition; ";
    while data.len() < INPUT_SIZE / 2 {
        data.extend_from_slice(text);
    }
    let mut state = 0x2545_F491_u32;
    while data.len() < INPUT_SIZE {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        data.push(state as u8);
    }
    data
}

fn bench_compress(c: &mut Criterion) {
    let input = sample_input();
    let mut group = c.benchmark_group("zbb_compress");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.sample_size(10);

    for block_kib in [256usize, 2048, 8192] {
        let options = ZbbOptions::new()
            .with_block_size(block_kib * 1024)
            .expect("Benchmark block size should be valid");
        group.bench_function(BenchmarkId::new("block_kib", block_kib), |b| {
            b.iter(|| {
                let mut output = Cursor::new(Vec::with_capacity(INPUT_SIZE));
                ZbbArchive::compress_to(
                    &mut Cursor::new(black_box(&input)),
                    &mut output,
                    &options,
                    None,
                )
                .expect("Benchmark compression should succeed");
                black_box(output.into_inner())
            });
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let input = sample_input();
    let mut compressed = Cursor::new(Vec::new());
    ZbbArchive::compress_to(
        &mut Cursor::new(&input),
        &mut compressed,
        &ZbbOptions::default(),
        None,
    )
    .expect("Benchmark compression should succeed");
    let compressed = compressed.into_inner();

    let mut group = c.benchmark_group("zbb_decompress");
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.sample_size(10);

    group.bench_function("default_blocks", |b| {
        b.iter(|| {
            let mut reader = Cursor::new(black_box(&compressed));
            let envelope =
                ZbbArchive::read(&mut reader).expect("Benchmark envelope should parse");
            black_box(
                envelope
                    .decompress(&mut reader, None)
                    .expect("Benchmark decompression should succeed"),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
