//! Block file benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hubstore_bench::{populated, BlockPayload};
use hubstore_blockfile::{BlockFile, TableKind};
use rand::Rng;

/// Benchmark whole-block appends.
fn bench_append_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_block");
    group.sample_size(50);

    for size in [1024, 16 * 1024, 128 * 1024].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let payload = BlockPayload::random(size);
            let (_dir, blockfile) = populated(0, &payload, 64 * 1024 * 1024);

            b.iter(|| {
                let number = blockfile.blocks().unwrap();
                payload.append_to(&blockfile, black_box(number));
            });
        });
    }

    group.finish();
}

/// Benchmark random column reads.
fn bench_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("get");

    let payload = BlockPayload::random(4096);
    let (_dir, blockfile) = populated(2_000, &payload, 1024 * 1024);
    for kind in TableKind::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
            let mut rng = rand::thread_rng();
            b.iter(|| {
                let number = rng.gen_range(1..=2_000);
                black_box(blockfile.get(kind, black_box(number)).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark truncating and re-appending the tail.
fn bench_truncate(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate_blocks");
    group.sample_size(30);

    let payload = BlockPayload::random(2048);
    let (_dir, blockfile) = populated(1_000, &payload, 256 * 1024);
    group.bench_function("drop_and_restore_100", |b| {
        b.iter(|| {
            blockfile.truncate_blocks(black_box(900)).unwrap();
            for number in 900..1_000 {
                payload.append_to(&blockfile, number);
            }
        });
    });

    group.finish();
}

/// Benchmark opening a populated directory, which locks and repairs.
fn bench_open(c: &mut Criterion) {
    let payload = BlockPayload::random(1024);
    let (dir, blockfile) = populated(5_000, &payload, 1024 * 1024);
    blockfile.close().unwrap();

    c.bench_function("open_5000_blocks", |b| {
        b.iter(|| {
            let blockfile = BlockFile::open(dir.path()).unwrap();
            black_box(blockfile.blocks().unwrap());
            blockfile.close().unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_append_block,
    bench_get,
    bench_truncate,
    bench_open
);
criterion_main!(benches);
