use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use syscore::memory::Block;

const BLOCK_SIZE: usize = 64 * 1024;
const ALLOC_SIZES: &[usize] = &[16, 256, 4096];

/// Fill a fresh block with fixed-size allocations until it is full
fn bench_fill_block(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_block");

    for &size in ALLOC_SIZES {
        group.throughput(Throughput::Elements((BLOCK_SIZE / size) as u64));
        group.bench_with_input(BenchmarkId::new("allocate", size), &size, |b, &size| {
            b.iter(|| {
                let block = Block::new(0, BLOCK_SIZE);
                while block.allocate(black_box(size)).is_ok() {}
                block
            });
        });
    }
    group.finish();
}

/// Allocate and free against a fragmented free-list
fn bench_fragmented_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmented_cycle");

    for &size in ALLOC_SIZES {
        // Free every other slot so the free-list holds many small ranges
        let block = Block::new(0, BLOCK_SIZE);
        let mut offsets = Vec::new();
        while let Ok(offset) = block.allocate(size) {
            offsets.push(offset);
        }
        for offset in offsets.iter().step_by(2) {
            block.free(*offset, size).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("alloc_free", size), &size, |b, &size| {
            b.iter(|| {
                let offset = block.allocate(black_box(size)).unwrap();
                block.free(offset, size).unwrap();
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fill_block, bench_fragmented_cycle);
criterion_main!(benches);
