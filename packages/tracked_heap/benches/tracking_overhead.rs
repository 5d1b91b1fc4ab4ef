//! Benchmarks comparing the per-allocation cost of the tracking strategies.
//!
//! Each benchmark performs one allocate/free round trip of a fixed size; the
//! differences between groups are the tracking strategy and padding choice.

#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use tracked_heap::{CountingHeap, DebugHeap, LocalCountingHeap, UntrackedHeap};

const SIZE: usize = 128;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

fn entrypoint(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracking_overhead");

    {
        let heap = UntrackedHeap::untracked();
        group.bench_function("untracked", |b| {
            b.iter(|| {
                let ptr = heap.alloc(black_box(SIZE), false);
                // SAFETY: ptr came from this heap, unpadded.
                unsafe { heap.free(black_box(ptr), false) };
            });
        });
    }

    {
        let heap = LocalCountingHeap::counting_local();
        group.bench_function("counting_local", |b| {
            b.iter(|| {
                let ptr = heap.alloc(black_box(SIZE), true);
                // SAFETY: ptr came from this heap, padded.
                unsafe { heap.free(black_box(ptr), true) };
            });
        });
    }

    {
        let heap = CountingHeap::counting();
        group.bench_function("counting_atomic", |b| {
            b.iter(|| {
                let ptr = heap.alloc(black_box(SIZE), true);
                // SAFETY: ptr came from this heap, padded.
                unsafe { heap.free(black_box(ptr), true) };
            });
        });
    }

    {
        let heap = DebugHeap::debug();
        group.bench_function("detailed", |b| {
            b.iter(|| {
                let ptr = heap.alloc(black_box(SIZE), true);
                // SAFETY: ptr came from this heap, padded.
                unsafe { heap.free(black_box(ptr), true) };
            });
        });
    }

    group.finish();
}
