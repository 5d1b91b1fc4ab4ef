//! Concurrency tests for the atomically tracked heap profiles.
//!
//! Many threads hammer one shared heap with allocate/use/free cycles of random
//! sizes; afterwards the statistics must have converged exactly.

#![cfg(not(miri))] // The engine calls the C allocator directly, which Miri rejects.

use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use rand::Rng;
use tracked_heap::{CountingHeap, DebugHeap};

const THREADS: usize = 8;
const CYCLES: usize = 500;

#[test]
fn counting_heap_converges_under_contention() {
    let heap = Arc::new(CountingHeap::counting());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                let mut rng = rand::rng();

                for _ in 0..CYCLES {
                    let size = rng.random_range(1..=512);

                    let ptr = heap.alloc(size, true);
                    assert!(!ptr.is_null());

                    // SAFETY: ptr points to `size` allocated bytes.
                    unsafe {
                        ptr.write(0xEE);
                        black_box(ptr.read());
                    }

                    // SAFETY: ptr came from this heap with padding enabled.
                    unsafe { heap.free(ptr, true) };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    let stats = heap.stats();
    assert_eq!(stats.current_usage, 0);
    assert_eq!(stats.allocation_count, (THREADS * CYCLES) as u64);
    assert_eq!(stats.deallocation_count, (THREADS * CYCLES) as u64);
    assert!(stats.peak_usage >= 1);
    assert!(stats.peak_usage <= (THREADS * 512) as u64);
}

#[test]
fn detailed_heap_registry_converges_under_contention() {
    let heap = Arc::new(DebugHeap::debug());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                let mut rng = rand::rng();
                let mut live = Vec::with_capacity(8);

                for _ in 0..CYCLES {
                    let size = rng.random_range(1..=256);
                    let ptr = heap.alloc(size, true);
                    assert!(!ptr.is_null());
                    live.push(ptr);

                    // Hold a handful of allocations to keep the registry busy.
                    if live.len() == 8 {
                        for ptr in live.drain(..) {
                            // SAFETY: Every held pointer came from this heap, padded,
                            // and is freed exactly once by the thread that made it.
                            unsafe { heap.free(ptr, true) };
                        }
                    }
                }

                for ptr in live {
                    // SAFETY: As above.
                    unsafe { heap.free(ptr, true) };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    assert_eq!(heap.usage(), 0);
    assert!(heap.outstanding_allocations().is_empty());
    assert_eq!(heap.stats().allocation_count, (THREADS * CYCLES) as u64);
}

#[test]
fn reallocations_race_without_corrupting_accounting() {
    let heap = Arc::new(CountingHeap::counting());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let heap = Arc::clone(&heap);
            thread::spawn(move || {
                let mut rng = rand::rng();

                for _ in 0..CYCLES {
                    let first = rng.random_range(1..=128);
                    let second = rng.random_range(1..=1024);

                    let ptr = heap.alloc(first, true);
                    assert!(!ptr.is_null());

                    // SAFETY: ptr is live and padded; the result replaces it.
                    let ptr = unsafe { heap.realloc(ptr, second, true) };
                    assert!(!ptr.is_null());

                    // SAFETY: ptr is live and padded.
                    unsafe { heap.free(ptr, true) };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker thread panicked");
    }

    let stats = heap.stats();
    assert_eq!(stats.current_usage, 0);
    assert_eq!(stats.reallocation_count, (THREADS * CYCLES) as u64);
}
