//! Example demonstrating basic usage of `tracked_heap`.
//!
//! Shows the typed wrappers, the aggregate statistics and the raw pointer
//! interface of a thread-safe counting heap.

use tracked_heap::{CountingHeap, HeapArray, HeapBox};

fn main() {
    let heap = CountingHeap::counting();

    println!("=== Tracked Heap Example ===\n");

    // Typed single values.
    println!("1. Single values through HeapBox:");
    {
        let message = HeapBox::new_in(&heap, String::from("stored on the tracked heap"))
            .expect("allocation failed");
        println!("  boxed value: {}", *message);
        println!("  usage while live: {} bytes", heap.usage());
    }
    println!("  usage after drop: {} bytes", heap.usage());

    println!();

    // Typed arrays.
    println!("2. Arrays through HeapArray:");
    {
        let mut squares = HeapArray::<u64, _>::new_in(&heap, 10).expect("allocation failed");
        for (i, slot) in squares.iter_mut().enumerate() {
            *slot = (i as u64) * (i as u64);
        }
        println!("  squares: {squares:?}");
        println!("  recorded length: {}", squares.recorded_len());
    }

    println!();

    // The raw pointer interface, for code that interoperates with C-style APIs.
    println!("3. Raw allocations:");
    let ptr = heap.alloc(256, true);
    assert!(!ptr.is_null());
    println!("  allocated 256 bytes, usage: {} bytes", heap.usage());

    // SAFETY: ptr is live and padded; the result replaces it.
    let ptr = unsafe { heap.realloc(ptr, 512, true) };
    assert!(!ptr.is_null());
    println!("  grew to 512 bytes, usage: {} bytes", heap.usage());

    // SAFETY: ptr is live and padded.
    unsafe { heap.free(ptr, true) };

    println!();
    println!("Final statistics: {}", heap.stats());
}
