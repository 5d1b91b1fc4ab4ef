//! Example demonstrating leak diagnosis with the detailed tracking profile.
//!
//! The debug heap records every live allocation with its call site, so
//! whatever is still outstanding at the end can be listed with enough context
//! to find the offending code.

use tracked_heap::DebugHeap;

fn main() {
    let heap = DebugHeap::debug();

    println!("=== Leak Hunting Example ===\n");

    // Three allocations, one of which is deliberately never freed.
    let kept = heap.alloc(64, true);
    let leaked = heap.alloc(128, true);
    let also_kept = heap.alloc(32, true);

    // SAFETY: Both pointers came from this heap and are live.
    unsafe {
        heap.free(kept, true);
        heap.free(also_kept, true);
    }
    let _ = leaked;

    println!("Live allocations before teardown:");
    for record in heap.outstanding_allocations() {
        println!(
            "  #{}: {} bytes, allocated at {}:{}",
            record.id(),
            record.size(),
            record.site().file(),
            record.site().line()
        );
    }

    // The debug profile also dumps automatically when the heap is dropped;
    // the report below comes through the problem handler on stderr.
    println!("\nDropping the heap with one allocation outstanding:");
}
