//! Runtime-adjustable knobs of the allocation engine.

use std::fmt;

/// Notification hook invoked after an allocation event.
///
/// Receives the affected pointer, the size in bytes, and a short label naming the
/// operation ("alloc", "alloc_zeroed", "realloc", "free", "alloc_aligned",
/// "realloc_aligned", "free_aligned"). Hooks are plain function pointers so that
/// installing one never makes the engine hold caller state.
pub type AllocationHook = fn(ptr: *mut u8, size: usize, operation: &str);

/// Runtime-mutable configuration consumed by [`Heap`][crate::Heap].
///
/// Unlike the tracking strategy, thread-safety policy and padding policy, which
/// are fixed at composition time, these knobs describe behavior that is
/// legitimately decided (or changed) while the program runs.
///
/// The engine consumes `max_memory_usage` (allocations that would exceed it are
/// refused with an error report), `warning_threshold` (one warning is reported
/// the first time usage crosses it), `leak_detection` (outstanding allocations
/// are dumped when the heap is dropped) and the three hooks. The remaining
/// fields are carried for embedding code that sizes its own buffers or adds its
/// own checks around the engine.
#[derive(Clone, Copy)]
pub struct RuntimeOptions {
    /// Hard ceiling on tracked usage in bytes. Zero means no ceiling.
    pub max_memory_usage: u64,

    /// Usage level that triggers a one-time warning report. Zero disables it.
    pub warning_threshold: u64,

    /// Whether to dump outstanding allocations when the heap is dropped.
    pub leak_detection: bool,

    /// Advisory flag for embedding code that wraps allocations in guard regions.
    /// The engine itself does not add guards.
    pub bounds_checking: bool,

    /// Advisory size below which the embedding code considers an allocation small.
    pub small_allocation_threshold: u64,

    /// Advisory size above which the embedding code considers an allocation large.
    pub large_allocation_threshold: u64,

    /// Invoked after every successful allocation.
    pub allocation_hook: Option<AllocationHook>,

    /// Invoked before every deallocation.
    pub deallocation_hook: Option<AllocationHook>,

    /// Invoked after every successful reallocation, with the new pointer and size.
    pub reallocation_hook: Option<AllocationHook>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_memory_usage: 0,
            warning_threshold: 0,
            leak_detection: false,
            bounds_checking: false,
            small_allocation_threshold: 256,
            large_allocation_threshold: 1024 * 1024,
            allocation_hook: None,
            deallocation_hook: None,
            reallocation_hook: None,
        }
    }
}

impl fmt::Debug for RuntimeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeOptions")
            .field("max_memory_usage", &self.max_memory_usage)
            .field("warning_threshold", &self.warning_threshold)
            .field("leak_detection", &self.leak_detection)
            .field("bounds_checking", &self.bounds_checking)
            .field(
                "small_allocation_threshold",
                &self.small_allocation_threshold,
            )
            .field(
                "large_allocation_threshold",
                &self.large_allocation_threshold,
            )
            .field("allocation_hook", &self.allocation_hook.is_some())
            .field("deallocation_hook", &self.deallocation_hook.is_some())
            .field("reallocation_hook", &self.reallocation_hook.is_some())
            .finish()
    }
}
