//! A configurable allocation façade over the system allocator.
//!
//! The calling code composes an allocation profile at build time by choosing,
//! as type parameters, how much tracking it wants and what that tracking may
//! cost, then allocates through a uniform interface:
//!
//! - [`Heap`] - the allocation engine; malloc/calloc/realloc/free plus optional
//!   size-tagging headers and aligned allocation
//! - [`Tracker`] - the tracking contract, implemented by [`NoTracking`],
//!   [`CounterTracking`] and [`DetailTracking`]
//! - [`Count`] - the thread-safety policy of the counters, implemented by
//!   [`PlainCount`] and [`AtomicCount`]
//! - [`HeapBox`] / [`HeapArray`] - typed owners over heap storage
//!
//! Because the strategy is a type parameter, the untracked and
//! aggregate-counting profiles compile to direct allocator calls with no
//! runtime dispatch on the tracking mode. Every allocation round-trips through
//! the system allocator; there is no pooling or reuse layer.
//!
//! # Simple usage
//!
//! ```
//! use tracked_heap::CountingHeap;
//!
//! let heap = CountingHeap::counting();
//!
//! let ptr = heap.alloc(1024, true);
//! assert!(!ptr.is_null());
//! assert_eq!(heap.usage(), 1024);
//! assert_eq!(heap.peak_usage(), 1024);
//!
//! // SAFETY: The pointer came from this heap with padding enabled.
//! unsafe { heap.free(ptr, true) };
//! assert_eq!(heap.usage(), 0);
//! ```
//!
//! # Finding leaks
//!
//! The [`DebugHeap`] profile records every live allocation with its size and
//! call site, and reports whatever is still outstanding when it is dropped:
//!
//! ```
//! use tracked_heap::DebugHeap;
//!
//! let heap = DebugHeap::debug();
//!
//! let kept = heap.alloc(64, true);
//! let freed = heap.alloc(32, true);
//! // SAFETY: The pointer came from this heap.
//! unsafe { heap.free(freed, true) };
//!
//! let live = heap.outstanding_allocations();
//! assert_eq!(live.len(), 1);
//! assert_eq!(live[0].size(), 64);
//!
//! // SAFETY: Still live, from this heap.
//! unsafe { heap.free(kept, true) };
//! ```
//!
//! # Problem reporting
//!
//! Allocation failures and contract violations are not panics; they are routed
//! through a process-wide [`ProblemHandler`] which embedding code can replace
//! via [`set_problem_handler`]. The default handler writes to stderr and
//! terminates the process only for [`Severity::Fatal`] and
//! [`Severity::Assertion`].

mod array;
mod boxed;
mod constants;
mod count;
mod counter_tracking;
mod detail_tracking;
mod heap;
mod layout;
mod no_tracking;
mod options;
mod problem;
mod stats;
mod tracker;

pub use array::HeapArray;
pub use boxed::HeapBox;
pub use count::{AtomicCount, Count, PlainCount};
pub use counter_tracking::CounterTracking;
pub use detail_tracking::DetailTracking;
pub use heap::{
    CountingHeap, DebugHeap, Heap, LocalCountingHeap, PaddingPolicy, UntrackedHeap,
};
pub use no_tracking::NoTracking;
pub use options::{AllocationHook, RuntimeOptions};
pub use problem::{
    ProblemHandler, Severity, default_problem_handler, problem_handler, set_problem_handler,
};
pub use stats::HeapStats;
pub use tracker::{AllocationRecord, Tracker};
