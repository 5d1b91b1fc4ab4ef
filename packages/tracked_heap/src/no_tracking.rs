//! The zero-cost tracking strategy.

use std::panic::Location;

use crate::{AllocationRecord, HeapStats, Tracker};

/// A [`Tracker`] that records nothing.
///
/// Every recording operation is an empty inlineable function and every getter
/// returns zero, so a heap composed with this strategy carries no tracking cost
/// at all once monomorphized.
///
/// # Example
///
/// ```
/// use tracked_heap::{NoTracking, Tracker};
///
/// let tracker = NoTracking;
/// assert_eq!(tracker.current_usage(), 0);
/// assert_eq!(tracker.stats(), tracked_heap::HeapStats::default());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTracking;

impl Tracker for NoTracking {
    #[inline]
    fn record_allocation(&self, size: u64, site: &'static Location<'static>) {
        _ = size;
        _ = site;
    }

    #[inline]
    fn record_deallocation(&self, size: u64, site: &'static Location<'static>) {
        _ = size;
        _ = site;
    }

    #[inline]
    fn record_reallocation(&self, old_size: u64, new_size: u64, site: &'static Location<'static>) {
        _ = old_size;
        _ = new_size;
        _ = site;
    }

    #[inline]
    fn current_usage(&self) -> u64 {
        0
    }

    #[inline]
    fn peak_usage(&self) -> u64 {
        0
    }

    #[inline]
    fn allocation_count(&self) -> u64 {
        0
    }

    #[inline]
    fn stats(&self) -> HeapStats {
        HeapStats::default()
    }

    #[inline]
    fn reset(&self) {}

    #[inline]
    fn outstanding(&self) -> Vec<AllocationRecord> {
        Vec::new()
    }

    #[inline]
    fn dump_outstanding(&self) -> usize {
        0
    }
}
