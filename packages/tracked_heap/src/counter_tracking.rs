//! Aggregate-only tracking strategy.

use std::panic::Location;

use crate::problem::{self, Severity};
use crate::{AllocationRecord, Count, HeapStats, Tracker};

/// A [`Tracker`] that maintains aggregate counters and nothing else.
///
/// Per-event cost is a handful of counter updates; no allocation, no locking.
/// The thread-safety policy is the `C` type parameter: compose with
/// [`AtomicCount`][crate::AtomicCount] to share the tracker across threads, or
/// with [`PlainCount`][crate::PlainCount] for a single-threaded tracker with no
/// synchronization overhead (the resulting type is `!Sync`).
///
/// # Example
///
/// ```
/// use std::panic::Location;
///
/// use tracked_heap::{AtomicCount, CounterTracking, Tracker};
///
/// let tracker = CounterTracking::<AtomicCount>::new();
/// tracker.record_allocation(128, Location::caller());
/// tracker.record_allocation(64, Location::caller());
/// tracker.record_deallocation(128, Location::caller());
///
/// assert_eq!(tracker.current_usage(), 64);
/// assert_eq!(tracker.peak_usage(), 192);
/// assert_eq!(tracker.allocation_count(), 2);
/// ```
#[derive(Debug, Default)]
pub struct CounterTracking<C: Count> {
    current_usage: C,
    peak_usage: C,
    allocation_count: C,
    deallocation_count: C,
    reallocation_count: C,
}

impl<C: Count> CounterTracking<C> {
    /// Creates a tracker with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a usage increase and pushes the new total through the peak.
    ///
    /// Feeding the freshly computed total through `exchange_if_greater` keeps the
    /// peak accurate even when multiple threads raise usage at once; there is no
    /// window where a read peak could be overwritten with a stale maximum.
    fn raise_usage(&self, bytes: u64) {
        let new_usage = self.current_usage.add(bytes);
        self.peak_usage.exchange_if_greater(new_usage);
    }
}

impl<C: Count> Tracker for CounterTracking<C> {
    fn record_allocation(&self, size: u64, site: &'static Location<'static>) {
        _ = site;
        self.allocation_count.increment();
        self.raise_usage(size);
    }

    fn record_deallocation(&self, size: u64, site: &'static Location<'static>) {
        _ = site;
        self.deallocation_count.increment();
        self.current_usage.subtract(size);
    }

    fn record_reallocation(&self, old_size: u64, new_size: u64, site: &'static Location<'static>) {
        _ = site;
        self.reallocation_count.increment();

        if new_size >= old_size {
            self.raise_usage(new_size - old_size);
        } else {
            self.current_usage.subtract(old_size - new_size);
        }
    }

    fn current_usage(&self) -> u64 {
        self.current_usage.get()
    }

    fn peak_usage(&self) -> u64 {
        self.peak_usage.get()
    }

    fn allocation_count(&self) -> u64 {
        self.allocation_count.get()
    }

    fn stats(&self) -> HeapStats {
        HeapStats {
            total_allocated: self.allocation_count.get(),
            total_freed: self.deallocation_count.get(),
            current_usage: self.current_usage.get(),
            peak_usage: self.peak_usage.get(),
            allocation_count: self.allocation_count.get(),
            deallocation_count: self.deallocation_count.get(),
            reallocation_count: self.reallocation_count.get(),
        }
    }

    fn reset(&self) {
        self.current_usage.set(0);
        self.peak_usage.set(0);
        self.allocation_count.set(0);
        self.deallocation_count.set(0);
        self.reallocation_count.set(0);
    }

    fn outstanding(&self) -> Vec<AllocationRecord> {
        Vec::new()
    }

    #[track_caller]
    fn dump_outstanding(&self) -> usize {
        // No per-pointer knowledge; the best available report is the snapshot.
        problem::report(
            Severity::Warning,
            "dump_outstanding",
            Location::caller(),
            &self.stats().to_string(),
        );

        0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::{AtomicCount, PlainCount};

    fn exercise_accounting<C: Count>(tracker: &CounterTracking<C>) {
        let site = Location::caller();

        tracker.record_allocation(100, site);
        tracker.record_allocation(50, site);
        assert_eq!(tracker.current_usage(), 150);
        assert_eq!(tracker.peak_usage(), 150);
        assert_eq!(tracker.allocation_count(), 2);

        tracker.record_deallocation(100, site);
        assert_eq!(tracker.current_usage(), 50);
        assert_eq!(tracker.peak_usage(), 150);

        // Growth raises usage and may raise the peak; shrink only lowers usage.
        tracker.record_reallocation(50, 250, site);
        assert_eq!(tracker.current_usage(), 250);
        assert_eq!(tracker.peak_usage(), 250);

        tracker.record_reallocation(250, 10, site);
        assert_eq!(tracker.current_usage(), 10);
        assert_eq!(tracker.peak_usage(), 250);

        let stats = tracker.stats();
        assert_eq!(stats.allocation_count, 2);
        assert_eq!(stats.deallocation_count, 1);
        assert_eq!(stats.reallocation_count, 2);
        assert!(stats.peak_usage >= stats.current_usage);

        tracker.reset();
        assert_eq!(tracker.stats(), HeapStats::default());
    }

    #[test]
    fn plain_accounting() {
        exercise_accounting(&CounterTracking::<PlainCount>::new());
    }

    #[test]
    fn atomic_accounting() {
        exercise_accounting(&CounterTracking::<AtomicCount>::new());
    }

    #[test]
    fn realloc_delta_is_exact() {
        let tracker = CounterTracking::<PlainCount>::new();
        let site = Location::caller();

        tracker.record_allocation(64, site);
        tracker.record_reallocation(64, 256, site);
        assert_eq!(tracker.current_usage(), 256);

        tracker.record_reallocation(256, 64, site);
        assert_eq!(tracker.current_usage(), 64);
        assert_eq!(tracker.stats().reallocation_count, 2);
    }

    #[test]
    fn atomic_accounting_converges_under_contention() {
        const THREADS: u64 = 4;
        const CYCLES: u64 = 5_000;

        let tracker = Arc::new(CounterTracking::<AtomicCount>::new());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                thread::spawn(move || {
                    let site = Location::caller();
                    for _ in 0..CYCLES {
                        tracker.record_allocation(64, site);
                        tracker.record_deallocation(64, site);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("worker thread panicked");
        }

        assert_eq!(tracker.current_usage(), 0);
        assert_eq!(tracker.allocation_count(), THREADS * CYCLES);
        assert!(tracker.peak_usage() >= 64);
        assert!(tracker.peak_usage() <= THREADS * 64);
    }

    static_assertions::assert_impl_all!(CounterTracking<AtomicCount>: Send, Sync);
    static_assertions::assert_not_impl_any!(CounterTracking<PlainCount>: Sync);
}
