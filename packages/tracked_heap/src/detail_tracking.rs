//! Per-pointer tracking strategy with leak diagnosis.

use std::collections::HashMap;
use std::panic::Location;
use std::sync::Mutex;

use crate::constants::ERR_POISONED_LOCK;
use crate::problem::{self, Severity};
use crate::{AllocationRecord, Count, CounterTracking, HeapStats, Tracker};

type Registry = HashMap<usize, AllocationRecord, foldhash::fast::RandomState>;

/// A [`Tracker`] that keeps a record for every live allocation in addition to
/// the aggregate counters.
///
/// Each recorded allocation stores its size, call site, a monotonically
/// increasing id and a timestamp, keyed by pointer address. The registry makes
/// [`outstanding`][Tracker::outstanding] and per-allocation leak reports
/// possible, at the cost of a map insertion/removal under a `Mutex` per event.
/// The mutex serializes all registry access, so this strategy does not scale
/// with thread count the way [`CounterTracking`] does.
///
/// The registry is populated only by the pointer-carrying `*_at` operations.
/// The pointer-less operations update the aggregate counters alone.
///
/// # Example
///
/// ```
/// use std::panic::Location;
///
/// use tracked_heap::{AtomicCount, DetailTracking, Tracker};
///
/// let tracker = DetailTracking::<AtomicCount>::new();
/// tracker.record_allocation_at(0x1000, 128, Location::caller());
/// tracker.record_allocation_at(0x2000, 64, Location::caller());
/// tracker.record_deallocation_at(0x1000, 128, Location::caller());
///
/// let live = tracker.outstanding();
/// assert_eq!(live.len(), 1);
/// assert_eq!(live[0].size(), 64);
/// ```
#[derive(Debug, Default)]
pub struct DetailTracking<C: Count> {
    counters: CounterTracking<C>,
    next_id: C,
    registry: Mutex<Registry>,
}

impl<C: Count> DetailTracking<C> {
    /// Creates a tracker with empty registry and zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Count> Tracker for DetailTracking<C> {
    fn record_allocation(&self, size: u64, site: &'static Location<'static>) {
        self.counters.record_allocation(size, site);
    }

    fn record_deallocation(&self, size: u64, site: &'static Location<'static>) {
        self.counters.record_deallocation(size, site);
    }

    fn record_reallocation(&self, old_size: u64, new_size: u64, site: &'static Location<'static>) {
        self.counters.record_reallocation(old_size, new_size, site);
    }

    fn record_allocation_at(&self, addr: usize, size: u64, site: &'static Location<'static>) {
        self.counters.record_allocation(size, site);

        let id = self.next_id.post_increment();
        self.registry
            .lock()
            .expect(ERR_POISONED_LOCK)
            .insert(addr, AllocationRecord::new(size, site, id));
    }

    fn record_deallocation_at(
        &self,
        addr: usize,
        fallback_size: u64,
        site: &'static Location<'static>,
    ) {
        let removed = self.registry.lock().expect(ERR_POISONED_LOCK).remove(&addr);

        // The stored size is authoritative; the fallback covers pointers that
        // were never registered (allocated before tracking, or out of band).
        let size = removed.map_or(fallback_size, |record| record.size());
        self.counters.record_deallocation(size, site);
    }

    fn record_reallocation_at(
        &self,
        old_addr: usize,
        new_addr: usize,
        old_size: u64,
        new_size: u64,
        site: &'static Location<'static>,
    ) {
        let mut registry = self.registry.lock().expect(ERR_POISONED_LOCK);

        match registry.remove(&old_addr) {
            Some(mut record) if new_addr != 0 => {
                record.resize(new_size);
                registry.insert(new_addr, record);
            }
            Some(_) => {
                // Reallocation to nothing released the block; nothing to re-register.
            }
            None if new_addr != 0 => {
                let id = self.next_id.post_increment();
                registry.insert(new_addr, AllocationRecord::new(new_size, site, id));
            }
            None => {}
        }

        drop(registry);
        self.counters.record_reallocation(old_size, new_size, site);
    }

    fn current_usage(&self) -> u64 {
        self.counters.current_usage()
    }

    fn peak_usage(&self) -> u64 {
        self.counters.peak_usage()
    }

    fn allocation_count(&self) -> u64 {
        self.counters.allocation_count()
    }

    fn stats(&self) -> HeapStats {
        self.counters.stats()
    }

    fn reset(&self) {
        self.registry.lock().expect(ERR_POISONED_LOCK).clear();
        self.next_id.set(0);
        self.counters.reset();
    }

    fn outstanding(&self) -> Vec<AllocationRecord> {
        let mut records: Vec<_> = self
            .registry
            .lock()
            .expect(ERR_POISONED_LOCK)
            .values()
            .copied()
            .collect();

        records.sort_by_key(AllocationRecord::id);
        records
    }

    #[track_caller]
    fn dump_outstanding(&self) -> usize {
        let records = self.outstanding();

        for record in &records {
            problem::report(
                Severity::Warning,
                "dump_outstanding",
                record.site(),
                &format!(
                    "allocation #{} of {} bytes was never freed",
                    record.id(),
                    record.size()
                ),
            );
        }

        records.len()
    }
}
