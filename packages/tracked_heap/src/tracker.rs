//! The contract shared by all tracking strategies.

use std::panic::Location;
use std::time::Instant;

use crate::HeapStats;

/// Metadata retained for one live allocation under per-pointer tracking.
///
/// A record exists for a pointer if and only if that pointer was allocated under
/// per-pointer tracking and has not yet been freed.
#[derive(Clone, Copy, Debug)]
pub struct AllocationRecord {
    size: u64,
    site: &'static Location<'static>,
    id: u64,
    recorded_at: Instant,
}

impl AllocationRecord {
    pub(crate) fn new(size: u64, site: &'static Location<'static>, id: u64) -> Self {
        Self {
            size,
            site,
            id,
            recorded_at: Instant::now(),
        }
    }

    /// Size in bytes that was requested for this allocation (or for its most
    /// recent reallocation).
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The call site that performed the allocation.
    #[must_use]
    pub fn site(&self) -> &'static Location<'static> {
        self.site
    }

    /// Monotonically increasing identifier, unique per tracking strategy instance.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the allocation was recorded.
    #[must_use]
    pub fn recorded_at(&self) -> Instant {
        self.recorded_at
    }

    pub(crate) fn resize(&mut self, new_size: u64) {
        self.size = new_size;
    }
}

/// Records allocation events and answers statistics queries.
///
/// Three strategies implement this contract:
///
/// * [`NoTracking`][crate::NoTracking] - every operation is a no-op and every
///   getter returns zero.
/// * [`CounterTracking`][crate::CounterTracking] - aggregate counters only.
/// * [`DetailTracking`][crate::DetailTracking] - aggregate counters plus a
///   per-pointer registry that can enumerate live allocations.
///
/// The strategy is selected as a type parameter of the allocation engine, so the
/// choice is made at composition time and monomorphized away - the no-op strategy
/// compiles to nothing at the call sites.
///
/// The pointer-less operations record aggregate statistics only. The per-pointer
/// registry of the detailed strategy is populated exclusively by the `*_at`
/// variants, which the allocation engine always uses; the pointer-less forms exist
/// for callers recording out-of-band events.
pub trait Tracker {
    /// Records an allocation of `size` bytes.
    fn record_allocation(&self, size: u64, site: &'static Location<'static>);

    /// Records a deallocation of `size` bytes.
    fn record_deallocation(&self, size: u64, site: &'static Location<'static>);

    /// Records a reallocation from `old_size` to `new_size` bytes.
    ///
    /// The usage delta is applied in whichever direction it points; the
    /// reallocation counter is incremented regardless of direction.
    fn record_reallocation(&self, old_size: u64, new_size: u64, site: &'static Location<'static>);

    /// Records an allocation of `size` bytes at address `addr`.
    #[inline]
    fn record_allocation_at(&self, addr: usize, size: u64, site: &'static Location<'static>) {
        _ = addr;
        self.record_allocation(size, site);
    }

    /// Records a deallocation at address `addr`.
    ///
    /// Strategies that registered the address use their *stored* size and ignore
    /// `fallback_size`; this makes the accounting immune to callers passing a wrong
    /// size at free time. Strategies without per-pointer knowledge use
    /// `fallback_size` as-is.
    #[inline]
    fn record_deallocation_at(
        &self,
        addr: usize,
        fallback_size: u64,
        site: &'static Location<'static>,
    ) {
        _ = addr;
        self.record_deallocation(fallback_size, site);
    }

    /// Records a reallocation that moved the block from `old_addr` to `new_addr`.
    ///
    /// A `new_addr` of zero (paired with a `new_size` of zero) means the
    /// reallocation released the block.
    #[inline]
    fn record_reallocation_at(
        &self,
        old_addr: usize,
        new_addr: usize,
        old_size: u64,
        new_size: u64,
        site: &'static Location<'static>,
    ) {
        _ = old_addr;
        _ = new_addr;
        self.record_reallocation(old_size, new_size, site);
    }

    /// Bytes currently outstanding.
    fn current_usage(&self) -> u64;

    /// Historical maximum of current usage.
    fn peak_usage(&self) -> u64;

    /// Number of allocation events recorded.
    fn allocation_count(&self) -> u64;

    /// Snapshot of all counters.
    fn stats(&self) -> HeapStats;

    /// Resets every counter (and any per-pointer registry) to the initial state.
    fn reset(&self);

    /// Returns the records of all allocations that have not been freed, ordered
    /// by allocation id.
    ///
    /// Strategies without per-pointer knowledge return an empty list.
    fn outstanding(&self) -> Vec<AllocationRecord>;

    /// Reports still-outstanding allocations through the problem handler.
    ///
    /// The detailed strategy reports one warning per live allocation and returns
    /// how many were reported; the aggregate strategy reports its snapshot (it has
    /// no per-pointer detail to show) and returns zero; the no-op strategy does
    /// nothing.
    fn dump_outstanding(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_record_accessors() {
        let site = Location::caller();
        let mut record = AllocationRecord::new(64, site, 7);

        assert_eq!(record.size(), 64);
        assert_eq!(record.id(), 7);
        assert_eq!(record.site().file(), site.file());

        record.resize(128);
        assert_eq!(record.size(), 128);
    }

    static_assertions::assert_impl_all!(AllocationRecord: Send, Sync, Copy);
}
