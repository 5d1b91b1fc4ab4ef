//! The allocation engine.

use std::mem::size_of;
use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::layout::{self, HEADER_BYTES};
use crate::problem::{self, Severity};
use crate::{
    AllocationRecord, AtomicCount, CounterTracking, DetailTracking, HeapStats, NoTracking,
    PlainCount, RuntimeOptions, Tracker,
};

/// Decides whether allocations carry the metadata header block.
///
/// The policy is fixed when the heap is composed. `CallerDecided` defers the
/// choice to the `pad` argument of each operation; the other policies ignore
/// that argument.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PaddingPolicy {
    /// Never pad. Frees and unpadded reallocations report size zero because the
    /// true size is not recoverable.
    Never,

    /// Pad only in builds with debug assertions enabled.
    DebugOnly,

    /// Always pad.
    Always,

    /// Honor the `pad` argument passed to each operation.
    #[default]
    CallerDecided,
}

impl PaddingPolicy {
    #[inline]
    fn resolve(self, caller_pad: bool) -> bool {
        match self {
            Self::Never => false,
            Self::DebugOnly => cfg!(debug_assertions),
            Self::Always => true,
            Self::CallerDecided => caller_pad,
        }
    }
}

/// An allocation façade over the system allocator, parameterized by tracking
/// strategy.
///
/// The heap is an explicit context object: multiple independent heaps can
/// coexist, each with its own statistics, which keeps tests hermetic. The
/// tracking strategy `T` is a type parameter, so the untracked and
/// aggregate-counting configurations compile down to straight `malloc`/`free`
/// calls with no runtime branching on the tracking mode.
///
/// Raw-pointer operations mirror the C allocator contract: allocation returns
/// null on failure (after reporting through the problem handler), and freeing
/// or reallocating a pointer requires it to have come from the same heap with
/// the same padding choice. The typed wrappers
/// [`HeapBox`][crate::HeapBox] and [`HeapArray`][crate::HeapArray] take care of
/// that pairing for callers that do not need raw pointers.
///
/// # Example
///
/// ```
/// use tracked_heap::CountingHeap;
///
/// let heap = CountingHeap::counting();
///
/// let ptr = heap.alloc(128, true);
/// assert!(!ptr.is_null());
/// assert_eq!(heap.usage(), 128);
///
/// // SAFETY: The pointer came from this heap with padding enabled.
/// unsafe { heap.free(ptr, true) };
/// assert_eq!(heap.usage(), 0);
/// ```
#[derive(Debug)]
pub struct Heap<T: Tracker> {
    tracker: T,
    padding: PaddingPolicy,
    options: RuntimeOptions,
    threshold_crossed: AtomicBool,
}

/// A heap with no tracking at all; the thinnest possible veneer over the
/// system allocator.
pub type UntrackedHeap = Heap<NoTracking>;

/// A heap with aggregate counters safe to share across threads.
pub type CountingHeap = Heap<CounterTracking<AtomicCount>>;

/// A heap with aggregate counters and no synchronization; single-threaded use
/// only, which the type system enforces (`!Sync`).
pub type LocalCountingHeap = Heap<CounterTracking<PlainCount>>;

/// A heap with per-pointer tracking, always-on padding and leak detection;
/// the configuration for hunting memory bugs.
pub type DebugHeap = Heap<DetailTracking<AtomicCount>>;

impl UntrackedHeap {
    /// Creates a heap that never pads and never tracks.
    #[must_use]
    pub fn untracked() -> Self {
        Self::new(NoTracking, PaddingPolicy::Never)
    }
}

impl CountingHeap {
    /// Creates a thread-safe heap with aggregate counters.
    #[must_use]
    pub fn counting() -> Self {
        Self::new(CounterTracking::new(), PaddingPolicy::CallerDecided)
    }
}

impl LocalCountingHeap {
    /// Creates a single-threaded heap with aggregate counters.
    #[must_use]
    pub fn counting_local() -> Self {
        Self::new(CounterTracking::new(), PaddingPolicy::CallerDecided)
    }
}

impl DebugHeap {
    /// Creates a heap with per-pointer tracking, mandatory padding and a leak
    /// dump when the heap is dropped.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(DetailTracking::new(), PaddingPolicy::Always).with_options(RuntimeOptions {
            leak_detection: true,
            ..RuntimeOptions::default()
        })
    }
}

impl<T: Tracker> Heap<T> {
    /// Creates a heap from a tracking strategy and a padding policy, with
    /// default runtime options.
    #[must_use]
    pub fn new(tracker: T, padding: PaddingPolicy) -> Self {
        Self {
            tracker,
            padding,
            options: RuntimeOptions::default(),
            threshold_crossed: AtomicBool::new(false),
        }
    }

    /// Replaces the runtime options.
    #[must_use]
    pub fn with_options(mut self, options: RuntimeOptions) -> Self {
        self.options = options;
        self
    }

    /// The current runtime options.
    #[must_use]
    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    /// Adjusts the runtime options of a live heap.
    pub fn set_options(&mut self, options: RuntimeOptions) {
        self.options = options;
        self.threshold_crossed.store(false, Ordering::Release);
    }

    /// The tracking strategy backing this heap.
    #[must_use]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Whether an operation called with this `pad` argument actually pads.
    pub(crate) fn pads(&self, caller_pad: bool) -> bool {
        self.padding.resolve(caller_pad)
    }

    /// Allocates `size` bytes, returning a pointer to uninitialized memory or
    /// null on failure.
    ///
    /// When padding applies, the requested size is written into a header ahead
    /// of the returned pointer so [`free`][Self::free] can recover it; the
    /// returned pointer keeps the system allocator's alignment guarantee
    /// either way.
    #[track_caller]
    pub fn alloc(&self, size: usize, pad: bool) -> *mut u8 {
        self.alloc_inner(size, pad, false, "alloc")
    }

    /// Allocates `size` bytes of zeroed memory, or null on failure.
    #[track_caller]
    pub fn alloc_zeroed(&self, size: usize, pad: bool) -> *mut u8 {
        self.alloc_inner(size, pad, true, "alloc_zeroed")
    }

    #[track_caller]
    fn alloc_inner(&self, size: usize, pad: bool, zeroed: bool, operation: &str) -> *mut u8 {
        let site = Location::caller();
        let pad = self.padding.resolve(pad);

        let Some(total) = total_size(size, pad, operation, site) else {
            return std::ptr::null_mut();
        };

        if !self.budget_allows(size as u64, operation, site) {
            return std::ptr::null_mut();
        }

        let raw = if zeroed {
            // SAFETY: calloc with any argument values is sound; failure yields null.
            unsafe { libc::calloc(total, 1) }
        } else {
            // SAFETY: malloc with any size is sound; failure yields null.
            unsafe { libc::malloc(total) }
        }
        .cast::<u8>();

        if raw.is_null() {
            report_exhaustion(total, operation, site);
            return std::ptr::null_mut();
        }

        let user = if pad {
            // SAFETY: The allocation is HEADER_BYTES + size long and malloc-aligned,
            // satisfying the header layout contract.
            unsafe {
                layout::write_size(raw, size as u64);
                layout::write_element_count(raw, 0);
                raw.add(HEADER_BYTES)
            }
        } else {
            raw
        };

        self.tracker
            .record_allocation_at(user as usize, size as u64, site);
        self.check_warning_threshold(site);

        if let Some(hook) = self.options.allocation_hook {
            hook(user, size, operation);
        }

        user
    }

    /// Resizes an allocation, returning the (possibly moved) pointer.
    ///
    /// A null `ptr` behaves as [`alloc`][Self::alloc]. With padding, a
    /// `new_size` of zero frees the allocation and returns null, and the true
    /// old size is recovered from the header; without padding the old size is
    /// reported as zero. On failure the original allocation is left intact,
    /// an error is reported and null is returned.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this heap with the
    /// same effective padding choice, and must not be used after this call
    /// returns a different pointer or null.
    #[track_caller]
    pub unsafe fn realloc(&self, ptr: *mut u8, new_size: usize, pad: bool) -> *mut u8 {
        let site = Location::caller();

        if ptr.is_null() {
            return self.alloc_inner(new_size, pad, false, "realloc");
        }

        let pad = self.padding.resolve(pad);

        if pad {
            // SAFETY: Caller contract puts a header block directly ahead of ptr.
            unsafe { self.realloc_padded(ptr, new_size, site) }
        } else {
            // SAFETY: Caller contract says ptr is a live unpadded allocation.
            unsafe { self.realloc_unpadded(ptr, new_size, site) }
        }
    }

    unsafe fn realloc_padded(
        &self,
        ptr: *mut u8,
        new_size: usize,
        site: &'static Location<'static>,
    ) -> *mut u8 {
        // SAFETY: ptr was produced by a padded allocation, so the header block
        // sits HEADER_BYTES before it and holds the current size.
        let (raw, old_size) = unsafe {
            let raw = ptr.sub(HEADER_BYTES);
            (raw, layout::read_size(raw))
        };

        if new_size == 0 {
            if let Some(hook) = self.options.deallocation_hook {
                hook(ptr, old_size as usize, "realloc");
            }

            self.tracker
                .record_reallocation_at(ptr as usize, 0, old_size, 0, site);

            // SAFETY: raw is the pointer malloc returned for this block.
            unsafe { libc::free(raw.cast()) };
            return std::ptr::null_mut();
        }

        let Some(total) = total_size(new_size, true, "realloc", site) else {
            return std::ptr::null_mut();
        };

        let growth = (new_size as u64).saturating_sub(old_size);
        if !self.budget_allows(growth, "realloc", site) {
            return std::ptr::null_mut();
        }

        // SAFETY: raw is the pointer malloc returned for this block.
        let new_raw = unsafe { libc::realloc(raw.cast(), total) }.cast::<u8>();

        if new_raw.is_null() {
            // The original block is still valid; only the resize failed.
            report_exhaustion(total, "realloc", site);
            return std::ptr::null_mut();
        }

        // SAFETY: The resized block still begins with the header layout; only
        // the size field changes, the element count carries over byte-for-byte.
        let new_user = unsafe {
            layout::write_size(new_raw, new_size as u64);
            new_raw.add(HEADER_BYTES)
        };

        self.tracker.record_reallocation_at(
            ptr as usize,
            new_user as usize,
            old_size,
            new_size as u64,
            site,
        );
        self.check_warning_threshold(site);

        if let Some(hook) = self.options.reallocation_hook {
            hook(new_user, new_size, "realloc");
        }

        new_user
    }

    unsafe fn realloc_unpadded(
        &self,
        ptr: *mut u8,
        new_size: usize,
        site: &'static Location<'static>,
    ) -> *mut u8 {
        if new_size == 0 {
            if let Some(hook) = self.options.deallocation_hook {
                hook(ptr, 0, "realloc");
            }

            self.tracker
                .record_reallocation_at(ptr as usize, 0, 0, 0, site);

            // SAFETY: Caller contract says ptr is a live unpadded allocation.
            unsafe { libc::free(ptr.cast()) };
            return std::ptr::null_mut();
        }

        if !self.budget_allows(new_size as u64, "realloc", site) {
            return std::ptr::null_mut();
        }

        // SAFETY: Caller contract says ptr is a live unpadded allocation.
        let new_ptr = unsafe { libc::realloc(ptr.cast(), new_size) }.cast::<u8>();

        if new_ptr.is_null() {
            report_exhaustion(new_size, "realloc", site);
            return std::ptr::null_mut();
        }

        // Without a header the old size is unknowable; it is reported as zero.
        self.tracker
            .record_reallocation_at(ptr as usize, new_ptr as usize, 0, new_size as u64, site);
        self.check_warning_threshold(site);

        if let Some(hook) = self.options.reallocation_hook {
            hook(new_ptr, new_size, "realloc");
        }

        new_ptr
    }

    /// Releases an allocation.
    ///
    /// A null `ptr` is a caller error: it is reported through the problem
    /// handler and no deallocation takes place. With padding, the true size is
    /// recovered from the header; without padding the deallocation is recorded
    /// with size zero.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by this heap with the
    /// same effective padding choice; it must not be used again afterwards.
    #[track_caller]
    pub unsafe fn free(&self, ptr: *mut u8, pad: bool) {
        let site = Location::caller();

        if ptr.is_null() {
            problem::report(
                Severity::Error,
                "free",
                site,
                "attempted to free a null pointer",
            );
            return;
        }

        let pad = self.padding.resolve(pad);

        let (raw, size) = if pad {
            // SAFETY: Caller contract puts a header block directly ahead of ptr.
            unsafe {
                let raw = ptr.sub(HEADER_BYTES);
                (raw, layout::read_size(raw))
            }
        } else {
            (ptr, 0)
        };

        if let Some(hook) = self.options.deallocation_hook {
            hook(ptr, size as usize, "free");
        }

        self.tracker
            .record_deallocation_at(ptr as usize, size, site);

        // SAFETY: raw is the pointer malloc returned for this block.
        unsafe { libc::free(raw.cast()) };
    }

    /// Allocates `size` bytes aligned to `align`, which must be a power of two.
    ///
    /// Returns null on failure. Aligned allocations carry no size header; they
    /// stash the distance back to the raw allocation just before the returned
    /// address so [`free_aligned`][Self::free_aligned] can recover it.
    #[track_caller]
    pub fn alloc_aligned(&self, size: usize, align: usize) -> *mut u8 {
        let site = Location::caller();

        if !self.budget_allows(size as u64, "alloc_aligned", site) {
            return std::ptr::null_mut();
        }

        let aligned = self.alloc_aligned_raw(size, align, "alloc_aligned", site);
        if aligned.is_null() {
            return aligned;
        }

        self.tracker
            .record_allocation_at(aligned as usize, size as u64, site);
        self.check_warning_threshold(site);

        if let Some(hook) = self.options.allocation_hook {
            hook(aligned, size, "alloc_aligned");
        }

        aligned
    }

    /// Over-allocates, rounds up to `align` and stashes the raw-to-aligned
    /// offset as a `u32` immediately before the aligned address. Performs no
    /// tracking.
    fn alloc_aligned_raw(
        &self,
        size: usize,
        align: usize,
        operation: &str,
        site: &'static Location<'static>,
    ) -> *mut u8 {
        debug_assert!(align.is_power_of_two(), "alignment must be a power of two");

        // Worst case we need align - 1 bytes of slack plus room for the offset
        // ahead of the aligned address.
        let overhead = align
            .wrapping_sub(1)
            .checked_add(size_of::<u32>());
        let total = overhead.and_then(|overhead| size.checked_add(overhead));

        let Some(total) = total else {
            problem::report(
                Severity::Error,
                operation,
                site,
                &format!("allocation of {size} bytes aligned to {align} overflows"),
            );
            return std::ptr::null_mut();
        };

        // SAFETY: malloc with any size is sound; failure yields null.
        let raw = unsafe { libc::malloc(total) }.cast::<u8>();

        if raw.is_null() {
            report_exhaustion(total, operation, site);
            return std::ptr::null_mut();
        }

        let raw_addr = raw as usize;
        let aligned_addr = raw_addr
            .wrapping_add(size_of::<u32>())
            .wrapping_add(align - 1)
            & !(align - 1);
        let offset = aligned_addr - raw_addr;

        // SAFETY: aligned_addr - 4 >= raw_addr by construction, and
        // aligned_addr + size <= raw_addr + total, so both the offset slot and
        // the user range lie within the allocation. The offset slot is not
        // necessarily u32-aligned, hence the unaligned write.
        unsafe {
            let aligned = raw.add(offset);
            aligned
                .sub(size_of::<u32>())
                .cast::<u32>()
                .write_unaligned(offset as u32);
            aligned
        }
    }

    /// Releases an aligned allocation.
    ///
    /// A null `ptr` is reported as a caller error, like [`free`][Self::free].
    /// Aligned allocations have no size header, so the deallocation is recorded
    /// with size zero unless the tracking strategy registered the true size.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by
    /// [`alloc_aligned`][Self::alloc_aligned] or
    /// [`realloc_aligned`][Self::realloc_aligned] on this heap; it must not be
    /// used again afterwards.
    #[track_caller]
    pub unsafe fn free_aligned(&self, ptr: *mut u8) {
        let site = Location::caller();

        if ptr.is_null() {
            problem::report(
                Severity::Error,
                "free_aligned",
                site,
                "attempted to free a null pointer",
            );
            return;
        }

        if let Some(hook) = self.options.deallocation_hook {
            hook(ptr, 0, "free_aligned");
        }

        self.tracker.record_deallocation_at(ptr as usize, 0, site);

        // SAFETY: The offset stashed by alloc_aligned_raw sits just before ptr
        // and leads back to the address malloc returned.
        unsafe {
            let offset = ptr.sub(size_of::<u32>()).cast::<u32>().read_unaligned();
            libc::free(ptr.sub(offset as usize).cast());
        }
    }

    /// Resizes an aligned allocation by allocating, copying and freeing.
    ///
    /// `realloc` cannot preserve an alignment stronger than the allocator's
    /// default, so the move is explicit and `old_size` must be supplied by the
    /// caller. A null `ptr` behaves as [`alloc_aligned`][Self::alloc_aligned];
    /// a `new_size` of zero frees the allocation and returns null.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by the aligned operations
    /// of this heap, with `old_size` equal to its requested size; it must not
    /// be used after this call returns a different pointer or null.
    #[track_caller]
    pub unsafe fn realloc_aligned(
        &self,
        ptr: *mut u8,
        new_size: usize,
        old_size: usize,
        align: usize,
    ) -> *mut u8 {
        let site = Location::caller();

        if ptr.is_null() {
            return self.alloc_aligned(new_size, align);
        }

        if new_size == 0 {
            if let Some(hook) = self.options.deallocation_hook {
                hook(ptr, old_size, "realloc_aligned");
            }

            self.tracker
                .record_reallocation_at(ptr as usize, 0, old_size as u64, 0, site);

            // SAFETY: Caller contract makes ptr a live aligned allocation.
            unsafe {
                let offset = ptr.sub(size_of::<u32>()).cast::<u32>().read_unaligned();
                libc::free(ptr.sub(offset as usize).cast());
            }
            return std::ptr::null_mut();
        }

        let growth = (new_size as u64).saturating_sub(old_size as u64);
        if !self.budget_allows(growth, "realloc_aligned", site) {
            return std::ptr::null_mut();
        }

        let new_ptr = self.alloc_aligned_raw(new_size, align, "realloc_aligned", site);
        if new_ptr.is_null() {
            // The original block is still valid; only the resize failed.
            return std::ptr::null_mut();
        }

        // SAFETY: Both regions are live and disjoint; the copy length is
        // bounded by both allocations' sizes.
        unsafe {
            std::ptr::copy_nonoverlapping(ptr, new_ptr, old_size.min(new_size));

            let offset = ptr.sub(size_of::<u32>()).cast::<u32>().read_unaligned();
            libc::free(ptr.sub(offset as usize).cast());
        }

        self.tracker.record_reallocation_at(
            ptr as usize,
            new_ptr as usize,
            old_size as u64,
            new_size as u64,
            site,
        );
        self.check_warning_threshold(site);

        if let Some(hook) = self.options.reallocation_hook {
            hook(new_ptr, new_size, "realloc_aligned");
        }

        new_ptr
    }

    /// Bytes currently outstanding according to the tracking strategy.
    #[must_use]
    pub fn usage(&self) -> u64 {
        self.tracker.current_usage()
    }

    /// Historical maximum of [`usage`][Self::usage].
    #[must_use]
    pub fn peak_usage(&self) -> u64 {
        self.tracker.peak_usage()
    }

    /// Snapshot of all tracked statistics.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.tracker.stats()
    }

    /// Resets the tracked statistics to zero.
    pub fn reset_stats(&self) {
        self.threshold_crossed.store(false, Ordering::Release);
        self.tracker.reset();
    }

    /// Reports every outstanding allocation through the problem handler and
    /// returns how many were reported.
    pub fn dump_allocations(&self) -> usize {
        self.tracker.dump_outstanding()
    }

    /// The records of all live allocations, if the tracking strategy keeps them.
    #[must_use]
    pub fn outstanding_allocations(&self) -> Vec<AllocationRecord> {
        self.tracker.outstanding()
    }

    /// Refuses the request with an error report if it would push tracked usage
    /// past the configured ceiling.
    fn budget_allows(
        &self,
        additional: u64,
        operation: &str,
        site: &'static Location<'static>,
    ) -> bool {
        let ceiling = self.options.max_memory_usage;
        if ceiling == 0 {
            return true;
        }

        let projected = self.tracker.current_usage().saturating_add(additional);
        if projected <= ceiling {
            return true;
        }

        problem::report(
            Severity::Error,
            operation,
            site,
            &format!("request would raise usage to {projected} bytes, above the {ceiling} byte limit"),
        );

        false
    }

    /// Reports the one-time warning when usage first crosses the threshold.
    fn check_warning_threshold(&self, site: &'static Location<'static>) {
        let threshold = self.options.warning_threshold;
        if threshold == 0 {
            return;
        }

        let usage = self.tracker.current_usage();
        if usage < threshold {
            return;
        }

        if self.threshold_crossed.swap(true, Ordering::AcqRel) {
            return;
        }

        problem::report(
            Severity::Warning,
            "warning_threshold",
            site,
            &format!("usage reached {usage} bytes, crossing the {threshold} byte warning threshold"),
        );
    }

}

/// Computes the system-allocator request size, accounting for the header.
fn total_size(
    size: usize,
    pad: bool,
    operation: &str,
    site: &'static Location<'static>,
) -> Option<usize> {
    if !pad {
        return Some(size);
    }

    let total = size.checked_add(HEADER_BYTES);
    if total.is_none() {
        problem::report(
            Severity::Error,
            operation,
            site,
            &format!("allocation of {size} bytes overflows with its header"),
        );
    }

    total
}

fn report_exhaustion(total: usize, operation: &str, site: &'static Location<'static>) {
    problem::report(
        Severity::Error,
        operation,
        site,
        &format!("system allocator failed to provide {total} bytes"),
    );
}

impl<T: Tracker> Drop for Heap<T> {
    fn drop(&mut self) {
        if self.options.leak_detection {
            _ = self.tracker.dump_outstanding();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_policy_resolution() {
        assert!(!PaddingPolicy::Never.resolve(true));
        assert!(PaddingPolicy::Always.resolve(false));
        assert!(PaddingPolicy::CallerDecided.resolve(true));
        assert!(!PaddingPolicy::CallerDecided.resolve(false));
        assert_eq!(
            PaddingPolicy::DebugOnly.resolve(false),
            cfg!(debug_assertions)
        );
    }

    #[test]
    fn alloc_and_free_round_trip_padded() {
        let heap = LocalCountingHeap::counting_local();

        let ptr = heap.alloc(128, true);
        assert!(!ptr.is_null());
        assert_eq!(heap.usage(), 128);
        assert_eq!(heap.stats().allocation_count, 1);

        // The whole requested range must be writable.
        for i in 0..128 {
            // SAFETY: ptr points to 128 allocated bytes.
            unsafe { ptr.add(i).write(0xAB) };
        }

        // SAFETY: ptr came from this heap with padding enabled.
        unsafe { heap.free(ptr, true) };
        assert_eq!(heap.usage(), 0);
        assert_eq!(heap.stats().deallocation_count, 1);
    }

    #[test]
    fn alloc_zeroed_is_zeroed() {
        let heap = LocalCountingHeap::counting_local();

        let ptr = heap.alloc_zeroed(64, true);
        assert!(!ptr.is_null());

        for i in 0..64 {
            // SAFETY: ptr points to 64 allocated bytes.
            assert_eq!(unsafe { ptr.add(i).read() }, 0);
        }

        // SAFETY: ptr came from this heap with padding enabled.
        unsafe { heap.free(ptr, true) };
    }

    #[test]
    fn padded_free_recovers_true_size() {
        let heap = DebugHeap::debug();

        let ptr = heap.alloc(100, true);
        assert_eq!(heap.usage(), 100);

        // SAFETY: ptr came from this heap; the policy is Always so the pad
        // argument is ignored.
        unsafe { heap.free(ptr, false) };
        assert_eq!(heap.usage(), 0);
    }

    #[test]
    fn realloc_applies_exact_delta() {
        let heap = LocalCountingHeap::counting_local();

        let ptr = heap.alloc(64, true);
        assert_eq!(heap.usage(), 64);

        // SAFETY: ptr is live and padded; the returned pointer replaces it.
        let ptr = unsafe { heap.realloc(ptr, 256, true) };
        assert!(!ptr.is_null());
        assert_eq!(heap.usage(), 256);
        assert_eq!(heap.stats().reallocation_count, 1);

        // SAFETY: Same contract as above.
        let ptr = unsafe { heap.realloc(ptr, 64, true) };
        assert!(!ptr.is_null());
        assert_eq!(heap.usage(), 64);
        assert_eq!(heap.stats().reallocation_count, 2);

        // SAFETY: ptr is live and padded.
        unsafe { heap.free(ptr, true) };
        assert_eq!(heap.usage(), 0);
    }

    #[test]
    fn realloc_null_behaves_as_alloc() {
        let heap = LocalCountingHeap::counting_local();

        // SAFETY: A null pointer is explicitly allowed.
        let ptr = unsafe { heap.realloc(std::ptr::null_mut(), 32, true) };
        assert!(!ptr.is_null());
        assert_eq!(heap.usage(), 32);
        assert_eq!(heap.stats().allocation_count, 1);

        // SAFETY: ptr is live and padded.
        unsafe { heap.free(ptr, true) };
    }

    #[test]
    fn realloc_to_zero_frees() {
        let heap = LocalCountingHeap::counting_local();

        let ptr = heap.alloc(64, true);

        // SAFETY: ptr is live and padded.
        let result = unsafe { heap.realloc(ptr, 0, true) };
        assert!(result.is_null());
        assert_eq!(heap.usage(), 0);
        assert_eq!(heap.stats().reallocation_count, 1);
    }

    #[test]
    fn realloc_preserves_contents() {
        let heap = UntrackedHeap::untracked();

        let ptr = heap.alloc(16, false);
        for i in 0..16 {
            // SAFETY: ptr points to 16 allocated bytes.
            unsafe { ptr.add(i).write(i as u8) };
        }

        // SAFETY: ptr is live and unpadded.
        let ptr = unsafe { heap.realloc(ptr, 1024, false) };
        assert!(!ptr.is_null());
        for i in 0..16 {
            // SAFETY: The first 16 bytes carry over through realloc.
            assert_eq!(unsafe { ptr.add(i).read() }, i as u8);
        }

        // SAFETY: ptr is live and unpadded.
        unsafe { heap.free(ptr, false) };
    }

    #[test]
    fn aligned_allocation_contract() {
        let heap = LocalCountingHeap::counting_local();

        for align in [16_usize, 64, 256, 4096] {
            let size = 100;
            let ptr = heap.alloc_aligned(size, align);
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % align, 0, "alignment {align} violated");

            // The full range must be writable without disturbing the stashed offset.
            for i in 0..size {
                // SAFETY: ptr points to `size` allocated bytes.
                unsafe { ptr.add(i).write(0xCD) };
            }

            // SAFETY: ptr came from alloc_aligned on this heap.
            unsafe { heap.free_aligned(ptr) };
        }

        assert_eq!(heap.stats().allocation_count, 4);
        assert_eq!(heap.stats().deallocation_count, 4);
    }

    #[test]
    fn realloc_aligned_moves_contents() {
        let heap = LocalCountingHeap::counting_local();

        let ptr = heap.alloc_aligned(32, 128);
        for i in 0..32 {
            // SAFETY: ptr points to 32 allocated bytes.
            unsafe { ptr.add(i).write(i as u8) };
        }

        // SAFETY: ptr is a live aligned allocation of 32 bytes.
        let ptr = unsafe { heap.realloc_aligned(ptr, 256, 32, 128) };
        assert!(!ptr.is_null());
        assert_eq!(ptr as usize % 128, 0);
        for i in 0..32 {
            // SAFETY: The first 32 bytes carry over through the move.
            assert_eq!(unsafe { ptr.add(i).read() }, i as u8);
        }
        assert_eq!(heap.stats().reallocation_count, 1);

        // SAFETY: ptr is a live aligned allocation.
        unsafe { heap.free_aligned(ptr) };
    }

    #[test]
    fn untracked_heap_reports_nothing() {
        let heap = UntrackedHeap::untracked();

        let ptr = heap.alloc(512, false);
        assert!(!ptr.is_null());
        assert_eq!(heap.usage(), 0);
        assert_eq!(heap.peak_usage(), 0);
        assert_eq!(heap.stats(), HeapStats::default());

        // SAFETY: ptr is live and unpadded.
        unsafe { heap.free(ptr, false) };
    }

    #[test]
    fn memory_ceiling_refuses_allocations() {
        let mut heap = LocalCountingHeap::counting_local();
        heap.set_options(RuntimeOptions {
            max_memory_usage: 100,
            ..RuntimeOptions::default()
        });

        let first = heap.alloc(80, true);
        assert!(!first.is_null());

        let second = heap.alloc(80, true);
        assert!(second.is_null());
        assert_eq!(heap.usage(), 80);
        assert_eq!(heap.stats().allocation_count, 1);

        // SAFETY: first is live and padded.
        unsafe { heap.free(first, true) };
    }

    #[test]
    fn hooks_observe_every_event() {
        use std::sync::atomic::AtomicUsize;

        static ALLOCS: AtomicUsize = AtomicUsize::new(0);
        static FREES: AtomicUsize = AtomicUsize::new(0);
        static REALLOCS: AtomicUsize = AtomicUsize::new(0);

        fn on_alloc(_ptr: *mut u8, _size: usize, _operation: &str) {
            ALLOCS.fetch_add(1, Ordering::Relaxed);
        }
        fn on_free(_ptr: *mut u8, _size: usize, _operation: &str) {
            FREES.fetch_add(1, Ordering::Relaxed);
        }
        fn on_realloc(_ptr: *mut u8, _size: usize, _operation: &str) {
            REALLOCS.fetch_add(1, Ordering::Relaxed);
        }

        let heap = LocalCountingHeap::counting_local().with_options(RuntimeOptions {
            allocation_hook: Some(on_alloc),
            deallocation_hook: Some(on_free),
            reallocation_hook: Some(on_realloc),
            ..RuntimeOptions::default()
        });

        let ptr = heap.alloc(10, true);
        // SAFETY: ptr is live and padded throughout.
        let ptr = unsafe { heap.realloc(ptr, 20, true) };
        // SAFETY: ptr is live and padded.
        unsafe { heap.free(ptr, true) };

        assert_eq!(ALLOCS.load(Ordering::Relaxed), 1);
        assert_eq!(REALLOCS.load(Ordering::Relaxed), 1);
        assert_eq!(FREES.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn debug_heap_enumerates_live_allocations() {
        let heap = DebugHeap::debug();

        let a = heap.alloc(10, true);
        let b = heap.alloc(20, true);
        let c = heap.alloc(30, true);

        // SAFETY: b is live and padded.
        unsafe { heap.free(b, true) };

        let live = heap.outstanding_allocations();
        assert_eq!(live.len(), 2);
        assert_eq!(live[0].size(), 10);
        assert_eq!(live[1].size(), 30);

        // SAFETY: a and c are live and padded.
        unsafe {
            heap.free(a, true);
            heap.free(c, true);
        }
        assert!(heap.outstanding_allocations().is_empty());
    }

    #[test]
    fn reset_stats_clears_counters() {
        let heap = LocalCountingHeap::counting_local();

        let ptr = heap.alloc(64, true);
        // SAFETY: ptr is live and padded.
        unsafe { heap.free(ptr, true) };

        heap.reset_stats();
        assert_eq!(heap.stats(), HeapStats::default());
    }

    static_assertions::assert_impl_all!(CountingHeap: Send, Sync);
    static_assertions::assert_impl_all!(DebugHeap: Send, Sync);
    static_assertions::assert_impl_all!(UntrackedHeap: Send, Sync);
    static_assertions::assert_not_impl_any!(LocalCountingHeap: Sync);
}
