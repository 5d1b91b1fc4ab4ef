//! A fixed-length array owned by heap-allocated storage.

use std::fmt;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::panic::Location;
use std::ptr::NonNull;
use std::slice;

use crate::layout::{self, HEADER_BYTES, MALLOC_ALIGN};
use crate::problem::{self, Severity};
use crate::{Heap, Tracker};

/// A fixed-length array stored in memory allocated from a [`Heap`].
///
/// Every element is default-constructed at allocation and dropped at
/// teardown. When the heap pads its allocations, the element count is also
/// written into the allocation's header block, where teardown code operating
/// on the raw pointer can recover it.
///
/// Element types must not require alignment beyond the system allocator's
/// guarantee; this is enforced at compile time per instantiation.
///
/// # Example
///
/// ```
/// use tracked_heap::{CountingHeap, HeapArray};
///
/// let heap = CountingHeap::counting();
///
/// let mut numbers = HeapArray::<u32, _>::new_in(&heap, 8).unwrap();
/// assert_eq!(numbers.len(), 8);
/// assert!(numbers.iter().all(|&n| n == 0));
///
/// numbers[3] = 99;
/// assert_eq!(numbers[3], 99);
///
/// drop(numbers);
/// assert_eq!(heap.usage(), 0);
/// ```
pub struct HeapArray<'h, T, S: Tracker> {
    ptr: NonNull<T>,
    len: usize,
    heap: &'h Heap<S>,
}

impl<'h, T: Default, S: Tracker> HeapArray<'h, T, S> {
    /// Allocates an array of `len` default-constructed elements from `heap`.
    ///
    /// A `len` of zero is a caller error: it is reported through the problem
    /// handler and `None` is returned. Allocation failure also returns `None`
    /// after the heap reports it.
    #[track_caller]
    pub fn new_in(heap: &'h Heap<S>, len: usize) -> Option<Self> {
        const {
            assert!(
                align_of::<T>() <= MALLOC_ALIGN,
                "element type requires alignment beyond the allocator guarantee"
            );
        }

        let site = Location::caller();

        if len == 0 {
            problem::report(
                Severity::Error,
                "HeapArray::new_in",
                site,
                "zero-length array requested",
            );
            return None;
        }

        let Some(bytes) = size_of::<T>().max(1).checked_mul(len) else {
            problem::report(
                Severity::Error,
                "HeapArray::new_in",
                site,
                &format!("array of {len} elements overflows the addressable size"),
            );
            return None;
        };
        let raw = heap.alloc(bytes, true);
        let ptr = NonNull::new(raw.cast::<T>())?;

        if heap.pads(true) {
            // SAFETY: alloc with effective padding placed a header block
            // HEADER_BYTES before the returned pointer.
            unsafe { layout::write_element_count(raw.sub(HEADER_BYTES), len as u64) };
        }

        for i in 0..len {
            // SAFETY: The allocation holds len elements of T; index i is in range.
            unsafe { ptr.as_ptr().add(i).write(T::default()) };
        }

        Some(Self { ptr, len, heap })
    }
}

impl<T, S: Tracker> HeapArray<'_, T, S> {
    /// Number of elements in the array.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the array holds no elements. Always false for a constructed
    /// array, present for API completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The element count as recorded in the allocation header, falling back to
    /// the in-struct length when the heap does not pad.
    #[must_use]
    pub fn recorded_len(&self) -> usize {
        if self.heap.pads(true) {
            // SAFETY: The array was allocated padded, so the header block holds
            // the element count written at construction.
            let recorded = unsafe {
                layout::read_element_count(self.ptr.as_ptr().cast::<u8>().sub(HEADER_BYTES))
            };
            recorded as usize
        } else {
            self.len
        }
    }
}

impl<T, S: Tracker> Deref for HeapArray<'_, T, S> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        // SAFETY: The allocation holds self.len initialized elements of T.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl<T, S: Tracker> DerefMut for HeapArray<'_, T, S> {
    fn deref_mut(&mut self) -> &mut [T] {
        // SAFETY: Same as Deref, and we have exclusive access.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T, S: Tracker> Drop for HeapArray<'_, T, S> {
    fn drop(&mut self) {
        // SAFETY: All self.len elements are initialized and dropped exactly once.
        unsafe {
            std::ptr::drop_in_place(slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len));
            self.heap.free(self.ptr.as_ptr().cast::<u8>(), true);
        }
    }
}

impl<T: fmt::Debug, S: Tracker> fmt::Debug for HeapArray<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// SAFETY: A HeapArray owns its elements and only touches the heap through
// &Heap<S>, so it moves between threads whenever both would.
unsafe impl<T: Send, S: Tracker + Sync> Send for HeapArray<'_, T, S> {}

// SAFETY: Shared access to a HeapArray only exposes &[T].
unsafe impl<T: Sync, S: Tracker + Sync> Sync for HeapArray<'_, T, S> {}
