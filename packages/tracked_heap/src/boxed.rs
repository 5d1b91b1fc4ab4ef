//! A single value owned by heap-allocated storage.

use std::fmt;
use std::mem::{align_of, size_of};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::layout::MALLOC_ALIGN;
use crate::{Heap, Tracker};

/// A value stored in memory allocated from a [`Heap`].
///
/// Works like `Box` except the storage comes from (and is accounted to) a
/// specific heap instead of the global allocator. The value is dropped and its
/// storage released when the box is dropped.
///
/// Types whose alignment exceeds the system allocator's guarantee are placed
/// through the aligned allocation path transparently.
///
/// # Example
///
/// ```
/// use tracked_heap::{CountingHeap, HeapBox};
///
/// let heap = CountingHeap::counting();
///
/// let boxed = HeapBox::new_in(&heap, 42_u64).unwrap();
/// assert_eq!(*boxed, 42);
/// assert_eq!(heap.stats().allocation_count, 1);
///
/// drop(boxed);
/// assert_eq!(heap.usage(), 0);
/// ```
pub struct HeapBox<'h, T, S: Tracker> {
    ptr: NonNull<T>,
    heap: &'h Heap<S>,
}

impl<'h, T, S: Tracker> HeapBox<'h, T, S> {
    /// Moves `value` into storage allocated from `heap`.
    ///
    /// Returns `None` if the allocation fails; the failure itself is reported
    /// through the problem handler by the heap.
    #[track_caller]
    pub fn new_in(heap: &'h Heap<S>, value: T) -> Option<Self> {
        // Zero-sized types still get a real allocation so every box owns a
        // unique address the heap can pair with the free.
        let size = size_of::<T>().max(1);

        let raw = if align_of::<T>() > MALLOC_ALIGN {
            heap.alloc_aligned(size, align_of::<T>())
        } else {
            heap.alloc(size, true)
        };

        let ptr = NonNull::new(raw.cast::<T>())?;

        // SAFETY: The allocation is at least size_of::<T>() bytes and satisfies
        // T's alignment via the branch above.
        unsafe { ptr.as_ptr().write(value) };

        Some(Self { ptr, heap })
    }

    /// Moves the value out, releasing the storage without dropping the value.
    #[must_use]
    pub fn into_inner(self) -> T {
        // SAFETY: self.ptr holds an initialized T; after the read the storage
        // is released without running T's destructor a second time.
        let value = unsafe { self.ptr.as_ptr().read() };

        self.release_storage();
        std::mem::forget(self);

        value
    }

    fn release_storage(&self) {
        let raw = self.ptr.as_ptr().cast::<u8>();

        if align_of::<T>() > MALLOC_ALIGN {
            // SAFETY: raw came from alloc_aligned on this heap.
            unsafe { self.heap.free_aligned(raw) };
        } else {
            // SAFETY: raw came from alloc with pad = true on this heap.
            unsafe { self.heap.free(raw, true) };
        }
    }
}

impl<T, S: Tracker> Deref for HeapBox<'_, T, S> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: self.ptr holds an initialized T for the box's lifetime.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T, S: Tracker> DerefMut for HeapBox<'_, T, S> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: self.ptr holds an initialized T and we have exclusive access.
        unsafe { self.ptr.as_mut() }
    }
}

impl<T, S: Tracker> Drop for HeapBox<'_, T, S> {
    fn drop(&mut self) {
        // SAFETY: self.ptr holds an initialized T that has not been dropped.
        unsafe { self.ptr.as_ptr().drop_in_place() };

        self.release_storage();
    }
}

impl<T: fmt::Debug, S: Tracker> fmt::Debug for HeapBox<'_, T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HeapBox").field(&**self).finish()
    }
}

// SAFETY: A HeapBox owns its T and only touches the heap through &Heap<S>, so
// it moves between threads whenever both would.
unsafe impl<T: Send, S: Tracker + Sync> Send for HeapBox<'_, T, S> {}

// SAFETY: Shared access to a HeapBox only exposes &T.
unsafe impl<T: Sync, S: Tracker + Sync> Sync for HeapBox<'_, T, S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CountingHeap, DebugHeap};

    #[test]
    fn owns_and_releases_a_value() {
        let heap = CountingHeap::counting();

        let mut boxed = HeapBox::new_in(&heap, String::from("hello")).unwrap();
        assert_eq!(*boxed, "hello");

        boxed.push_str(" world");
        assert_eq!(*boxed, "hello world");

        drop(boxed);
        assert_eq!(heap.usage(), 0);
        assert_eq!(heap.stats().deallocation_count, 1);
    }

    #[test]
    fn into_inner_skips_the_destructor_once() {
        let heap = CountingHeap::counting();

        let boxed = HeapBox::new_in(&heap, vec![1, 2, 3]).unwrap();
        let values = boxed.into_inner();

        assert_eq!(values, vec![1, 2, 3]);
        assert_eq!(heap.usage(), 0);
    }

    #[test]
    fn zero_sized_values_still_pair_alloc_and_free() {
        let heap = CountingHeap::counting();

        let boxed = HeapBox::new_in(&heap, ()).unwrap();
        assert_eq!(heap.stats().allocation_count, 1);

        drop(boxed);
        assert_eq!(heap.usage(), 0);
        assert_eq!(heap.stats().deallocation_count, 1);
    }

    #[test]
    fn over_aligned_values_land_on_their_alignment() {
        #[repr(align(128))]
        #[derive(Debug)]
        struct BigAlign(u8);

        let heap = CountingHeap::counting();

        let boxed = HeapBox::new_in(&heap, BigAlign(7)).unwrap();
        let addr = std::ptr::from_ref::<BigAlign>(&*boxed) as usize;
        assert_eq!(addr % 128, 0);
        assert_eq!(boxed.0, 7);

        drop(boxed);
        assert_eq!(heap.stats().deallocation_count, 1);
    }

    #[test]
    fn registered_under_detailed_tracking() {
        let heap = DebugHeap::debug();

        let boxed = HeapBox::new_in(&heap, 1_u32).unwrap();
        assert_eq!(heap.outstanding_allocations().len(), 1);

        drop(boxed);
        assert!(heap.outstanding_allocations().is_empty());
    }
}
