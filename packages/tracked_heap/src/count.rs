//! Counters with a selectable thread-safety policy.

use std::cell::Cell;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

/// An unsigned counter offering atomic-style update operations under a selectable
/// thread-safety policy.
///
/// Every tracking strategy accumulates its statistics through this trait, so the
/// thread-safety cost of statistics is chosen once, by picking the implementation,
/// instead of being paid unconditionally on every allocation.
///
/// All mutating operations return the post-update value; the `post_*` family returns
/// the pre-update value instead, for call sites that need both old and new.
///
/// Arithmetic wraps on overflow/underflow. An underflow of a usage counter indicates
/// mispaired allocation events in the caller, which this type cannot detect.
pub trait Count: Debug + Default {
    /// Unconditionally overwrites the stored value.
    fn set(&self, value: u64);

    /// Reads the stored value.
    fn get(&self) -> u64;

    /// Adds one; returns the new value.
    fn increment(&self) -> u64;

    /// Adds one; returns the previous value.
    fn post_increment(&self) -> u64;

    /// Subtracts one; returns the new value.
    fn decrement(&self) -> u64;

    /// Subtracts one; returns the previous value.
    fn post_decrement(&self) -> u64;

    /// Adds `value`; returns the new value.
    fn add(&self, value: u64) -> u64;

    /// Adds `value`; returns the previous value.
    fn post_add(&self, value: u64) -> u64;

    /// Subtracts `value`; returns the new value.
    fn subtract(&self, value: u64) -> u64;

    /// Subtracts `value`; returns the previous value.
    fn post_subtract(&self, value: u64) -> u64;

    /// Stores `value` if and only if it exceeds the current value.
    ///
    /// Returns the resulting stored value. This is how peak usage is maintained:
    /// feeding every freshly computed usage total through this operation keeps the
    /// stored maximum accurate even under concurrent updates, with no
    /// read-then-write race window.
    fn exchange_if_greater(&self, value: u64) -> u64;

    /// Adds one only if the current value is nonzero; returns the new value,
    /// or zero if no increment occurred.
    ///
    /// Intended for reference-counting style use; not exercised by the allocation
    /// engine itself.
    fn conditional_increment(&self) -> u64;
}

/// A [`Count`] with single-threaded semantics and no synchronization overhead.
///
/// This type is `!Sync`, so the "must not be used concurrently" obligation is
/// enforced by the compiler rather than being a documented data race.
#[derive(Debug, Default)]
pub struct PlainCount {
    value: Cell<u64>,
}

impl PlainCount {
    /// Creates a counter holding `value`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self {
            value: Cell::new(value),
        }
    }
}

impl Count for PlainCount {
    #[inline]
    fn set(&self, value: u64) {
        self.value.set(value);
    }

    #[inline]
    fn get(&self) -> u64 {
        self.value.get()
    }

    #[inline]
    fn increment(&self) -> u64 {
        self.add(1)
    }

    #[inline]
    fn post_increment(&self) -> u64 {
        self.post_add(1)
    }

    #[inline]
    fn decrement(&self) -> u64 {
        self.subtract(1)
    }

    #[inline]
    fn post_decrement(&self) -> u64 {
        self.post_subtract(1)
    }

    #[inline]
    fn add(&self, value: u64) -> u64 {
        let new = self.value.get().wrapping_add(value);
        self.value.set(new);
        new
    }

    #[inline]
    fn post_add(&self, value: u64) -> u64 {
        let old = self.value.get();
        self.value.set(old.wrapping_add(value));
        old
    }

    #[inline]
    fn subtract(&self, value: u64) -> u64 {
        let new = self.value.get().wrapping_sub(value);
        self.value.set(new);
        new
    }

    #[inline]
    fn post_subtract(&self, value: u64) -> u64 {
        let old = self.value.get();
        self.value.set(old.wrapping_sub(value));
        old
    }

    #[inline]
    fn exchange_if_greater(&self, value: u64) -> u64 {
        if value > self.value.get() {
            self.value.set(value);
        }
        self.value.get()
    }

    #[inline]
    fn conditional_increment(&self) -> u64 {
        let current = self.value.get();
        if current == 0 {
            return 0;
        }
        let new = current.wrapping_add(1);
        self.value.set(new);
        new
    }
}

/// A [`Count`] where every operation is a single atomic hardware operation or a
/// bounded compare-and-swap retry loop.
///
/// Loads use acquire ordering, stores release, and read-modify-write operations
/// acquire-release, so one thread's allocation is visible to another thread's
/// statistics read.
#[derive(Debug, Default)]
pub struct AtomicCount {
    value: AtomicU64,
}

impl AtomicCount {
    /// Creates a counter holding `value`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }
}

impl Count for AtomicCount {
    #[inline]
    fn set(&self, value: u64) {
        self.value.store(value, Ordering::Release);
    }

    #[inline]
    fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    #[inline]
    fn increment(&self) -> u64 {
        self.add(1)
    }

    #[inline]
    fn post_increment(&self) -> u64 {
        self.post_add(1)
    }

    #[inline]
    fn decrement(&self) -> u64 {
        self.subtract(1)
    }

    #[inline]
    fn post_decrement(&self) -> u64 {
        self.post_subtract(1)
    }

    #[inline]
    fn add(&self, value: u64) -> u64 {
        self.value
            .fetch_add(value, Ordering::AcqRel)
            .wrapping_add(value)
    }

    #[inline]
    fn post_add(&self, value: u64) -> u64 {
        self.value.fetch_add(value, Ordering::AcqRel)
    }

    #[inline]
    fn subtract(&self, value: u64) -> u64 {
        self.value
            .fetch_sub(value, Ordering::AcqRel)
            .wrapping_sub(value)
    }

    #[inline]
    fn post_subtract(&self, value: u64) -> u64 {
        self.value.fetch_sub(value, Ordering::AcqRel)
    }

    #[inline]
    fn exchange_if_greater(&self, value: u64) -> u64 {
        let mut current = self.value.load(Ordering::Acquire);

        while value > current {
            match self.value.compare_exchange_weak(
                current,
                value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return value,
                Err(observed) => current = observed,
            }
        }

        current
    }

    #[inline]
    fn conditional_increment(&self) -> u64 {
        let mut current = self.value.load(Ordering::Acquire);

        while current != 0 {
            let new = current.wrapping_add(1);
            match self
                .value
                .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return new,
                Err(observed) => current = observed,
            }
        }

        0
    }
}
