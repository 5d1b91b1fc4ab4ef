//! Layout of the metadata headers placed ahead of padded allocations.
//!
//! A padded allocation reserves one header block in front of the bytes handed to
//! the caller:
//!
//! ```text
//! raw pointer                     user pointer
//! v                               v
//! +---------------+---------------+------------------------+
//! | size: u64     | elements: u64 | caller-visible bytes   |
//! +---------------+---------------+------------------------+
//! 0               8               16
//! ```
//!
//! The size field always holds the byte count most recently requested for the
//! block; it is how the engine recovers the size at free time. The element-count
//! field is written only for array allocations and is zero otherwise.

use std::mem::{align_of, size_of};

/// Byte offset of the size field within the header block.
pub(crate) const SIZE_FIELD_OFFSET: usize = 0;

/// Byte offset of the element-count field within the header block.
pub(crate) const ELEMENT_COUNT_FIELD_OFFSET: usize = next_multiple_of_align(
    SIZE_FIELD_OFFSET + size_of::<u64>(),
    align_of::<u64>(),
);

/// Total bytes reserved ahead of the user pointer in a padded allocation.
///
/// Rounded up to the strongest alignment `malloc` guarantees, so the user pointer
/// keeps the same alignment guarantee as the raw pointer.
pub(crate) const HEADER_BYTES: usize = next_multiple_of_align(
    ELEMENT_COUNT_FIELD_OFFSET + size_of::<u64>(),
    MALLOC_ALIGN,
);

/// The strongest alignment the system allocator guarantees for any allocation.
pub(crate) const MALLOC_ALIGN: usize = align_of::<libc::max_align_t>();

const fn next_multiple_of_align(value: usize, align: usize) -> usize {
    let remainder = value % align;
    if remainder == 0 {
        value
    } else {
        value + (align - remainder)
    }
}

// The header fields must not overlap and the user pointer must preserve the
// allocator's alignment guarantee.
const _: () = assert!(ELEMENT_COUNT_FIELD_OFFSET >= SIZE_FIELD_OFFSET + size_of::<u64>());
const _: () = assert!(HEADER_BYTES >= ELEMENT_COUNT_FIELD_OFFSET + size_of::<u64>());
const _: () = assert!(HEADER_BYTES % MALLOC_ALIGN == 0);
const _: () = assert!(MALLOC_ALIGN % align_of::<u64>() == 0);

/// Writes the requested size into the header of a padded allocation.
///
/// # Safety
///
/// `raw` must point to the start of a padded allocation of at least
/// [`HEADER_BYTES`] bytes, aligned as returned by the system allocator.
#[inline]
pub(crate) unsafe fn write_size(raw: *mut u8, size: u64) {
    // SAFETY: The size field lies within the header block per the layout
    // invariants above, and raw's malloc alignment satisfies u64 alignment.
    unsafe { raw.add(SIZE_FIELD_OFFSET).cast::<u64>().write(size) }
}

/// Reads the requested size back from the header of a padded allocation.
///
/// # Safety
///
/// `raw` must point to the start of a padded allocation previously initialized
/// via [`write_size`].
#[inline]
pub(crate) unsafe fn read_size(raw: *const u8) -> u64 {
    // SAFETY: Same layout and alignment argument as write_size.
    unsafe { raw.add(SIZE_FIELD_OFFSET).cast::<u64>().read() }
}

/// Writes the element count into the header of a padded allocation.
///
/// # Safety
///
/// Same contract as [`write_size`].
#[inline]
pub(crate) unsafe fn write_element_count(raw: *mut u8, count: u64) {
    // SAFETY: The element-count field lies within the header block and is
    // u64-aligned per the layout invariants above.
    unsafe {
        raw.add(ELEMENT_COUNT_FIELD_OFFSET)
            .cast::<u64>()
            .write(count);
    }
}

/// Reads the element count back from the header of a padded allocation.
///
/// # Safety
///
/// `raw` must point to the start of a padded allocation previously initialized
/// via [`write_element_count`].
#[inline]
pub(crate) unsafe fn read_element_count(raw: *const u8) -> u64 {
    // SAFETY: Same layout and alignment argument as write_element_count.
    unsafe { raw.add(ELEMENT_COUNT_FIELD_OFFSET).cast::<u64>().read() }
}
