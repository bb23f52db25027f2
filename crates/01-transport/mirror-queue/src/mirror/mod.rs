//! Mirrored mapping of the queue's backing object.
//!
//! Layout of the backing object and of this process's address space:
//!
//! ```text
//! backing object:  [ header page ][ data: capacity bytes ]
//!                    ^ offset 0     ^ offset page_size
//!
//! address space:   [ data (first half) ][ data again (mirror) ]
//!                    ^ base               ^ base + capacity
//! ```
//!
//! A `2 * capacity` placeholder is reserved first, then the data region is
//! mapped over each half at fixed addresses. Dropping the mapping releases the
//! whole reservation with a single unmap. The header lives on its own page so
//! the data mappings start at a page-aligned file offset.

#[cfg(feature = "loom")]
use loom::sync::atomic::{AtomicU64, Ordering};
#[cfg(not(feature = "loom"))]
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cursor::CursorPair;

#[cfg(unix)]
mod shm;
#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub(crate) use unix::MirrorMap;

#[cfg(not(unix))]
mod unsupported;
#[cfg(not(unix))]
pub(crate) use unsupported::MirrorMap;

/// Written last when a queue header is initialised ("MIRRORQ1").
pub(crate) const HEADER_MAGIC: u64 = 0x4D49_5252_4F52_5131;

/// Returns the system page size.
#[cfg(unix)]
pub fn page_size() -> usize {
    rustix::param::page_size()
}

#[cfg(not(unix))]
pub fn page_size() -> usize {
    4096
}

/// Rounds `min_capacity` up to a power of two, then to a multiple of `page`.
///
/// Zero is treated as one. Returns `None` when the result, doubled for the
/// mirror and extended by the header page, would not fit in `usize`.
pub fn round_capacity(min_capacity: usize, page: usize) -> Option<usize> {
    debug_assert!(page.is_power_of_two());
    let pow2 = min_capacity.max(1).checked_next_power_of_two()?;
    let capacity = pow2.checked_add(page - 1)? & !(page - 1);
    capacity.checked_mul(2)?.checked_add(page)?;
    Some(capacity)
}

/// Queue metadata stored in the first page of the backing object.
#[repr(C)]
pub(crate) struct QueueHeader {
    magic: AtomicU64,
    capacity: AtomicU64,
    _reserved: [u64; 6],
    cursors: CursorPair,
}

impl QueueHeader {
    /// Fills in a zeroed header and publishes the magic word.
    pub(crate) fn publish(&self, capacity: usize) {
        self.capacity.store(capacity as u64, Ordering::Relaxed);
        self.magic.store(HEADER_MAGIC, Ordering::Release);
    }

    /// Capacity recorded by the creator, or `None` if the header is not published yet.
    pub(crate) fn published_capacity(&self) -> Option<u64> {
        if self.magic.load(Ordering::Acquire) != HEADER_MAGIC {
            return None;
        }
        Some(self.capacity.load(Ordering::Relaxed))
    }

    pub(crate) fn cursors(&self) -> &CursorPair {
        &self.cursors
    }
}
