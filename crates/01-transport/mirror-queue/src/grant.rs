//! Zero-copy views handed out by `begin_read` / `begin_write`.
//!
//! A grant mutably borrows its endpoint, so the view cannot outlive the
//! begin/commit pair and no second grant can be opened meanwhile. The slice
//! always covers the full space reported at `begin_*` time; the mirrored
//! mapping keeps it linear across the wrap point.

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::queue::{Consumer, Producer};

/// Readable bytes at the consumer's cursor.
///
/// Dropping the grant without [`commit`](ReadGrant::commit) consumes nothing.
pub struct ReadGrant<'a> {
    consumer: &'a mut Consumer,
    ptr: *const u8,
    len: usize,
}

impl<'a> ReadGrant<'a> {
    pub(crate) fn new(consumer: &'a mut Consumer, ptr: *const u8, len: usize) -> Self {
        Self { consumer, ptr, len }
    }

    /// Bytes available when the grant was taken.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe {
            // SAFETY: `ptr` points at offset `< capacity` of a `2 * capacity` mirrored
            // view and `len <= capacity`. The producer never writes published bytes.
            std::slice::from_raw_parts(self.ptr, self.len)
        }
    }

    /// Releases the first `consumed` bytes (capped at [`len`](Self::len)) back to the
    /// producer and returns how many were released.
    pub fn commit(self, consumed: usize) -> usize {
        let consumed = consumed.min(self.len);
        self.consumer.end_read(consumed)
    }
}

impl Deref for ReadGrant<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl fmt::Debug for ReadGrant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadGrant").field("len", &self.len).finish()
    }
}

/// Free bytes at the producer's cursor.
///
/// Dropping the grant without [`commit`](WriteGrant::commit) publishes nothing.
pub struct WriteGrant<'a> {
    producer: &'a mut Producer,
    ptr: *mut u8,
    len: usize,
}

impl<'a> WriteGrant<'a> {
    pub(crate) fn new(producer: &'a mut Producer, ptr: *mut u8, len: usize) -> Self {
        Self { producer, ptr, len }
    }

    /// Free bytes when the grant was taken.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe {
            // SAFETY: same bounds as `ReadGrant::as_slice`; the consumer never
            // touches bytes that have not been published yet.
            std::slice::from_raw_parts_mut(self.ptr, self.len)
        }
    }

    /// Publishes the first `written` bytes (capped at [`len`](Self::len)) to the
    /// consumer and returns how many were published.
    pub fn commit(self, written: usize) -> usize {
        let written = written.min(self.len);
        self.producer.end_write(written)
    }
}

impl Deref for WriteGrant<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        unsafe {
            // SAFETY: see `as_mut_slice`.
            std::slice::from_raw_parts(self.ptr, self.len)
        }
    }
}

impl DerefMut for WriteGrant<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}

impl fmt::Debug for WriteGrant<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteGrant").field("len", &self.len).finish()
    }
}
