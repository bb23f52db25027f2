//! Cursor arithmetic shared by both ends of the queue.
//!
//! Each side owns one monotonically increasing counter: the producer advances
//! `write`, the consumer advances `read`. Counters wrap at `usize::MAX`; because
//! `2 * capacity` is a power of two it divides `2^usize::BITS`, so masking the
//! wrapping difference with `2 * capacity - 1` yields the exact fill level.
//!
//! Ordering follows a store-then-publish discipline: the producer writes bytes,
//! then publishes its cursor with `Release`; the consumer loads the write cursor
//! with `Acquire` before reading. The same pairing runs the other way so the
//! producer never reuses bytes the consumer is still looking at.

#[cfg(feature = "loom")]
use loom::sync::atomic::{AtomicUsize, Ordering};
#[cfg(not(feature = "loom"))]
use std::sync::atomic::{AtomicUsize, Ordering};

/// Capacity and the two masks derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    capacity: usize,
    small_mask: usize,
    big_mask: usize,
}

impl Geometry {
    /// Builds the masks for `capacity`, which must be a non-zero power of two
    /// no larger than half the address space.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity <= usize::MAX / 2 + 1,
            "capacity {capacity} must be a power of two below 2^(usize::BITS - 1)"
        );
        Self {
            capacity,
            small_mask: capacity - 1,
            big_mask: capacity.wrapping_mul(2).wrapping_sub(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wraps a byte offset into `[0, capacity)`.
    pub fn small_mask(&self) -> usize {
        self.small_mask
    }

    /// Wraps a cursor difference into `[0, 2 * capacity)`.
    pub fn big_mask(&self) -> usize {
        self.big_mask
    }

    /// Bytes published by the producer and not yet consumed.
    #[inline]
    pub fn readable(&self, write: usize, read: usize) -> usize {
        write.wrapping_sub(read) & self.big_mask
    }

    /// Bytes the producer may add without exceeding `capacity`.
    #[inline]
    pub fn writable(&self, write: usize, read: usize) -> usize {
        self.capacity.wrapping_add(read).wrapping_sub(write) & self.big_mask
    }

    /// Offset of `cursor` inside the first half of the mirrored mapping.
    #[inline]
    pub fn offset(&self, cursor: usize) -> usize {
        cursor & self.small_mask
    }
}

/// One counter on its own cache line.
#[repr(C, align(64))]
pub struct Cursor {
    value: AtomicUsize,
}

impl Cursor {
    fn new() -> Self {
        Self {
            value: AtomicUsize::new(0),
        }
    }
}

/// The write and read counters as laid out in the shared header.
#[repr(C)]
pub struct CursorPair {
    write: Cursor,
    read: Cursor,
}

impl CursorPair {
    pub fn new() -> Self {
        Self {
            write: Cursor::new(),
            read: Cursor::new(),
        }
    }

    /// `(write, read)` as seen by the producer.
    ///
    /// Only the producer stores `write`, so its own value needs no ordering.
    #[inline]
    pub fn writer_snapshot(&self) -> (usize, usize) {
        let write = self.write.value.load(Ordering::Relaxed);
        let read = self.read.value.load(Ordering::Acquire);
        (write, read)
    }

    /// `(write, read)` as seen by the consumer.
    #[inline]
    pub fn reader_snapshot(&self) -> (usize, usize) {
        let write = self.write.value.load(Ordering::Acquire);
        let read = self.read.value.load(Ordering::Relaxed);
        (write, read)
    }

    /// `(write, read)` for an observer that owns neither cursor.
    #[inline]
    pub fn observe(&self) -> (usize, usize) {
        let read = self.read.value.load(Ordering::Acquire);
        let write = self.write.value.load(Ordering::Acquire);
        (write, read)
    }

    /// Publishes `len` freshly written bytes.
    #[inline]
    pub fn publish_write(&self, len: usize) {
        self.write.value.fetch_add(len, Ordering::Release);
    }

    /// Releases `len` consumed bytes back to the producer.
    #[inline]
    pub fn publish_read(&self, len: usize) {
        self.read.value.fetch_add(len, Ordering::Release);
    }
}

impl Default for CursorPair {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(all(test, feature = "loom"))]
mod loom_tests {
    use super::*;
    use loom::cell::UnsafeCell;
    use loom::sync::Arc;
    use loom::thread;

    struct Model {
        geometry: Geometry,
        cursors: CursorPair,
        bytes: Vec<UnsafeCell<u8>>,
    }

    unsafe impl Sync for Model {}

    /// Loom: bytes written before a publish are visible to the consumer that observes it.
    #[test]
    #[ignore]
    fn slow_loom_publish_orders_bytes() {
        loom::model(|| {
            let capacity = 2;
            let model = Arc::new(Model {
                geometry: Geometry::new(capacity),
                cursors: CursorPair::new(),
                bytes: (0..capacity).map(|_| UnsafeCell::new(0)).collect(),
            });

            let producer = {
                let model = Arc::clone(&model);
                thread::spawn(move || {
                    for value in 1u8..=3 {
                        loop {
                            let (write, read) = model.cursors.writer_snapshot();
                            if model.geometry.writable(write, read) > 0 {
                                let offset = model.geometry.offset(write);
                                model.bytes[offset].with_mut(|byte| unsafe { *byte = value });
                                model.cursors.publish_write(1);
                                break;
                            }
                            thread::yield_now();
                        }
                    }
                })
            };

            let consumer = {
                let model = Arc::clone(&model);
                thread::spawn(move || {
                    for expected in 1u8..=3 {
                        loop {
                            let (write, read) = model.cursors.reader_snapshot();
                            if model.geometry.readable(write, read) > 0 {
                                let offset = model.geometry.offset(read);
                                let value = model.bytes[offset].with(|byte| unsafe { *byte });
                                assert_eq!(value, expected);
                                model.cursors.publish_read(1);
                                break;
                            }
                            thread::yield_now();
                        }
                    }
                })
            };

            producer.join().unwrap();
            consumer.join().unwrap();
        });
    }
}
