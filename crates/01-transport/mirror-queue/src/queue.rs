//! Queue handles: the two endpoints and the pair that owns both.
//!
//! [`Producer`] owns the write cursor, [`Consumer`] owns the read cursor.
//! Neither is `Clone`, so within a process the single-writer/single-reader
//! rule is enforced by ownership. Two processes attached to the same name must
//! still agree that only one of them writes and only one reads; a second
//! writer or reader on the same queue corrupts it.
//!
//! All operations are non-blocking. An empty or full queue reports zero, and
//! callers that need to wait poll [`Consumer::readable_space`] /
//! [`Producer::writable_space`] or use their own wakeup channel.

use std::sync::Arc;

use tracing::debug;

use crate::cursor::{CursorPair, Geometry};
use crate::grant::{ReadGrant, WriteGrant};
use crate::mirror::MirrorMap;
use crate::{QueueConfig, QueueResult};

/// Write end of a queue.
#[derive(Debug)]
pub struct Producer {
    map: Arc<MirrorMap>,
    geometry: Geometry,
}

impl Producer {
    fn cursors(&self) -> &CursorPair {
        self.map.header().cursors()
    }

    /// Usable buffer size in bytes.
    pub fn capacity(&self) -> usize {
        self.geometry.capacity()
    }

    /// Shared memory name, or `<anonymous>`.
    pub fn name(&self) -> &str {
        self.map.label()
    }

    /// Bytes that can be written right now.
    pub fn writable_space(&self) -> usize {
        let (write, read) = self.cursors().writer_snapshot();
        self.geometry.writable(write, read)
    }

    /// Bytes waiting for the consumer.
    pub fn readable_space(&self) -> usize {
        let (write, read) = self.cursors().observe();
        self.geometry.readable(write, read)
    }

    /// Opens a view over all free space, or `None` when the queue is full.
    pub fn begin_write(&mut self) -> Option<WriteGrant<'_>> {
        let (write, read) = self.cursors().writer_snapshot();
        let space = self.geometry.writable(write, read);
        if space == 0 {
            return None;
        }
        let ptr = unsafe {
            // SAFETY: offset < capacity and the view spans 2 * capacity bytes.
            self.map.base().as_ptr().add(self.geometry.offset(write))
        };
        Some(WriteGrant::new(self, ptr, space))
    }

    /// Publishes `length` bytes written at the cursor.
    ///
    /// The commit is clamped to the current free space, so an over-long commit
    /// never overwrites unread data. Returns the number of bytes published.
    pub fn end_write(&mut self, length: usize) -> usize {
        if length == 0 {
            return 0;
        }
        let (write, read) = self.cursors().writer_snapshot();
        let length = length.min(self.geometry.writable(write, read));
        if length > 0 {
            self.cursors().publish_write(length);
        }
        length
    }

    /// Offers up to `length` free bytes to `transform` and publishes as many as
    /// it reports having written.
    ///
    /// A count larger than the offered slice publishes only the offered bytes and
    /// the excess is ignored. `transform` is not called when the queue is full.
    pub fn generic_write<F>(&mut self, length: usize, transform: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        let Some(mut grant) = self.begin_write() else {
            return 0;
        };
        let offered = length.min(grant.len());
        let written = transform(&mut grant[..offered]);
        grant.commit(written.min(offered))
    }

    /// Copies as much of `data` as fits and returns the number of bytes queued.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.generic_write(data.len(), |buf| {
            buf.copy_from_slice(&data[..buf.len()]);
            buf.len()
        })
    }
}

/// Read end of a queue.
#[derive(Debug)]
pub struct Consumer {
    map: Arc<MirrorMap>,
    geometry: Geometry,
}

impl Consumer {
    fn cursors(&self) -> &CursorPair {
        self.map.header().cursors()
    }

    pub fn capacity(&self) -> usize {
        self.geometry.capacity()
    }

    pub fn name(&self) -> &str {
        self.map.label()
    }

    /// Bytes that can be read right now.
    pub fn readable_space(&self) -> usize {
        let (write, read) = self.cursors().reader_snapshot();
        self.geometry.readable(write, read)
    }

    /// Bytes the producer could still add.
    pub fn writable_space(&self) -> usize {
        let (write, read) = self.cursors().observe();
        self.geometry.writable(write, read)
    }

    /// Opens a view over all readable bytes, or `None` when the queue is empty.
    pub fn begin_read(&mut self) -> Option<ReadGrant<'_>> {
        let (write, read) = self.cursors().reader_snapshot();
        let space = self.geometry.readable(write, read);
        if space == 0 {
            return None;
        }
        let ptr = unsafe {
            // SAFETY: offset < capacity and the view spans 2 * capacity bytes.
            self.map.base().as_ptr().add(self.geometry.offset(read))
        };
        Some(ReadGrant::new(self, ptr, space))
    }

    /// Releases `length` bytes at the cursor, clamped to what is readable.
    ///
    /// Returns the number of bytes actually released, which is smaller than
    /// `length` when fewer bytes were available.
    pub fn end_read(&mut self, length: usize) -> usize {
        if length == 0 {
            return 0;
        }
        let (write, read) = self.cursors().reader_snapshot();
        let length = length.min(self.geometry.readable(write, read));
        if length > 0 {
            self.cursors().publish_read(length);
        }
        length
    }

    /// Offers up to `length` readable bytes to `transform` and releases as many
    /// as it reports having consumed.
    ///
    /// A count larger than the offered slice releases only the offered bytes;
    /// anything past the offer stays queued. `transform` is not called when the
    /// queue is empty.
    pub fn generic_read<F>(&mut self, length: usize, transform: F) -> usize
    where
        F: FnOnce(&[u8]) -> usize,
    {
        let Some(grant) = self.begin_read() else {
            return 0;
        };
        let offered = length.min(grant.len());
        let consumed = transform(&grant[..offered]);
        grant.commit(consumed.min(offered))
    }

    /// Copies up to `dest.len()` bytes out of the queue and returns the count.
    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        self.generic_read(dest.len(), |buf| {
            dest[..buf.len()].copy_from_slice(buf);
            buf.len()
        })
    }

    /// Drops up to `length` readable bytes without looking at them.
    pub fn skip(&mut self, length: usize) -> usize {
        self.end_read(length)
    }

    /// All readable bytes, borrowed from `self` rather than from a grant.
    pub(crate) fn peek(&self) -> &[u8] {
        let (write, read) = self.cursors().reader_snapshot();
        let space = self.geometry.readable(write, read);
        unsafe {
            // SAFETY: same bounds as `begin_read`; releasing bytes needs `&mut self`,
            // so the slice cannot outlive them.
            std::slice::from_raw_parts(
                self.map.base().as_ptr().add(self.geometry.offset(read)),
                space,
            )
        }
    }
}

/// Both endpoints of one queue.
///
/// ```
/// use mirror_queue::MirrorQueue;
///
/// let mut queue = MirrorQueue::anonymous(1000)?;
/// assert_eq!(queue.write(b"hello"), 5);
///
/// let mut out = [0u8; 8];
/// let n = queue.read(&mut out);
/// assert_eq!(&out[..n], b"hello");
/// # Ok::<(), mirror_queue::QueueError>(())
/// ```
#[derive(Debug)]
pub struct MirrorQueue {
    producer: Producer,
    consumer: Consumer,
}

impl MirrorQueue {
    /// Creates a named queue of at least `min_capacity` bytes, replacing any
    /// stale object left under the same name.
    pub fn open(name: &str, min_capacity: usize) -> QueueResult<Self> {
        Self::with_config(&QueueConfig::named(name, min_capacity))
    }

    /// Creates a queue with no name, for use between threads of this process.
    pub fn anonymous(min_capacity: usize) -> QueueResult<Self> {
        Self::with_config(&QueueConfig::anonymous(min_capacity))
    }

    pub fn with_config(config: &QueueConfig) -> QueueResult<Self> {
        MirrorMap::create(config).map(Self::from_map)
    }

    /// Maps a named queue created elsewhere; capacity comes from its header.
    pub fn attach(name: &str) -> QueueResult<Self> {
        MirrorMap::attach(name).map(Self::from_map)
    }

    fn from_map(map: MirrorMap) -> Self {
        let geometry = Geometry::new(map.capacity());
        let map = Arc::new(map);
        Self {
            producer: Producer {
                map: Arc::clone(&map),
                geometry,
            },
            consumer: Consumer { map, geometry },
        }
    }

    /// Unmaps the queue and releases the backing object.
    pub fn close(self) {
        debug!(name = self.name(), "closing mirrored queue");
    }

    /// Separates the endpoints so they can move to different threads.
    pub fn split(self) -> (Producer, Consumer) {
        (self.producer, self.consumer)
    }

    pub fn producer(&mut self) -> &mut Producer {
        &mut self.producer
    }

    pub fn consumer(&mut self) -> &mut Consumer {
        &mut self.consumer
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity()
    }

    pub fn name(&self) -> &str {
        self.producer.name()
    }

    pub fn readable_space(&self) -> usize {
        self.consumer.readable_space()
    }

    pub fn writable_space(&self) -> usize {
        self.producer.writable_space()
    }

    pub fn begin_read(&mut self) -> Option<ReadGrant<'_>> {
        self.consumer.begin_read()
    }

    pub fn end_read(&mut self, length: usize) -> usize {
        self.consumer.end_read(length)
    }

    pub fn begin_write(&mut self) -> Option<WriteGrant<'_>> {
        self.producer.begin_write()
    }

    pub fn end_write(&mut self, length: usize) -> usize {
        self.producer.end_write(length)
    }

    pub fn generic_read<F>(&mut self, length: usize, transform: F) -> usize
    where
        F: FnOnce(&[u8]) -> usize,
    {
        self.consumer.generic_read(length, transform)
    }

    pub fn generic_write<F>(&mut self, length: usize, transform: F) -> usize
    where
        F: FnOnce(&mut [u8]) -> usize,
    {
        self.producer.generic_write(length, transform)
    }

    pub fn read(&mut self, dest: &mut [u8]) -> usize {
        self.consumer.read(dest)
    }

    pub fn write(&mut self, data: &[u8]) -> usize {
        self.producer.write(data)
    }

    pub fn skip(&mut self, length: usize) -> usize {
        self.consumer.skip(length)
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    //! Unit coverage for the endpoint protocol on an anonymous mapping.
    use super::*;
    use rand::prelude::*;
    use std::collections::VecDeque;

    fn queue(min_capacity: usize) -> MirrorQueue {
        MirrorQueue::anonymous(min_capacity).expect("create queue")
    }

    /// Advances both cursors to `offset` so the next write starts there.
    fn park_cursors_at(queue: &mut MirrorQueue, offset: usize) {
        let filler = vec![0u8; offset];
        assert_eq!(queue.write(&filler), offset);
        assert_eq!(queue.skip(offset), offset);
    }

    #[test]
    fn single_write_round_trip() {
        let mut queue = queue(256);
        assert_eq!(queue.write(b"mirrored ring"), 13);
        assert_eq!(queue.readable_space(), 13);

        let mut out = [0u8; 32];
        assert_eq!(queue.read(&mut out), 13);
        assert_eq!(&out[..13], b"mirrored ring");
        assert_eq!(queue.readable_space(), 0);
        assert_eq!(queue.writable_space(), queue.capacity());
    }

    #[test]
    fn begin_on_empty_and_full() {
        let mut queue = queue(1);
        assert!(queue.begin_read().is_none());

        let capacity = queue.capacity();
        assert_eq!(queue.write(&vec![7u8; capacity]), capacity);
        assert!(queue.begin_write().is_none());
        assert_eq!(queue.write(b"x"), 0);
    }

    /// The write grant spans the wrap point as a single slice.
    #[test]
    fn grant_is_linear_across_wrap() {
        let mut queue = queue(1);
        let capacity = queue.capacity();
        park_cursors_at(&mut queue, capacity - 3);

        let mut grant = queue.begin_write().expect("grant");
        assert_eq!(grant.len(), capacity);
        grant[..10].copy_from_slice(b"0123456789");
        assert_eq!(grant.commit(10), 10);

        let grant = queue.begin_read().expect("grant");
        assert_eq!(&grant[..], b"0123456789");
        assert_eq!(grant.commit(10), 10);
    }

    #[test]
    fn partial_commit_leaves_remainder() {
        let mut queue = queue(64);
        queue.write(b"abcdef");

        let grant = queue.begin_read().expect("grant");
        assert_eq!(grant.len(), 6);
        assert_eq!(grant.commit(2), 2);

        let grant = queue.begin_read().expect("grant");
        assert_eq!(grant.as_slice(), b"cdef");
    }

    #[test]
    fn dropped_grant_commits_nothing() {
        let mut queue = queue(64);
        {
            let mut grant = queue.begin_write().expect("grant");
            grant[0] = 1;
        }
        assert_eq!(queue.readable_space(), 0);

        queue.write(b"zz");
        {
            let grant = queue.begin_read().expect("grant");
            assert_eq!(grant.len(), 2);
        }
        assert_eq!(queue.readable_space(), 2);
    }

    #[test]
    fn end_read_clamps_to_available() {
        let mut queue = queue(64);
        queue.write(b"abc");
        assert_eq!(queue.end_read(100), 3);
        assert_eq!(queue.readable_space(), 0);
        assert_eq!(queue.end_read(1), 0);
    }

    #[test]
    fn end_write_clamps_to_free_space() {
        let mut queue = queue(1);
        let capacity = queue.capacity();
        queue.write(b"keep");
        assert_eq!(queue.end_write(capacity), capacity - 4);
        assert_eq!(queue.readable_space(), capacity);

        let mut head = [0u8; 4];
        queue.read(&mut head);
        assert_eq!(&head, b"keep");
    }

    #[test]
    fn zero_length_commits_are_noops() {
        let mut queue = queue(64);
        queue.write(b"abc");
        let before = (queue.readable_space(), queue.writable_space());
        assert_eq!(queue.end_read(0), 0);
        assert_eq!(queue.end_write(0), 0);
        assert_eq!((queue.readable_space(), queue.writable_space()), before);
    }

    #[test]
    fn generic_read_commits_transform_result() {
        let mut queue = queue(64);
        queue.write(b"abcdef");

        let mut seen = Vec::new();
        let consumed = queue.generic_read(4, |buf| {
            seen.extend_from_slice(buf);
            1
        });
        assert_eq!(seen, b"abcd");
        assert_eq!(consumed, 1);
        assert_eq!(queue.readable_space(), 5);

        // Reports beyond the offer are capped at the offer.
        assert_eq!(queue.generic_read(2, |_| 50), 2);
        assert_eq!(queue.readable_space(), 3);
        let mut rest = [0u8; 3];
        assert_eq!(queue.read(&mut rest), 3);
        assert_eq!(&rest, b"def");

        assert_eq!(queue.generic_write(4, |buf| buf.len() + 60), 4);
        assert_eq!(queue.readable_space(), 4);
    }

    #[test]
    fn transforms_skipped_without_space() {
        let mut queue = queue(1);
        let called = std::cell::Cell::new(false);
        assert_eq!(
            queue.generic_read(8, |_| {
                called.set(true);
                8
            }),
            0
        );
        assert!(!called.get());

        let capacity = queue.capacity();
        queue.write(&vec![0u8; capacity]);
        assert_eq!(
            queue.generic_write(8, |_| {
                called.set(true);
                8
            }),
            0
        );
        assert!(!called.get());
    }

    #[test]
    fn generic_write_caps_offer_at_request() {
        let mut queue = queue(64);
        let written = queue.generic_write(5, |buf| {
            assert_eq!(buf.len(), 5);
            buf.fill(9);
            buf.len()
        });
        assert_eq!(written, 5);
        assert_eq!(queue.readable_space(), 5);
    }

    #[test]
    fn short_transfers_report_actual_counts() {
        let mut queue = queue(1);
        let capacity = queue.capacity();
        let data = vec![3u8; capacity + 100];
        assert_eq!(queue.write(&data), capacity);

        let mut out = vec![0u8; capacity + 100];
        assert_eq!(queue.read(&mut out), capacity);
        assert_eq!(queue.read(&mut out), 0);
    }

    #[test]
    fn split_endpoints_share_cursors() {
        let queue = queue(64);
        let (mut producer, mut consumer) = queue.split();
        assert_eq!(producer.name(), consumer.name());
        producer.write(b"pair");
        assert_eq!(consumer.readable_space(), 4);
        assert_eq!(producer.readable_space(), 4);
        let mut out = [0u8; 4];
        consumer.read(&mut out);
        assert_eq!(&out, b"pair");
        assert_eq!(consumer.writable_space(), consumer.capacity());
    }

    /// Randomised stress covering wrap-around, FIFO order, and space accounting.
    #[test]
    fn var_len_stress() {
        let mut queue = queue(4096);
        let capacity = queue.capacity();
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut expected = VecDeque::<u8>::new();
        let mut next = 0u8;

        for _ in 0..5_000 {
            let len = rng.gen_range(1..=capacity / 2);
            let payload: Vec<u8> = (0..len)
                .map(|_| {
                    next = next.wrapping_add(1);
                    next
                })
                .collect();
            let written = queue.write(&payload);
            expected.extend(&payload[..written]);
            assert_eq!(queue.readable_space(), expected.len());
            assert_eq!(queue.readable_space() + queue.writable_space(), capacity);

            let mut out = vec![0u8; rng.gen_range(1..=capacity)];
            let read = queue.read(&mut out);
            for byte in &out[..read] {
                assert_eq!(Some(*byte), expected.pop_front());
            }
        }
    }
}
