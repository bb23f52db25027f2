use std::ffi::c_void;
use std::ptr::{self, NonNull};

use memmap2::{MmapMut, MmapOptions};
use rustix::mm::{mmap, mmap_anonymous, munmap, MapFlags, ProtFlags};
use tracing::debug;

use super::shm::Backing;
use super::{page_size, round_capacity, QueueHeader};
use crate::{QueueConfig, QueueError, QueueResult};

/// `2 * capacity` bytes of address space holding the data region twice.
#[derive(Debug)]
struct MirrorView {
    base: NonNull<u8>,
    len: usize,
}

impl MirrorView {
    /// Reserves the address range and maps `capacity` bytes of `backing`,
    /// starting at `file_offset`, into both halves.
    fn new(backing: &Backing, file_offset: u64, capacity: usize) -> QueueResult<Self> {
        let len = capacity * 2;
        let placeholder = unsafe {
            // SAFETY: a fresh inaccessible mapping chosen by the kernel; it aliases nothing.
            mmap_anonymous(ptr::null_mut(), len, ProtFlags::empty(), MapFlags::PRIVATE)
        }
        .map_err(|err| QueueError::os("mmap (reserve)", backing.label(), err))?;

        let base = NonNull::new(placeholder.cast::<u8>()).ok_or_else(|| {
            QueueError::os("mmap (reserve)", backing.label(), std::io::ErrorKind::Other)
        })?;

        // From here on the reservation is released on every exit path.
        let view = Self { base, len };
        view.map_half(backing, 0, file_offset, capacity)?;
        view.map_half(backing, capacity, file_offset, capacity)?;
        Ok(view)
    }

    fn map_half(
        &self,
        backing: &Backing,
        at: usize,
        file_offset: u64,
        capacity: usize,
    ) -> QueueResult<()> {
        let target = unsafe {
            // SAFETY: `at + capacity <= len`, so the target stays inside our reservation.
            self.base.as_ptr().add(at)
        };
        let mapped = unsafe {
            // SAFETY: MAP_FIXED only replaces pages of the reservation owned by `self`.
            mmap(
                target.cast::<c_void>(),
                capacity,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED | MapFlags::FIXED,
                backing.fd(),
                file_offset,
            )
        }
        .map_err(|err| QueueError::os("mmap (mirror)", backing.label(), err))?;

        if mapped.cast::<u8>() != target {
            return Err(QueueError::os(
                "mmap (mirror)",
                backing.label(),
                std::io::ErrorKind::AddrNotAvailable,
            ));
        }
        Ok(())
    }
}

impl Drop for MirrorView {
    fn drop(&mut self) {
        // SAFETY: `base..base + len` is the reservation created in `new`; unmapping
        // it also removes both fixed mappings placed inside it.
        if let Err(err) = unsafe { munmap(self.base.as_ptr().cast::<c_void>(), self.len) } {
            debug!(%err, "munmap of mirrored view failed");
        }
    }
}

/// Header page, mirrored data view, and the backing object they come from.
///
/// Field order is drop order: both mappings go before the descriptor is closed
/// and, for a creating endpoint, before the name is unlinked.
#[derive(Debug)]
pub(crate) struct MirrorMap {
    view: MirrorView,
    header: MmapMut,
    backing: Backing,
    capacity: usize,
}

// SAFETY: the view is a process-wide mapping; concurrent access goes through the
// atomic cursors in the header and the single-producer/single-consumer handles.
unsafe impl Send for MirrorMap {}
unsafe impl Sync for MirrorMap {}

impl MirrorMap {
    /// Creates fresh backing storage and maps it.
    pub(crate) fn create(config: &QueueConfig) -> QueueResult<Self> {
        config.validate()?;

        let page = page_size();
        let capacity =
            round_capacity(config.min_capacity, page).ok_or(QueueError::InvalidCapacity {
                requested: config.min_capacity,
            })?;
        let total = (page + capacity) as u64;

        let mut backing = match &config.name {
            Some(name) => {
                Backing::create(name, total, config.permissions, config.replace_stale)?
            }
            None => Backing::anonymous(total)?,
        };

        // ftruncate zero-fills the object, so the cursors already read as zero.
        let header = map_header(&backing, page)?;
        let view = MirrorView::new(&backing, page as u64, capacity)?;

        let map = Self {
            view,
            header,
            capacity,
            backing: {
                backing.set_unlink_on_drop(config.unlink_on_close);
                backing
            },
        };
        map.header().publish(capacity);

        debug!(
            name = map.label(),
            capacity,
            requested = config.min_capacity,
            "created mirrored queue"
        );
        Ok(map)
    }

    /// Maps an existing named queue created by another endpoint.
    pub(crate) fn attach(name: &str) -> QueueResult<Self> {
        let (backing, actual) = Backing::open(name)?;
        let page = page_size();
        if actual < page as u64 {
            return Err(QueueError::NotInitialised {
                name: name.to_owned(),
            });
        }

        let header = map_header(&backing, page)?;
        let header_ref = unsafe {
            // SAFETY: the header mapping is at least one page and page aligned.
            &*header.as_ptr().cast::<QueueHeader>()
        };
        let recorded = header_ref
            .published_capacity()
            .ok_or_else(|| QueueError::NotInitialised {
                name: name.to_owned(),
            })?;

        let capacity = usize::try_from(recorded)
            .ok()
            .filter(|cap| round_capacity(*cap, page) == Some(*cap))
            .ok_or_else(|| QueueError::NotInitialised {
                name: name.to_owned(),
            })?;
        let expected = (page + capacity) as u64;
        if actual != expected {
            return Err(QueueError::SizeMismatch {
                name: name.to_owned(),
                expected,
                actual,
            });
        }

        let view = MirrorView::new(&backing, page as u64, capacity)?;
        debug!(name, capacity, "attached to mirrored queue");
        Ok(Self {
            view,
            header,
            backing,
            capacity,
        })
    }

    pub(crate) fn header(&self) -> &QueueHeader {
        unsafe {
            // SAFETY: the header mapping lives as long as `self` and starts on a page boundary.
            &*self.header.as_ptr().cast::<QueueHeader>()
        }
    }

    /// Start of the mirrored view; valid for `2 * capacity` bytes.
    pub(crate) fn base(&self) -> NonNull<u8> {
        self.view.base
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn label(&self) -> &str {
        self.backing.label()
    }
}

fn map_header(backing: &Backing, page: usize) -> QueueResult<MmapMut> {
    unsafe {
        // SAFETY: the first page of the backing object is reserved for the header
        // and is only accessed through atomics.
        MmapOptions::new().len(page).map_mut(backing.owned_fd())
    }
    .map_err(|err| QueueError::os("mmap (header)", backing.label(), err))
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    fn anonymous(min_capacity: usize) -> MirrorMap {
        MirrorMap::create(&QueueConfig::anonymous(min_capacity)).expect("create mirror")
    }

    /// Writes through the second half land at the start of the first, and vice versa.
    #[test]
    fn second_half_aliases_first() {
        let map = anonymous(1);
        let capacity = map.capacity();
        let base = map.base().as_ptr();
        unsafe {
            base.add(capacity + 5).write(0xA5);
            assert_eq!(base.add(5).read(), 0xA5);
            base.add(capacity - 1).write(0x5A);
            assert_eq!(base.add(2 * capacity - 1).read(), 0x5A);
        }
    }

    /// A copy that straddles the wrap point is readable from offset zero.
    #[test]
    fn straddling_copy_wraps() {
        let map = anonymous(1);
        let capacity = map.capacity();
        let base = map.base().as_ptr();
        let data: Vec<u8> = (0u8..10).collect();
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), base.add(capacity - 3), data.len());
            let head = std::slice::from_raw_parts(base.add(capacity - 3), 3);
            let tail = std::slice::from_raw_parts(base, 7);
            assert_eq!(head, &data[..3]);
            assert_eq!(tail, &data[3..]);
        }
    }

    #[test]
    fn header_starts_zeroed_and_published() {
        let map = anonymous(5000);
        assert_eq!(map.header().published_capacity(), Some(map.capacity() as u64));
        assert_eq!(map.header().cursors().observe(), (0, 0));
        assert_eq!(map.label(), super::super::shm::ANONYMOUS_LABEL);
    }

    #[test]
    fn invalid_capacity_is_reported() {
        let err = MirrorMap::create(&QueueConfig::anonymous(usize::MAX)).expect_err("overflow");
        assert!(matches!(err, QueueError::InvalidCapacity { .. }));
    }
}
