//! Backing objects for the mirrored mapping.
//!
//! Named queues live in POSIX shared memory so a second process can attach by
//! name. Anonymous queues use `memfd_create` where available; elsewhere they
//! borrow a unique shm name and unlink it straight away.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use rustix::fs::{fstat, ftruncate, Mode};
use rustix::io::Errno;
use rustix::shm;
use tracing::{debug, warn};

use crate::config::validate_name;
use crate::{QueueError, QueueResult};

pub(super) const ANONYMOUS_LABEL: &str = "<anonymous>";

/// File descriptor of the storage object, plus its name when it has one.
#[derive(Debug)]
pub(super) struct Backing {
    fd: OwnedFd,
    name: Option<String>,
    unlink_on_drop: bool,
}

impl Backing {
    /// Exclusively creates `name` and sizes it to `len` bytes.
    ///
    /// The returned backing unlinks the name on drop until the caller decides
    /// otherwise, so a failure later in construction leaves nothing behind.
    pub(super) fn create(
        name: &str,
        len: u64,
        permissions: u32,
        replace_stale: bool,
    ) -> QueueResult<Self> {
        validate_name(name)?;

        if replace_stale {
            match shm::unlink(name) {
                Ok(()) => warn!(name, "replaced stale shared memory object"),
                Err(err) if err == Errno::NOENT => {}
                Err(err) => return Err(QueueError::os("shm_unlink", name, err)),
            }
        }

        let fd = shm::open(
            name,
            shm::OFlags::CREATE | shm::OFlags::EXCL | shm::OFlags::RDWR,
            Mode::from_bits_truncate(permissions as _),
        )
        .map_err(|err| QueueError::os("shm_open", name, err))?;

        let backing = Self {
            fd,
            name: Some(name.to_owned()),
            unlink_on_drop: true,
        };
        backing.truncate(len)?;
        Ok(backing)
    }

    /// Opens an existing named object and reports its current size.
    pub(super) fn open(name: &str) -> QueueResult<(Self, u64)> {
        validate_name(name)?;

        let fd = shm::open(name, shm::OFlags::RDWR, Mode::empty())
            .map_err(|err| QueueError::os("shm_open", name, err))?;
        let stat = fstat(&fd).map_err(|err| QueueError::os("fstat", name, err))?;
        let len = u64::try_from(stat.st_size).unwrap_or(0);

        Ok((
            Self {
                fd,
                name: Some(name.to_owned()),
                unlink_on_drop: false,
            },
            len,
        ))
    }

    /// Creates an unnamed object of `len` bytes.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    pub(super) fn anonymous(len: u64) -> QueueResult<Self> {
        use rustix::fs::{memfd_create, MemfdFlags};

        let fd = memfd_create("mirror-queue", MemfdFlags::CLOEXEC)
            .map_err(|err| QueueError::os("memfd_create", ANONYMOUS_LABEL, err))?;
        let backing = Self {
            fd,
            name: None,
            unlink_on_drop: false,
        };
        backing.truncate(len)?;
        Ok(backing)
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    pub(super) fn anonymous(len: u64) -> QueueResult<Self> {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        let name = format!(
            "/mirror-queue.{}.{}",
            std::process::id(),
            NEXT_ID.fetch_add(1, Ordering::Relaxed)
        );

        let mut backing = Self::create(&name, len, 0o600, true)?;
        shm::unlink(name.as_str()).map_err(|err| QueueError::os("shm_unlink", &name, err))?;
        backing.unlink_on_drop = false;
        backing.name = None;
        Ok(backing)
    }

    pub(super) fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }

    pub(super) fn owned_fd(&self) -> &OwnedFd {
        &self.fd
    }

    pub(super) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(ANONYMOUS_LABEL)
    }

    pub(super) fn set_unlink_on_drop(&mut self, unlink: bool) {
        self.unlink_on_drop = unlink;
    }

    fn truncate(&self, len: u64) -> QueueResult<()> {
        ftruncate(&self.fd, len).map_err(|err| QueueError::os("ftruncate", self.label(), err))
    }
}

impl Drop for Backing {
    fn drop(&mut self) {
        if !self.unlink_on_drop {
            return;
        }
        if let Some(name) = &self.name {
            if let Err(err) = shm::unlink(name.as_str()) {
                debug!(name = name.as_str(), %err, "shm_unlink on close failed");
            }
        }
    }
}
