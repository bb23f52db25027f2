use std::convert::Infallible;
use std::ptr::NonNull;

use super::QueueHeader;
use crate::{QueueConfig, QueueError, QueueResult};

/// Placeholder for targets without a double-mapping primitive; never constructed.
#[derive(Debug)]
pub(crate) struct MirrorMap {
    never: Infallible,
}

impl MirrorMap {
    pub(crate) fn create(config: &QueueConfig) -> QueueResult<Self> {
        config.validate()?;
        Err(QueueError::Unsupported)
    }

    pub(crate) fn attach(_name: &str) -> QueueResult<Self> {
        Err(QueueError::Unsupported)
    }

    pub(crate) fn header(&self) -> &QueueHeader {
        match self.never {}
    }

    pub(crate) fn base(&self) -> NonNull<u8> {
        match self.never {}
    }

    pub(crate) fn capacity(&self) -> usize {
        match self.never {}
    }

    pub(crate) fn label(&self) -> &str {
        match self.never {}
    }
}
