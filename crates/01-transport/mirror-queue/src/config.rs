use crate::{QueueError, QueueResult};

/// Minimum capacity used by [`QueueConfig::default`].
pub const DEFAULT_MIN_CAPACITY: usize = 64 * 1024;

/// Permission bits applied when creating a named backing object.
pub const DEFAULT_PERMISSIONS: u32 = 0o600;

/// Longest accepted shared memory name, including the leading slash.
pub const MAX_NAME_LEN: usize = 255;

/// Configuration describing how a queue's backing storage is acquired.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// POSIX shared memory name (`/name`). `None` creates an anonymous queue
    /// that can only be shared with threads of this process.
    pub name: Option<String>,
    /// Lower bound for the capacity; rounded up to a power of two and a page multiple.
    pub min_capacity: usize,
    /// Permission bits for a newly created named object.
    pub permissions: u32,
    /// Remove a leftover object with the same name before the exclusive create.
    pub replace_stale: bool,
    /// Unlink the name when the creating queue is closed.
    pub unlink_on_close: bool,
}

impl QueueConfig {
    /// Named queue with default permissions and cleanup behaviour.
    pub fn named(name: impl Into<String>, min_capacity: usize) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::anonymous(min_capacity)
        }
    }

    /// Anonymous queue for in-process producer/consumer pairs.
    pub fn anonymous(min_capacity: usize) -> Self {
        Self {
            name: None,
            min_capacity,
            permissions: DEFAULT_PERMISSIONS,
            replace_stale: true,
            unlink_on_close: true,
        }
    }

    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_replace_stale(mut self, replace_stale: bool) -> Self {
        self.replace_stale = replace_stale;
        self
    }

    pub fn with_unlink_on_close(mut self, unlink_on_close: bool) -> Self {
        self.unlink_on_close = unlink_on_close;
        self
    }

    /// Checks the name (when present) without touching the system.
    pub fn validate(&self) -> QueueResult<()> {
        match &self.name {
            Some(name) => validate_name(name),
            None => Ok(()),
        }
    }

    /// Label used in logs and errors.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::anonymous(DEFAULT_MIN_CAPACITY)
    }
}

pub(crate) fn validate_name(name: &str) -> QueueResult<()> {
    let invalid = |reason| {
        Err(QueueError::InvalidName {
            name: name.to_owned(),
            reason,
        })
    };

    if !name.starts_with('/') {
        return invalid("must start with '/'");
    }
    if name.len() < 2 {
        return invalid("must have at least one character after '/'");
    }
    if name.len() > MAX_NAME_LEN {
        return invalid("longer than 255 bytes");
    }
    if name[1..].contains('/') {
        return invalid("must not contain '/' after the first character");
    }
    if name.contains('\0') {
        return invalid("must not contain NUL");
    }
    Ok(())
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn named_inherits_defaults() {
        let config = QueueConfig::named("/audio", 1000);
        assert_eq!(config.name.as_deref(), Some("/audio"));
        assert_eq!(config.min_capacity, 1000);
        assert_eq!(config.permissions, DEFAULT_PERMISSIONS);
        assert!(config.replace_stale);
        assert!(config.unlink_on_close);
        assert_eq!(config.label(), "/audio");
    }

    #[test]
    fn builder_setters_apply() {
        let config = QueueConfig::named("/x", 1)
            .with_permissions(0o644)
            .with_replace_stale(false)
            .with_unlink_on_close(false);
        assert_eq!(config.permissions, 0o644);
        assert!(!config.replace_stale);
        assert!(!config.unlink_on_close);
    }

    #[test]
    fn anonymous_label() {
        assert_eq!(QueueConfig::default().label(), "<anonymous>");
        assert!(QueueConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_malformed_names() {
        for name in ["", "/", "queue", "/a/b", "/nul\0"] {
            let err = validate_name(name).expect_err(name);
            assert!(matches!(err, QueueError::InvalidName { .. }), "{name:?}");
        }
        let long = format!("/{}", "q".repeat(MAX_NAME_LEN));
        assert!(validate_name(&long).is_err());
        assert!(validate_name("/mirror-queue.0").is_ok());
    }
}
