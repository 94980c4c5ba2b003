//! Error types.

use thiserror::Error;

/// Result alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Errors returned by resolver operations.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Filesystem I/O failed (typically `PermissionDenied` on `/etc/hosts`).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A name that cannot be written on a hosts line.
    #[error("invalid host name: {0:?}")]
    InvalidName(String),

    /// The hosts table rejected the change; nothing was persisted.
    #[error("failed to update hosts table for {id}")]
    Write {
        /// Identifier of the binding being changed.
        id: String,
        /// Underlying table error.
        #[source]
        source: Box<ResolverError>,
    },

    /// The change was applied to the table but could not be persisted.
    #[error("failed to flush hosts table for {id}")]
    Flush {
        /// Identifier of the binding being changed.
        id: String,
        /// Underlying table error.
        #[source]
        source: Box<ResolverError>,
    },
}

impl ResolverError {
    pub(crate) fn write(id: &str, source: Self) -> Self {
        Self::Write {
            id: id.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn flush(id: &str, source: Self) -> Self {
        Self::Flush {
            id: id.to_string(),
            source: Box::new(source),
        }
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Io(e) => e.kind() == std::io::ErrorKind::PermissionDenied,
            Self::Write { source, .. } | Self::Flush { source, .. } => {
                source.is_permission_denied()
            }
            Self::InvalidName(_) => false,
        }
    }

    /// Returns `true` if the table accepted the change but failed to persist it.
    #[must_use]
    pub const fn is_flush(&self) -> bool {
        matches!(self, Self::Flush { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn permission_denied_is_seen_through_wrappers() {
        let inner = ResolverError::Io(io::Error::from(io::ErrorKind::PermissionDenied));
        let err = ResolverError::flush("web1", inner);
        assert!(err.is_permission_denied());
        assert!(err.is_flush());
        assert!(err.source().is_some());
    }

    #[test]
    fn write_is_not_flush() {
        let err = ResolverError::write("web1", ResolverError::InvalidName("a b".into()));
        assert!(!err.is_flush());
        assert!(!err.is_permission_denied());
        assert_eq!(err.to_string(), "failed to update hosts table for web1");
    }
}
