//! Offset store error types.

use std::fmt;
use std::path::PathBuf;

/// Offset store operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetOp {
    /// Loading the committed offset of a source.
    Read,
    /// Upserting the committed offset of a source.
    Write,
}

impl fmt::Display for OffsetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => f.write_str("reading"),
            Self::Write => f.write_str("writing"),
        }
    }
}

/// Errors produced by [`OffsetStore`](crate::OffsetStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The directory holding the offset database could not be created.
    #[error("creating offset directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The offset database could not be opened or its table created.
    /// `path` is `None` for in-memory stores.
    #[error("opening offset database {}: {source}", display_location(path.as_ref()))]
    Open {
        path: Option<PathBuf>,
        #[source]
        source: rusqlite::Error,
    },

    /// A read or write of one source's offset failed.
    #[error("{op} offset for {source_url}: {source}")]
    Offset {
        op: OffsetOp,
        source_url: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Internal mutex was poisoned by a panicked thread.
    #[error("offset store lock poisoned")]
    LockPoisoned,
}

fn display_location(path: Option<&PathBuf>) -> String {
    path.map_or_else(|| ":memory:".to_string(), |p| p.display().to_string())
}

impl StateError {
    /// Source URL whose offset was being accessed, when the failure was
    /// tied to one source.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        match self {
            Self::Offset { source_url, .. } => Some(source_url),
            _ => None,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(1),
            Some("no such table: source_offsets".into()),
        )
    }

    #[test]
    fn offset_error_names_operation_and_source() {
        let err = StateError::Offset {
            op: OffsetOp::Write,
            source_url: "http://localhost:5984/animals".into(),
            source: sqlite_failure(),
        };
        let msg = err.to_string();
        assert!(
            msg.starts_with("writing offset for http://localhost:5984/animals"),
            "got: {msg}"
        );
        assert!(msg.contains("no such table"), "got: {msg}");
        assert_eq!(err.source_url(), Some("http://localhost:5984/animals"));
    }

    #[test]
    fn open_error_names_database_location() {
        let on_disk = StateError::Open {
            path: Some(PathBuf::from("/var/lib/couchstream/offsets.db")),
            source: sqlite_failure(),
        };
        assert!(on_disk
            .to_string()
            .starts_with("opening offset database /var/lib/couchstream/offsets.db"));

        let in_memory = StateError::Open {
            path: None,
            source: sqlite_failure(),
        };
        assert!(in_memory.to_string().contains(":memory:"));
        assert_eq!(in_memory.source_url(), None);
    }

    #[test]
    fn create_dir_error_keeps_io_source() {
        let err = StateError::CreateDir {
            path: PathBuf::from("/readonly/state"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/readonly/state"));
        let inner = std::error::Error::source(&err).unwrap();
        assert_eq!(inner.to_string(), "denied");
    }

    #[test]
    fn lock_poisoned_displays() {
        let err = StateError::LockPoisoned;
        assert_eq!(err.to_string(), "offset store lock poisoned");
    }
}
