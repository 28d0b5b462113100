//! `SQLite`-backed implementation of [`OffsetStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDateTime;
use couchstream_types::state::OffsetState;
use couchstream_types::{Cursor, SourceIdentity};
use rusqlite::{Connection, OptionalExtension};

use crate::backend::OffsetStore;
use crate::error::{self, OffsetOp, StateError};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for the offsets table.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS source_offsets (
    source TEXT PRIMARY KEY NOT NULL,
    last_change_seq TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// `SQLite`-backed offset storage.
///
/// Create with [`SqliteOffsetStore::open`] for file-backed persistence
/// or [`SqliteOffsetStore::in_memory`] for tests.
pub struct SqliteOffsetStore {
    conn: Mutex<Connection>,
}

impl SqliteOffsetStore {
    /// Open or create a `SQLite` offset database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::CreateDir`] if the directory can't be created,
    /// or [`StateError::Open`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StateError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let open_err = |source| StateError::Open {
            path: Some(path.to_path_buf()),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.execute_batch(CREATE_TABLES).map_err(open_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Open`] if the in-memory database can't
    /// be initialized.
    pub fn in_memory() -> error::Result<Self> {
        let open_err = |source| StateError::Open { path: None, source };
        let conn = Connection::open_in_memory().map_err(open_err)?;
        conn.execute_batch(CREATE_TABLES).map_err(open_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Convert a `SQLite` datetime string to ISO-8601.
    fn sqlite_to_iso8601(raw: &str) -> String {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT).map_or_else(
            |_| raw.to_string(),
            |ndt| format!("{}Z", ndt.format("%Y-%m-%dT%H:%M:%S")),
        )
    }

    /// Convert an ISO-8601 string to `SQLite` datetime format.
    fn iso8601_to_sqlite(iso: &str) -> String {
        chrono::DateTime::parse_from_rfc3339(iso).map_or_else(
            |_| iso.to_string(),
            |dt| dt.naive_utc().format(SQLITE_DATETIME_FMT).to_string(),
        )
    }
}

impl OffsetStore for SqliteOffsetStore {
    fn get_offset(&self, source: &SourceIdentity) -> error::Result<Option<OffsetState>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT last_change_seq, updated_at FROM source_offsets WHERE source = ?1",
                [source.as_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()
            .map_err(|e| StateError::Offset {
                op: OffsetOp::Read,
                source_url: source.as_str().to_string(),
                source: e,
            })?;

        Ok(row.map(|(seq, updated_at)| OffsetState {
            source: source.clone(),
            last_change_seq: Cursor::new(seq),
            updated_at: Self::sqlite_to_iso8601(&updated_at),
        }))
    }

    fn put_offset(&self, offset: &OffsetState) -> error::Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO source_offsets (source, last_change_seq, updated_at) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(source) DO UPDATE SET last_change_seq = ?2, updated_at = ?3",
            rusqlite::params![
                offset.source.as_str(),
                offset.last_change_seq.as_str(),
                Self::iso8601_to_sqlite(&offset.updated_at),
            ],
        )
        .map_err(|e| StateError::Offset {
            op: OffsetOp::Write,
            source_url: offset.source.as_str().to_string(),
            source: e,
        })?;
        Ok(())
    }
}
