//! Typed configuration for the source and sink engines.
//!
//! Every optional setting has a serde default so a minimal YAML section only
//! needs `url` and `topics`.

use std::path::PathBuf;
use std::time::Duration;

use couchstream_types::{Cursor, SourceIdentity};
use serde::Deserialize;

use crate::schema::ValueMode;

/// Documents per change-feed fetch and per bulk write unless overridden.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Upper bound on how long a long-poll fetch may be held open by the store.
pub const DEFAULT_HEARTBEAT_MS: u64 = 5000;

/// Delay between checks of the running flag while stopping.
pub const DEFAULT_SHUTDOWN_POLL_MS: u64 = 10;

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_heartbeat_ms() -> u64 {
    DEFAULT_HEARTBEAT_MS
}

fn default_shutdown_poll_ms() -> u64 {
    DEFAULT_SHUTDOWN_POLL_MS
}

fn default_state_path() -> PathBuf {
    PathBuf::from("couchstream-state.db")
}

/// Database URL and credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Full database URL, e.g. `https://account.cloudant.com/animals`.
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Change-feed source settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    /// Every change is emitted once per topic.
    pub topics: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub omit_design_docs: bool,
    /// Emit typed struct values instead of raw JSON text.
    #[serde(default)]
    pub value_schema_struct: bool,
    /// Lift nested objects into top-level struct fields. Ignored unless
    /// `value_schema_struct` is set.
    #[serde(default)]
    pub value_schema_struct_flatten: bool,
    /// Explicit starting position; overrides any committed offset.
    #[serde(default)]
    pub last_change_seq: Option<String>,
    #[serde(default)]
    pub task_index: u32,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_ms: u64,
    #[serde(default = "default_shutdown_poll_ms")]
    pub shutdown_poll_ms: u64,
}

impl SourceConfig {
    /// Minimal config with every option at its default.
    #[must_use]
    pub fn new(url: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            connection: ConnectionConfig {
                url: url.into(),
                username: String::new(),
                password: String::new(),
            },
            topics,
            batch_size: DEFAULT_BATCH_SIZE,
            omit_design_docs: false,
            value_schema_struct: false,
            value_schema_struct_flatten: false,
            last_change_seq: None,
            task_index: 0,
            heartbeat_ms: DEFAULT_HEARTBEAT_MS,
            shutdown_poll_ms: DEFAULT_SHUTDOWN_POLL_MS,
        }
    }

    #[must_use]
    pub fn source_identity(&self) -> SourceIdentity {
        SourceIdentity::new(self.connection.url.clone())
    }

    #[must_use]
    pub fn explicit_cursor(&self) -> Option<Cursor> {
        self.last_change_seq.as_deref().map(Cursor::from)
    }

    #[must_use]
    pub fn value_mode(&self) -> ValueMode {
        if self.value_schema_struct {
            ValueMode::Struct {
                flatten: self.value_schema_struct_flatten,
            }
        } else {
            ValueMode::Raw
        }
    }

    #[must_use]
    pub fn heartbeat(&self) -> Duration {
        Duration::from_millis(self.heartbeat_ms)
    }

    #[must_use]
    pub fn shutdown_poll_delay(&self) -> Duration {
        Duration::from_millis(self.shutdown_poll_ms)
    }
}

/// Bulk-write sink settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(flatten)]
    pub connection: ConnectionConfig,
    pub topics: Vec<String>,
    /// Pending documents that trigger a bulk write.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Keep original document ids (mirror an existing database).
    #[serde(default)]
    pub replication: bool,
    #[serde(default)]
    pub task_index: u32,
}

impl SinkConfig {
    #[must_use]
    pub fn new(url: impl Into<String>, topics: Vec<String>) -> Self {
        Self {
            connection: ConnectionConfig {
                url: url.into(),
                username: String::new(),
                password: String::new(),
            },
            topics,
            batch_size: DEFAULT_BATCH_SIZE,
            replication: false,
            task_index: 0,
        }
    }
}

/// Top-level YAML document read by the command-line host.
#[derive(Debug, Clone, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub sink: Option<SinkConfig>,
}
