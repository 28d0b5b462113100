//! Data-motion engines between a CouchDB-compatible document store and a
//! partitioned log.

pub mod client;
pub mod config;
pub mod schema;
pub mod sink;
pub mod source;

// Re-export public API for convenience
pub use client::{BulkWrite, ChangesFeed, CouchClient};
pub use config::{FileConfig, SinkConfig, SourceConfig};
pub use sink::{BatchSink, FlushOutcome, PutSummary, SinkStats};
pub use source::{ChangeFeedPoller, StopHandle};
