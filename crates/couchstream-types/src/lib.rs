//! Shared couchstream record, cursor, and error model types.
//!
//! This crate performs no I/O so it can sit underneath both the engine and
//! any host embedding it.

pub mod cursor;
pub mod error;
pub mod record;
pub mod schema;
pub mod state;

pub use cursor::{Cursor, SourceIdentity};
pub use error::{ConnectorError, ErrorCategory};
pub use record::{ChangeEvent, Document, EmittedRecord, SinkRecord, TopicPartition};
pub use schema::{Field, SchemaValue, ValueSchema};
