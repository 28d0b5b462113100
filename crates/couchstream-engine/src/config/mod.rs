//! Engine configuration: typed option structs, YAML loading, validation.

pub mod parser;
pub mod types;
pub mod validator;

pub use types::{ConnectionConfig, FileConfig, SinkConfig, SourceConfig, DEFAULT_BATCH_SIZE};
