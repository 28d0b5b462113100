//! Durable change-feed offset storage.
//!
//! Provides the [`OffsetStore`] trait hosts use to persist the position
//! metadata of emitted records, and a [`SqliteOffsetStore`] implementation.

#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod sqlite;

pub use backend::OffsetStore;
pub use error::{OffsetOp, StateError};
pub use sqlite::SqliteOffsetStore;
