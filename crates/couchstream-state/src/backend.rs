//! Offset store trait definition.
//!
//! [`OffsetStore`] is the host's durable offset storage. The source engine
//! only reads it, once at startup; hosts write it after they have durably
//! accepted a batch of emitted records.

use couchstream_types::state::OffsetState;
use couchstream_types::SourceIdentity;

use crate::error;

/// Storage contract for committed change-feed positions.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn OffsetStore>`.
pub trait OffsetStore: Send + Sync {
    /// Read the last committed offset for `source`.
    ///
    /// Returns `Ok(None)` when nothing has been committed yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn get_offset(&self, source: &SourceIdentity) -> error::Result<Option<OffsetState>>;

    /// Upsert the committed offset for `offset.source`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`](crate::error::StateError) on storage failure.
    fn put_offset(&self, offset: &OffsetState) -> error::Result<()>;
}
