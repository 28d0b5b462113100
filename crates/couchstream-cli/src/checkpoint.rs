//! Offset commits for the source command.

use anyhow::{Context, Result};
use couchstream_state::OffsetStore;
use couchstream_types::state::OffsetState;
use couchstream_types::{Cursor, SourceIdentity};

/// Tracks the last committed cursor of one source and writes a new offset
/// only when the poller has moved past it.
///
/// A poll batch whose changes were all filtered out still advances the
/// cursor, so commits follow the poller rather than the emitted records.
pub(crate) struct Checkpoint<'a> {
    store: &'a dyn OffsetStore,
    committed: Cursor,
}

impl<'a> Checkpoint<'a> {
    /// `committed` is the cursor the poller started from.
    pub(crate) fn new(store: &'a dyn OffsetStore, committed: Cursor) -> Self {
        Self { store, committed }
    }

    /// Persist `cursor` as the committed offset of `source`. Called after each
    /// poll batch has been written out. Returns whether an offset was written.
    pub(crate) fn advance(&mut self, source: &SourceIdentity, cursor: &Cursor) -> Result<bool> {
        if *cursor == self.committed {
            return Ok(false);
        }
        let offset = OffsetState {
            source: source.clone(),
            last_change_seq: cursor.clone(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store
            .put_offset(&offset)
            .with_context(|| format!("Failed to commit offset for {source}"))?;
        tracing::debug!(url = %source, cursor = %cursor, "Offset committed");
        self.committed = cursor.clone();
        Ok(true)
    }
}
