//! Initial cursor resolution.

use couchstream_state::OffsetStore;
use couchstream_types::{ConnectorError, Cursor};

use crate::config::SourceConfig;

/// Resolve the cursor the first fetch starts from.
///
/// An explicit `last_change_seq` wins, then the committed offset for this
/// source, then the beginning of the log.
///
/// # Errors
///
/// Returns an `Internal` error when the offset store cannot be read.
pub fn resolve_initial_cursor(
    config: &SourceConfig,
    offsets: Option<&dyn OffsetStore>,
) -> Result<Cursor, ConnectorError> {
    let source = config.source_identity();

    if let Some(cursor) = config.explicit_cursor() {
        tracing::info!(url = %source, cursor = %cursor, "Starting from configured cursor");
        return Ok(cursor);
    }

    let stored = match offsets {
        Some(store) => store.get_offset(&source).map_err(|e| {
            ConnectorError::internal(
                "OFFSET_READ_FAILED",
                format!("reading committed offset for {source}: {e}"),
            )
        })?,
        None => None,
    };

    match stored {
        Some(offset) => {
            tracing::info!(
                url = %source,
                cursor = %offset.last_change_seq,
                committed_at = offset.updated_at,
                "Resuming from committed offset"
            );
            Ok(offset.last_change_seq)
        }
        None => {
            tracing::info!(url = %source, "No committed offset, starting from the beginning");
            Ok(Cursor::beginning())
        }
    }
}
