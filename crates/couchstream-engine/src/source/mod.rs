//! Change-feed source engine.
//!
//! [`ChangeFeedPoller`] turns the store's `_changes` log into batches of
//! [`EmittedRecord`]s. Every record carries the source URL and the cursor the
//! store reported for its batch; a host that persists that pair and hands it
//! back through an [`OffsetStore`] resumes without gaps or re-emission.

mod offset;
mod stop;

use std::sync::Arc;

use couchstream_state::OffsetStore;
use couchstream_types::{ChangeEvent, ConnectorError, Cursor, EmittedRecord, SourceIdentity};

use crate::client::{ChangesFeed, ChangesRequest, ChangesResponse};
use crate::config::validator::validate_source;
use crate::config::SourceConfig;
use crate::schema::{materialize, ValueMode};

pub use offset::resolve_initial_cursor;
pub use stop::StopHandle;
use stop::{RunningGuard, StopState};

/// Resumable reader over a store's change log.
pub struct ChangeFeedPoller<F> {
    config: SourceConfig,
    source: SourceIdentity,
    mode: ValueMode,
    feed: Arc<F>,
    cursor: Cursor,
    stop: Arc<StopState>,
}

impl<F: ChangesFeed> ChangeFeedPoller<F> {
    /// Validate `config` and position the poller at its initial cursor.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for invalid configuration, or an `Internal`
    /// error when `offsets` cannot be read.
    pub fn start(
        config: SourceConfig,
        feed: Arc<F>,
        offsets: Option<&dyn OffsetStore>,
    ) -> Result<Self, ConnectorError> {
        validate_source(&config)?;
        let cursor = resolve_initial_cursor(&config, offsets)?;
        let source = config.source_identity();

        tracing::info!(
            url = %source,
            cursor = %cursor,
            topics = ?config.topics,
            batch_size = config.batch_size,
            "Change feed poller started"
        );

        Ok(Self {
            mode: config.value_mode(),
            config,
            source,
            feed,
            cursor,
            stop: Arc::new(StopState::default()),
        })
    }

    /// Run one fetch cycle.
    ///
    /// Returns `Ok(None)` once stop has been requested, either before the
    /// cycle began or while its fetch was in flight. A cycle that finds no
    /// changes returns an empty batch; the caller polls again.
    ///
    /// # Errors
    ///
    /// Fetch failures are returned unchanged. The cursor is not advanced.
    pub async fn poll(&mut self) -> Result<Option<Vec<EmittedRecord>>, ConnectorError> {
        let stop = Arc::clone(&self.stop);
        if stop.is_requested() {
            return Ok(None);
        }
        let _running = RunningGuard::enter(&stop);
        // A stop requested between the check above and entering the guard
        // would otherwise go unnoticed until the long poll returns.
        if stop.is_requested() {
            return Ok(None);
        }

        let response = match self.fetch_cycle(&stop).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                tracing::debug!(url = %self.source, "Stop requested during catch-up");
                return Ok(None);
            }
            Err(e) if e.is_cancelled() && stop.is_requested() => {
                tracing::debug!(url = %self.source, "Fetch cancelled by stop request");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.cursor = response.last_seq;
        let records = self.emit(&response.results);
        tracing::info!(
            url = %self.source,
            changes = response.results.len(),
            records = records.len(),
            cursor = %self.cursor,
            "Returning records with last offset"
        );
        Ok(Some(records))
    }

    /// Catch-up fetch, then a long poll from the same cursor when the log has
    /// nothing new. `None` when the catch-up came back empty after a stop
    /// request.
    async fn fetch_cycle(
        &self,
        stop: &StopState,
    ) -> Result<Option<ChangesResponse>, ConnectorError> {
        tracing::debug!(url = %self.source, cursor = %self.cursor, "Fetching changes");
        let response = self
            .feed
            .fetch_changes(&ChangesRequest::catch_up(
                self.cursor.clone(),
                self.config.batch_size,
            ))
            .await?;
        if !response.results.is_empty() {
            return Ok(Some(response));
        }
        if stop.is_requested() {
            return Ok(None);
        }

        tracing::debug!(
            url = %self.source,
            cursor = %self.cursor,
            heartbeat_ms = self.config.heartbeat_ms,
            "Caught up, waiting for changes"
        );
        self.feed
            .fetch_changes(&ChangesRequest::long_poll(
                self.cursor.clone(),
                self.config.batch_size,
                self.config.heartbeat(),
            ))
            .await
            .map(Some)
    }

    fn emit(&self, changes: &[ChangeEvent]) -> Vec<EmittedRecord> {
        let mut records = Vec::with_capacity(changes.len() * self.config.topics.len());
        for change in changes {
            if self.config.omit_design_docs && change.is_design_document() {
                tracing::debug!(id = change.id, "Skipping design document");
                continue;
            }
            let value = materialize(&change.doc, self.mode);
            for topic in &self.config.topics {
                records.push(EmittedRecord {
                    source: self.source.clone(),
                    position: self.cursor.clone(),
                    topic: topic.clone(),
                    key: change.id.clone(),
                    value: value.clone(),
                });
            }
        }
        records
    }

    /// Position the next fetch starts from.
    #[must_use]
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    #[must_use]
    pub fn source(&self) -> &SourceIdentity {
        &self.source
    }

    #[must_use]
    pub fn stop_handle(&self) -> StopHandle<F> {
        StopHandle::new(
            Arc::clone(&self.stop),
            Arc::clone(&self.feed),
            self.config.shutdown_poll_delay(),
        )
    }
}
