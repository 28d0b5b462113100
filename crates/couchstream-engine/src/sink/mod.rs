//! Batching bulk-write sink engine.
//!
//! [`BatchSink`] prepares each inbound record as a document, buffers it, and
//! writes the buffer through [`BulkWrite`] whenever it reaches `batch_size`,
//! on an explicit [`flush`](BatchSink::flush), and at [`stop`](BatchSink::stop).
//! Every sink owns its buffer behind one async mutex, so threshold flushes and
//! host-driven flushes never interleave.

mod batch;

use std::collections::HashMap;

use couchstream_types::{ConnectorError, SinkRecord, TopicPartition};
use tokio::sync::Mutex;

use crate::client::BulkWrite;
use crate::config::validator::validate_sink;
use crate::config::SinkConfig;

pub use batch::{prepare_document, synthesize_id, PendingBatch};

/// Result of one [`BatchSink::put`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PutSummary {
    /// Records buffered (and possibly already written).
    pub accepted: usize,
    /// Malformed records skipped.
    pub skipped: usize,
    /// Threshold flushes triggered by this call.
    pub flushes: usize,
}

/// Result of one flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was buffered; no write was attempted.
    Empty,
    /// The bulk write succeeded for this many documents.
    Committed(usize),
    /// The bulk write failed and this many documents were discarded.
    Dropped(usize),
}

/// Running totals since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub documents_committed: u64,
    pub documents_dropped: u64,
    pub records_skipped: u64,
}

#[derive(Debug)]
struct SinkState {
    batch: PendingBatch,
    stats: SinkStats,
}

/// Sink that writes log records to the store in bulk.
pub struct BatchSink<W> {
    config: SinkConfig,
    assignment: TopicPartition,
    writer: W,
    state: Mutex<SinkState>,
}

impl<W: BulkWrite> BatchSink<W> {
    /// Validate `config` and create an empty sink.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error for invalid configuration.
    pub fn start(config: SinkConfig, writer: W) -> Result<Self, ConnectorError> {
        validate_sink(&config)?;
        let index = usize::try_from(config.task_index).ok();
        let topic = index
            .and_then(|i| config.topics.get(i))
            .ok_or_else(|| {
                ConnectorError::config(
                    "INVALID_CONFIG",
                    format!("task_index {} has no topic", config.task_index),
                )
            })?
            .clone();
        let partition = i32::try_from(config.task_index).map_err(|_| {
            ConnectorError::config(
                "INVALID_CONFIG",
                format!("task_index {} is out of range", config.task_index),
            )
        })?;
        let assignment = TopicPartition::new(topic, partition);

        tracing::info!(
            url = config.connection.url,
            assignment = %assignment,
            batch_size = config.batch_size,
            replication = config.replication,
            "Bulk sink started"
        );

        Ok(Self {
            state: Mutex::new(SinkState {
                batch: PendingBatch::new(config.batch_size),
                stats: SinkStats::default(),
            }),
            assignment,
            config,
            writer,
        })
    }

    /// Prepare and buffer `records` in order, writing the buffer each time it
    /// reaches `batch_size`. Malformed records are logged and skipped.
    pub async fn put(&self, records: &[SinkRecord]) -> PutSummary {
        let mut state = self.state.lock().await;
        let mut summary = PutSummary::default();

        for record in records {
            match prepare_document(record, self.config.replication) {
                Ok(doc) => {
                    state.batch.push(doc);
                    summary.accepted += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        topic = record.topic,
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        "Skipping malformed record"
                    );
                    state.stats.records_skipped += 1;
                    summary.skipped += 1;
                    continue;
                }
            }
            if state.batch.is_full() {
                self.flush_locked(&mut state).await;
                summary.flushes += 1;
            }
        }
        summary
    }

    /// Write whatever is buffered.
    ///
    /// The host's committed offsets are accepted for interface parity and not
    /// consulted. The buffer is empty afterwards whatever the outcome.
    pub async fn flush(&self, offsets: &HashMap<TopicPartition, i64>) -> FlushOutcome {
        let mut state = self.state.lock().await;
        tracing::debug!(
            partitions = offsets.len(),
            pending = state.batch.len(),
            "Flush requested"
        );
        self.flush_locked(&mut state).await
    }

    async fn flush_locked(&self, state: &mut SinkState) -> FlushOutcome {
        if state.batch.is_empty() {
            return FlushOutcome::Empty;
        }
        let docs = state.batch.take();
        let count = docs.len();

        match self.writer.bulk_write(&docs).await {
            Ok(results) => {
                let rejected = results.iter().filter(|r| !r.is_ok()).count();
                if rejected > 0 {
                    tracing::warn!(
                        url = self.config.connection.url,
                        documents = count,
                        rejected,
                        "Store rejected documents in bulk write"
                    );
                }
                state.stats.documents_committed += count as u64;
                tracing::info!(
                    url = self.config.connection.url,
                    documents = count,
                    "Committed bulk write"
                );
                FlushOutcome::Committed(count)
            }
            Err(e) => {
                state.stats.documents_dropped += count as u64;
                tracing::error!(
                    url = self.config.connection.url,
                    documents = count,
                    error = %e,
                    "Bulk write failed, dropping batch"
                );
                FlushOutcome::Dropped(count)
            }
        }
    }

    /// Write the final partial batch.
    pub async fn stop(&self) -> FlushOutcome {
        let mut state = self.state.lock().await;
        let outcome = self.flush_locked(&mut state).await;
        tracing::info!(
            assignment = %self.assignment,
            committed = state.stats.documents_committed,
            dropped = state.stats.documents_dropped,
            skipped = state.stats.records_skipped,
            "Bulk sink stopped"
        );
        outcome
    }

    /// The log partition this sink instance consumes.
    #[must_use]
    pub fn assignment(&self) -> &TopicPartition {
        &self.assignment
    }

    pub async fn pending(&self) -> usize {
        self.state.lock().await.batch.len()
    }

    pub async fn stats(&self) -> SinkStats {
        self.state.lock().await.stats
    }
}
