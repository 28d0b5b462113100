//! In-process store fakes shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use couchstream_engine::client::{BulkResult, ChangesRequest, ChangesResponse};
use couchstream_engine::{BulkWrite, ChangesFeed};
use couchstream_types::{ChangeEvent, ConnectorError, Cursor, Document};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Change log with integer sequence numbers, served like `_changes`.
///
/// With `block_long_poll` a long poll that finds nothing new waits until it
/// is cancelled. Cancelling with no fetch in flight is lost, as with the
/// HTTP client.
#[derive(Default)]
pub struct LogFeed {
    log: Mutex<Vec<(u64, ChangeEvent)>>,
    block_long_poll: bool,
    in_flight: Mutex<Option<CancellationToken>>,
    requests: Mutex<Vec<ChangesRequest>>,
    /// Signalled each time a long poll starts blocking.
    pub blocked: Notify,
    pub cancels: AtomicUsize,
    lost_cancels: AtomicUsize,
}

impl LogFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocking() -> Self {
        Self {
            block_long_poll: true,
            ..Self::default()
        }
    }

    /// Append a document change and return its sequence number.
    pub fn append(&self, id: &str, doc: Value) -> u64 {
        let mut log = self.log.lock().unwrap();
        let seq = log.len() as u64 + 1;
        log.push((
            seq,
            ChangeEvent {
                id: id.to_string(),
                seq: Some(seq.to_string()),
                doc,
                deleted: false,
            },
        ));
        seq
    }

    /// Append `count` documents named `doc1..` with their sequence number.
    pub fn append_many(&self, count: usize) {
        for _ in 0..count {
            let next = self.log.lock().unwrap().len() + 1;
            let id = format!("doc{next}");
            self.append(&id, json!({"_id": id, "n": next}));
        }
    }

    pub fn seq_of(&self, id: &str) -> Option<u64> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .find(|(_, change)| change.id == id)
            .map(|(seq, _)| *seq)
    }

    /// Ignore the next `count` cancel calls, as if they arrived before the
    /// fetch they were meant for had started.
    pub fn lose_next_cancels(&self, count: usize) {
        self.lost_cancels.store(count, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ChangesRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn page(&self, request: &ChangesRequest) -> ChangesResponse {
        let since: u64 = request.since.as_str().parse().unwrap_or(0);
        let log = self.log.lock().unwrap();
        let results: Vec<(u64, ChangeEvent)> = log
            .iter()
            .filter(|(seq, _)| *seq > since)
            .take(request.limit)
            .cloned()
            .collect();
        let last = results.last().map_or(since, |(seq, _)| *seq);
        ChangesResponse {
            results: results.into_iter().map(|(_, change)| change).collect(),
            last_seq: Cursor::new(last.to_string()),
        }
    }
}

impl ChangesFeed for LogFeed {
    async fn fetch_changes(
        &self,
        request: &ChangesRequest,
    ) -> Result<ChangesResponse, ConnectorError> {
        self.requests.lock().unwrap().push(request.clone());
        let response = self.page(request);
        if !(response.results.is_empty() && request.long_poll.is_some() && self.block_long_poll) {
            return Ok(response);
        }

        let token = CancellationToken::new();
        *self.in_flight.lock().unwrap() = Some(token.clone());
        self.blocked.notify_one();
        token.cancelled().await;
        self.in_flight.lock().unwrap().take();
        Err(ConnectorError::cancelled("long poll cancelled"))
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        let lost = self
            .lost_cancels
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if lost {
            return;
        }
        if let Some(token) = self.in_flight.lock().unwrap().as_ref() {
            token.cancel();
        }
    }
}

/// Bulk writer that stores every document it receives.
#[derive(Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<Vec<Document>>>,
    fail_next: AtomicUsize,
}

impl MemoryStore {
    /// Fail the next `count` bulk writes.
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn batches(&self) -> Vec<Vec<Document>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.batches()
            .iter()
            .flatten()
            .filter_map(|doc| doc.get("_id").and_then(Value::as_str).map(str::to_string))
            .collect()
    }
}

impl BulkWrite for MemoryStore {
    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkResult>, ConnectorError> {
        let failing = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConnectorError::transient_network("REQUEST_FAILED", "connection reset"));
        }
        tokio::task::yield_now().await;
        self.batches.lock().unwrap().push(docs.to_vec());
        Ok(docs
            .iter()
            .map(|doc| BulkResult {
                id: doc.get("_id").and_then(Value::as_str).map(str::to_string),
                rev: Some("1-fake".into()),
                ..BulkResult::default()
            })
            .collect())
    }
}
