//! Store client boundary.
//!
//! The engines talk to the document store only through [`ChangesFeed`] and
//! [`BulkWrite`]. [`CouchClient`] implements both over HTTP; tests substitute
//! in-process fakes.

mod couch;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use couchstream_types::{ChangeEvent, ConnectorError, Cursor, Document};
use serde::Deserialize;

pub use couch::CouchClient;

/// One `_changes` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangesRequest {
    pub since: Cursor,
    pub limit: usize,
    pub include_docs: bool,
    /// When set, the store may hold the request open for up to this long
    /// waiting for new changes.
    pub long_poll: Option<Duration>,
}

impl ChangesRequest {
    /// Bounded fetch that returns immediately, used while catching up.
    #[must_use]
    pub fn catch_up(since: Cursor, limit: usize) -> Self {
        Self {
            since,
            limit,
            include_docs: true,
            long_poll: None,
        }
    }

    /// Bounded fetch that waits up to `wait` for new changes.
    #[must_use]
    pub fn long_poll(since: Cursor, limit: usize, wait: Duration) -> Self {
        Self {
            since,
            limit,
            include_docs: true,
            long_poll: Some(wait),
        }
    }
}

/// Result of one `_changes` request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangesResponse {
    pub results: Vec<ChangeEvent>,
    /// Position after the last returned change.
    pub last_seq: Cursor,
}

/// Per-document outcome of a bulk write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BulkResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl BulkResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Read access to the store's change log.
pub trait ChangesFeed: Send + Sync {
    /// Fetch up to `request.limit` changes after `request.since`.
    fn fetch_changes(
        &self,
        request: &ChangesRequest,
    ) -> impl Future<Output = Result<ChangesResponse, ConnectorError>> + Send;

    /// Abort the in-flight fetch, if any. The aborted fetch resolves to a
    /// `Cancelled` error. A no-op when nothing is in flight.
    fn cancel(&self);
}

/// Bulk document writes.
pub trait BulkWrite: Send + Sync {
    /// Write every document in one request.
    fn bulk_write(
        &self,
        docs: &[Document],
    ) -> impl Future<Output = Result<Vec<BulkResult>, ConnectorError>> + Send;
}

impl<T: BulkWrite> BulkWrite for Arc<T> {
    fn bulk_write(
        &self,
        docs: &[Document],
    ) -> impl Future<Output = Result<Vec<BulkResult>, ConnectorError>> + Send {
        (**self).bulk_write(docs)
    }
}
