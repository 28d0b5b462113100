//! HTTP client for CouchDB-compatible stores (`_changes` and `_bulk_docs`).

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use couchstream_types::{ChangeEvent, ConnectorError, Cursor, Document};
use reqwest::{RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::{BulkResult, BulkWrite, ChangesFeed, ChangesRequest, ChangesResponse};
use crate::config::ConnectionConfig;

/// Extra time granted to a long-poll request beyond the store-side wait.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

/// Client bound to a single database.
pub struct CouchClient {
    db_url: Url,
    credentials: Option<(String, String)>,
    http: reqwest::Client,
    /// Cancellation handle of the fetch currently in flight.
    in_flight: Mutex<Option<CancellationToken>>,
}

impl std::fmt::Debug for CouchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CouchClient")
            .field("db_url", &self.db_url.as_str())
            .field("authenticated", &self.credentials.is_some())
            .finish_non_exhaustive()
    }
}

impl CouchClient {
    /// Build a client for the database named by `connection.url`.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error when the URL cannot address a database.
    pub fn new(connection: &ConnectionConfig) -> Result<Self, ConnectorError> {
        let db_url = Url::parse(&connection.url).map_err(|e| {
            ConnectorError::config("INVALID_URL", format!("url '{}': {e}", connection.url))
        })?;
        if db_url.cannot_be_a_base() {
            return Err(ConnectorError::config(
                "INVALID_URL",
                format!("url '{}' cannot address a database", connection.url),
            ));
        }
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ConnectorError::internal("HTTP_CLIENT_INIT", e.to_string()))?;
        let credentials = (!connection.username.is_empty())
            .then(|| (connection.username.clone(), connection.password.clone()));

        Ok(Self {
            db_url,
            credentials,
            http,
            in_flight: Mutex::new(None),
        })
    }

    fn endpoint(&self, segment: &str) -> Url {
        let mut url = self.db_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        url
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, Some(password)),
            None => builder,
        }
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_changes(
        &self,
        request: &ChangesRequest,
    ) -> Result<ChangesResponse, ConnectorError> {
        let url = self.endpoint("_changes");
        let mut query = vec![
            ("since", request.since.to_string()),
            ("limit", request.limit.to_string()),
            ("include_docs", request.include_docs.to_string()),
        ];
        let mut builder = self.http.get(url.clone());
        if let Some(wait) = request.long_poll {
            query.push(("feed", "longpoll".to_string()));
            query.push(("timeout", wait.as_millis().to_string()));
            builder = builder.timeout(wait + LONG_POLL_GRACE);
        }

        let response = self
            .authorize(builder.query(&query))
            .send()
            .await
            .map_err(|e| transport_error("GET", &url, &e))?;
        let raw: RawChanges = check_status(response).await?.json().await.map_err(|e| {
            ConnectorError::store(
                "INVALID_CHANGES_RESPONSE",
                format!("GET {url}: {e}"),
                false,
            )
        })?;
        Ok(raw.into())
    }
}

impl ChangesFeed for CouchClient {
    async fn fetch_changes(
        &self,
        request: &ChangesRequest,
    ) -> Result<ChangesResponse, ConnectorError> {
        let token = CancellationToken::new();
        *self.lock_in_flight() = Some(token.clone());

        let outcome = tokio::select! {
            () = token.cancelled() => Err(ConnectorError::cancelled(format!(
                "changes request for {} cancelled",
                self.db_url
            ))),
            result = self.request_changes(request) => result,
        };

        self.lock_in_flight().take();
        outcome
    }

    fn cancel(&self) {
        if let Some(token) = self.lock_in_flight().as_ref() {
            token.cancel();
        }
    }
}

#[derive(Serialize)]
struct BulkDocs<'a> {
    docs: &'a [Document],
}

impl BulkWrite for CouchClient {
    async fn bulk_write(&self, docs: &[Document]) -> Result<Vec<BulkResult>, ConnectorError> {
        let url = self.endpoint("_bulk_docs");
        let response = self
            .authorize(self.http.post(url.clone()).json(&BulkDocs { docs }))
            .send()
            .await
            .map_err(|e| transport_error("POST", &url, &e))?;
        check_status(response).await?.json().await.map_err(|e| {
            ConnectorError::store("INVALID_BULK_RESPONSE", format!("POST {url}: {e}"), false)
        })
    }
}

fn transport_error(method: &str, url: &Url, err: &reqwest::Error) -> ConnectorError {
    ConnectorError::transient_network("REQUEST_FAILED", format!("{method} {url}: {err}"))
}

async fn check_status(response: Response) -> Result<Response, ConnectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    let code = format!("HTTP_{}", status.as_u16());
    let message = format!("{url} responded {status}: {}", body.trim());
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        Err(ConnectorError::auth(code, message))
    } else {
        Err(ConnectorError::store(code, message, status.is_server_error()))
    }
}

// `_changes` wire format. Sequence tokens are strings on clustered stores and
// integers on single-node ones; both are kept as opaque text.

#[derive(Deserialize)]
struct RawChanges {
    #[serde(default)]
    results: Vec<RawChange>,
    last_seq: Value,
}

#[derive(Deserialize)]
struct RawChange {
    id: String,
    #[serde(default)]
    seq: Option<Value>,
    #[serde(default)]
    doc: Option<Value>,
    #[serde(default)]
    deleted: bool,
}

fn seq_text(seq: &Value) -> String {
    match seq {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<RawChanges> for ChangesResponse {
    fn from(raw: RawChanges) -> Self {
        Self {
            last_seq: Cursor::new(seq_text(&raw.last_seq)),
            results: raw
                .results
                .into_iter()
                .map(|row| ChangeEvent {
                    id: row.id,
                    seq: row.seq.as_ref().map(seq_text),
                    doc: row.doc.unwrap_or(Value::Null),
                    deleted: row.deleted,
                })
                .collect(),
        }
    }
}
