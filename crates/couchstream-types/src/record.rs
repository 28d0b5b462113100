//! Records flowing between the change feed, the partitioned log and the
//! bulk-write endpoint.

use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, SourceIdentity};
use crate::error::ConnectorError;
use crate::schema::{SchemaValue, ValueSchema};

/// A JSON document as sent to or received from the store.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Document identifier field.
pub const DOC_ID_FIELD: &str = "_id";
/// Store-assigned revision marker.
pub const DOC_REV_FIELD: &str = "_rev";
/// Field under which a synthesized document keeps its origin value schema.
pub const VALUE_SCHEMA_FIELD: &str = "kc_schema";
/// Identifier prefix of design (index/view definition) documents.
pub const DESIGN_DOC_PREFIX: &str = "_design/";

/// One row of a change-feed response.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub id: String,
    /// Per-row sequence token, when the store reports one.
    pub seq: Option<String>,
    /// Full document body (`null` when the feed was fetched without docs).
    pub doc: serde_json::Value,
    pub deleted: bool,
}

impl ChangeEvent {
    #[must_use]
    pub fn is_design_document(&self) -> bool {
        self.id.starts_with(DESIGN_DOC_PREFIX)
    }
}

/// Record produced by the change-feed source for one destination topic.
///
/// `source` and `position` form the position metadata the host persists so a
/// restarted source resumes after `position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmittedRecord {
    pub source: SourceIdentity,
    pub position: Cursor,
    pub topic: String,
    /// Document id.
    pub key: String,
    pub value: SchemaValue,
}

/// (topic, partition) pair of the partitioned log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl std::fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Record delivered from the partitioned log to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_schema: Option<ValueSchema>,
    /// Either a JSON object or a JSON string holding the serialized document.
    pub value: serde_json::Value,
}

impl SinkRecord {
    /// Decode the record value into a document.
    ///
    /// # Errors
    ///
    /// Returns a `Data` error when the value (or the text it carries) is not
    /// a JSON object.
    pub fn document(&self) -> Result<Document, ConnectorError> {
        let value = match &self.value {
            serde_json::Value::String(text) => {
                serde_json::from_str(text).map_err(|e| {
                    ConnectorError::data(
                        "MALFORMED_DOCUMENT",
                        format!("{}@{}: {e}", self.location(), self.offset),
                    )
                })?
            }
            other => other.clone(),
        };
        match value {
            serde_json::Value::Object(doc) => Ok(doc),
            other => Err(ConnectorError::data(
                "MALFORMED_DOCUMENT",
                format!(
                    "{}@{}: expected a JSON object, got {}",
                    self.location(),
                    self.offset,
                    json_kind(&other)
                ),
            )),
        }
    }

    #[must_use]
    pub fn location(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
