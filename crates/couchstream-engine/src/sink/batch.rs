//! Pending document buffer and per-record document preparation.

use std::borrow::Cow;

use couchstream_types::record::{DOC_ID_FIELD, DOC_REV_FIELD, VALUE_SCHEMA_FIELD};
use couchstream_types::{ConnectorError, Document, SinkRecord};
use serde_json::Value;

/// Ordered buffer of documents awaiting a bulk write.
#[derive(Debug)]
pub struct PendingBatch {
    docs: Vec<Document>,
    capacity: usize,
}

impl PendingBatch {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            docs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, doc: Document) {
        self.docs.push(doc);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Whether the buffer has reached its flush threshold.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.docs.len() >= self.capacity
    }

    /// Remove and return every buffered document, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<Document> {
        std::mem::replace(&mut self.docs, Vec::with_capacity(self.capacity))
    }
}

/// Id of a document written from log position `(topic, partition, offset)`.
///
/// The topic is percent-escaped (`%` as `%25`, `_` as `%5F`) so the first `_`
/// always ends it. Partition and offset are integers, which leaves everything
/// after the third `_` as the original id.
#[must_use]
pub fn synthesize_id(topic: &str, partition: i32, offset: i64, original_id: &str) -> String {
    let topic = escape_topic(topic);
    format!("{topic}_{partition}_{offset}_{original_id}")
}

fn escape_topic(topic: &str) -> Cow<'_, str> {
    if !topic.contains(['%', '_']) {
        return Cow::Borrowed(topic);
    }
    Cow::Owned(topic.replace('%', "%25").replace('_', "%5F"))
}

/// Turn a sink record into the document to write.
///
/// `_rev` is always removed. Outside replication mode a document that has an
/// `_id` gets a synthesized id and keeps its origin value schema under
/// `kc_schema`. In replication mode the original `_id` is kept.
///
/// # Errors
///
/// Returns a `Data` error when the record value is not a JSON object.
pub fn prepare_document(record: &SinkRecord, replication: bool) -> Result<Document, ConnectorError> {
    let mut doc = record.document()?;
    doc.remove(DOC_REV_FIELD);

    if replication {
        return Ok(doc);
    }

    let original_id = match doc.get(DOC_ID_FIELD) {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => return Ok(doc),
    };
    let schema = match &record.value_schema {
        Some(schema) => serde_json::to_value(schema).map_err(|e| {
            ConnectorError::internal(
                "SCHEMA_ENCODE_FAILED",
                format!("{}@{}: {e}", record.location(), record.offset),
            )
        })?,
        None => Value::Null,
    };
    doc.insert(VALUE_SCHEMA_FIELD.to_string(), schema);
    doc.insert(
        DOC_ID_FIELD.to_string(),
        Value::String(synthesize_id(
            &record.topic,
            record.partition,
            record.offset,
            &original_id,
        )),
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use couchstream_types::{ErrorCategory, Field, ValueSchema};
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    fn record(value: Value, schema: Option<ValueSchema>) -> SinkRecord {
        SinkRecord {
            topic: "animals".into(),
            partition: 0,
            offset: 17,
            value_schema: schema,
            value,
        }
    }

    #[test]
    fn test_batch_fills_to_capacity_and_drains() {
        let mut batch = PendingBatch::new(2);
        assert!(batch.is_empty());
        batch.push(Document::new());
        assert!(!batch.is_full());
        batch.push(Document::new());
        assert!(batch.is_full());

        let docs = batch.take();
        assert_eq!(docs.len(), 2);
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn test_synthesized_id_format() {
        assert_eq!(synthesize_id("animals", 3, 42, "zebra"), "animals_3_42_zebra");
    }

    #[test]
    fn test_prepare_replaces_id_and_attaches_schema() {
        let schema = ValueSchema::Struct {
            fields: vec![Field::required("_id", ValueSchema::String)],
        };
        let doc = prepare_document(
            &record(json!({"_id": "zebra", "_rev": "3-abc", "legs": 4}), Some(schema.clone())),
            false,
        )
        .unwrap();

        assert_eq!(doc["_id"], "animals_0_17_zebra");
        assert!(!doc.contains_key("_rev"));
        assert_eq!(doc["legs"], 4);
        assert_eq!(doc["kc_schema"], serde_json::to_value(&schema).unwrap());
    }

    #[test]
    fn test_prepare_without_schema_stores_null() {
        let doc = prepare_document(&record(json!({"_id": "zebra"}), None), false).unwrap();
        assert_eq!(doc["kc_schema"], Value::Null);
    }

    #[test]
    fn test_prepare_replication_keeps_original_id() {
        let doc = prepare_document(
            &record(json!({"_id": "zebra", "_rev": "3-abc"}), Some(ValueSchema::String)),
            true,
        )
        .unwrap();
        assert_eq!(doc["_id"], "zebra");
        assert!(!doc.contains_key("_rev"));
        assert!(!doc.contains_key("kc_schema"));
    }

    #[test]
    fn test_prepare_without_id_leaves_document_for_store_to_name() {
        let doc = prepare_document(&record(json!({"_rev": "1-a", "legs": 2}), None), false).unwrap();
        assert!(!doc.contains_key("_id"));
        assert!(!doc.contains_key("kc_schema"));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_prepare_parses_json_text_values() {
        let doc = prepare_document(
            &record(Value::String(r#"{"_id":"zebra","_rev":"1-a"}"#.into()), None),
            false,
        )
        .unwrap();
        assert_eq!(doc["_id"], "animals_0_17_zebra");
    }

    #[test]
    fn test_underscored_topic_cannot_mimic_another_position() {
        assert_eq!(synthesize_id("t", 0, 1, "2_3_x"), "t_0_1_2_3_x");
        assert_eq!(synthesize_id("t_0_1", 2, 3, "x"), "t%5F0%5F1_2_3_x");
        assert_eq!(synthesize_id("100%_raw", 0, 4, "x"), "100%25%5Fraw_0_4_x");
    }

    #[rstest]
    #[case::array(json!([1, 2]))]
    #[case::number(json!(7))]
    #[case::bad_text(Value::String("{not json".into()))]
    #[case::text_array(Value::String("[]".into()))]
    fn test_prepare_rejects_non_objects(#[case] value: Value) {
        let err = prepare_document(&record(value, None), false).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Data);
        assert_eq!(err.code, "MALFORMED_DOCUMENT");
    }

    proptest! {
        #[test]
        fn distinct_positions_never_share_an_id(
            a in ("[a-z0-9_%]{1,6}", 0i32..4, 0i64..1000, "[a-z0-9_%]{0,6}"),
            b in ("[a-z0-9_%]{1,6}", 0i32..4, 0i64..1000, "[a-z0-9_%]{0,6}"),
        ) {
            prop_assume!((&a.0, a.1, a.2) != (&b.0, b.1, b.2));
            prop_assert_ne!(
                synthesize_id(&a.0, a.1, a.2, &a.3),
                synthesize_id(&b.0, b.1, b.2, &b.3)
            );
        }
    }
}
