//! Materialization of change-feed documents into record values.
//!
//! Raw mode ships the document as JSON text under a `String` schema. Struct
//! mode infers a schema from the document itself, optionally flattening
//! nested objects into dotted top-level fields.

use couchstream_types::{Field, SchemaValue, ValueSchema};
use serde_json::{Map, Value};

/// Separator between parent and child names of flattened fields.
pub const FLATTEN_SEPARATOR: char = '.';

/// How emitted record values are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueMode {
    /// Document serialized as JSON text.
    Raw,
    /// Document as a typed struct.
    Struct { flatten: bool },
}

/// Build the `{schema, value}` pair for one document.
#[must_use]
pub fn materialize(doc: &Value, mode: ValueMode) -> SchemaValue {
    match mode {
        ValueMode::Raw => SchemaValue {
            schema: ValueSchema::String,
            value: Value::String(doc.to_string()),
        },
        ValueMode::Struct { flatten } => {
            let value = match doc {
                Value::Object(map) if flatten => Value::Object(flatten_object(map)),
                other => other.clone(),
            };
            SchemaValue {
                schema: infer_schema(&value),
                value,
            }
        }
    }
}

/// Infer the schema of a JSON value.
///
/// Integral numbers become `Int64`, other numbers `Float64`. Arrays take the
/// schema of their first element and default to `String` when empty. A null
/// outside any struct is treated as a string.
#[must_use]
pub fn infer_schema(value: &Value) -> ValueSchema {
    match value {
        Value::Null | Value::String(_) => ValueSchema::String,
        Value::Bool(_) => ValueSchema::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => ValueSchema::Int64,
        Value::Number(_) => ValueSchema::Float64,
        Value::Array(items) => ValueSchema::Array {
            items: Box::new(items.first().map_or(ValueSchema::String, infer_schema)),
        },
        Value::Object(map) => ValueSchema::Struct {
            fields: map
                .iter()
                .map(|(name, v)| Field {
                    name: name.clone(),
                    schema: infer_schema(v),
                    optional: v.is_null(),
                })
                .collect(),
        },
    }
}

fn flatten_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(None, map, &mut out);
    out
}

fn flatten_into(prefix: Option<&str>, map: &Map<String, Value>, out: &mut Map<String, Value>) {
    for (key, value) in map {
        let name = match prefix {
            Some(p) => format!("{p}{FLATTEN_SEPARATOR}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(Some(&name), child, out),
            other => {
                out.insert(name, other.clone());
            }
        }
    }
}
