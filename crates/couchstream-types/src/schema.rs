//! Value schemas attached to emitted and inbound records.
//!
//! A record value always travels as a `{schema, value}` pair. The engine
//! produces either a plain `String` schema (raw document text) or a `Struct`
//! schema inferred from the document.

use serde::{Deserialize, Serialize};

/// Shape of a record value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueSchema {
    String,
    Boolean,
    Int64,
    Float64,
    Array { items: Box<ValueSchema> },
    Struct { fields: Vec<Field> },
}

impl ValueSchema {
    /// Look up a struct field by name. Returns `None` for non-struct schemas.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        match self {
            Self::Struct { fields } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }
}

/// Named member of a [`ValueSchema::Struct`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub schema: ValueSchema,
    #[serde(default)]
    pub optional: bool,
}

impl Field {
    #[must_use]
    pub fn required(name: impl Into<String>, schema: ValueSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            optional: false,
        }
    }

    #[must_use]
    pub fn optional(name: impl Into<String>, schema: ValueSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            optional: true,
        }
    }
}

/// Materialized record value paired with its schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaValue {
    pub schema: ValueSchema,
    pub value: serde_json::Value,
}
