//! Change-feed position types.
//!
//! A [`Cursor`] marks everything up to a point in the store's change log as
//! observed. Its contents are issued by the store and never interpreted here.

use serde::{Deserialize, Serialize};

/// Sequence token the store reports for the start of its change log.
pub const BEGINNING_SEQ: &str = "0";

/// Opaque, store-issued change-feed position.
///
/// Serializes as a bare JSON string: `"12-g1AAAA..."`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a sequence token returned by the store.
    #[must_use]
    pub fn new(seq: impl Into<String>) -> Self {
        Self(seq.into())
    }

    /// Position before the first change in the log.
    #[must_use]
    pub fn beginning() -> Self {
        Self(BEGINNING_SEQ.to_string())
    }

    /// Whether this cursor still points at the start of the log.
    #[must_use]
    pub fn is_beginning(&self) -> bool {
        self.0 == BEGINNING_SEQ
    }

    /// Borrow the raw sequence token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::beginning()
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cursor {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Cursor {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of the change feed a cursor belongs to (the database URL).
///
/// Used as the key under which hosts persist the last committed cursor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceIdentity(String);

impl SourceIdentity {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SourceIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cursor_is_beginning_of_log() {
        let cursor = Cursor::default();
        assert_eq!(cursor.as_str(), "0");
        assert!(cursor.is_beginning());
        assert!(!Cursor::new("3-abc").is_beginning());
    }

    #[test]
    fn cursor_serializes_as_bare_string() {
        let json = serde_json::to_string(&Cursor::new("42-g1AAAA")).unwrap();
        assert_eq!(json, "\"42-g1AAAA\"");
        let back: Cursor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Cursor::new("42-g1AAAA"));
    }

    #[test]
    fn source_identity_display_and_as_str() {
        let source = SourceIdentity::from("https://couch.example.com/animals");
        assert_eq!(source.as_str(), "https://couch.example.com/animals");
        assert_eq!(source.to_string(), "https://couch.example.com/animals");
    }
}
