//! Offset state model shared by hosts and offset store implementations.

use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, SourceIdentity};

/// Last committed change-feed position for one source.
///
/// `updated_at` is an ISO-8601 UTC string (e.g. `"2026-01-15T10:00:00Z"`).
/// Stores handle timestamp formatting internally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetState {
    pub source: SourceIdentity,
    pub last_change_seq: Cursor,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_state_serde_roundtrip() {
        let state = OffsetState {
            source: SourceIdentity::new("http://localhost:5984/animals"),
            last_change_seq: Cursor::new("12-g1AAAA"),
            updated_at: "2026-01-15T10:00:00Z".into(),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: OffsetState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }
}
