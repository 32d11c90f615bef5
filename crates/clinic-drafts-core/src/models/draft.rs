//! Persisted draft record format.
//!
//! A draft is stored as a flat JSON object holding the form fields plus a
//! `_lastSaved` RFC 3339 timestamp:
//!
//! ```text
//! { "chiefComplaint": "...", "vitals": { ... }, "_lastSaved": "2024-05-01T10:32:00Z" }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Field holding the save timestamp inside a persisted draft.
pub const LAST_SAVED_FIELD: &str = "_lastSaved";

/// A draft read back from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecord {
    /// Form fields with the timestamp stripped
    pub fields: Map<String, Value>,
    /// When the draft was written, if the timestamp was readable
    pub last_saved: Option<DateTime<Utc>>,
}

impl DraftRecord {
    /// Serialize `fields` plus a `_lastSaved` stamp.
    pub fn encode(
        fields: &Map<String, Value>,
        saved_at: DateTime<Utc>,
    ) -> Result<String, serde_json::Error> {
        let mut record = fields.clone();
        record.insert(
            LAST_SAVED_FIELD.to_string(),
            Value::String(saved_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        serde_json::to_string(&Value::Object(record))
    }

    /// Parse a stored draft. Fails on malformed JSON or a non-object record.
    pub fn decode(raw: &str) -> Result<Self, DraftDecodeError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(mut fields) = value else {
            return Err(DraftDecodeError::NotAnObject);
        };

        let last_saved = fields
            .remove(LAST_SAVED_FIELD)
            .and_then(|v| v.as_str().map(str::to_owned))
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(Self { fields, last_saved })
    }
}

/// Why a stored draft could not be read.
#[derive(Debug, thiserror::Error)]
pub enum DraftDecodeError {
    #[error("Malformed draft JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Draft is not a JSON object")]
    NotAnObject,
}
