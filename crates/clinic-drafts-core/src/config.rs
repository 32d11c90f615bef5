//! Auto-save configuration.

use serde::{Deserialize, Serialize};

/// Default storage prefix for doctor-notes drafts.
pub const DOCTOR_NOTES_PREFIX: &str = "doctor_notes_draft_";

/// Default storage key for the booking form draft.
pub const BOOKING_FORM_PREFIX: &str = "booking_form_draft";

/// Default quiet period before a draft is written.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;

/// Upper bound applied to configured debounce windows (one hour).
pub const MAX_DEBOUNCE_MS: u64 = 60 * 60 * 1000;

/// Where and how often a store persists its draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Prefix prepended to the store's scope to form the storage key
    pub storage_prefix: String,
    /// Debounce window in milliseconds
    pub debounce_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self::doctor_notes()
    }
}

impl AutoSaveConfig {
    /// Preset for doctor-notes drafts (`doctor_notes_draft_<appointmentId>`).
    pub fn doctor_notes() -> Self {
        Self {
            storage_prefix: DOCTOR_NOTES_PREFIX.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Preset for the booking flow draft.
    pub fn booking_form() -> Self {
        Self {
            storage_prefix: BOOKING_FORM_PREFIX.to_string(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }

    /// Parse a config from JSON. Missing fields fall back to the doctor-notes preset.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Storage key for a given scope (e.g. an appointment ID).
    pub fn key_for(&self, scope: &str) -> String {
        format!("{}{}", self.storage_prefix, scope)
    }

    /// Debounce window as a duration, capped at [`MAX_DEBOUNCE_MS`].
    pub fn debounce(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.debounce_ms.min(MAX_DEBOUNCE_MS) as i64)
    }
}
