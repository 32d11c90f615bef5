//! Debounced write-back shared by every draft store.
//!
//! Protocol:
//! 1. A mutation marks the draft dirty and (re)arms a single deadline at
//!    `now + debounce`. Re-arming replaces the previous deadline, so a burst
//!    of edits produces one write.
//! 2. `poll` writes once the deadline has passed.
//! 3. `flush_if_dirty` writes immediately (page unload / process teardown).
//! 4. Write failures are logged, never returned. The deadline is dropped
//!    either way; the dirty flag survives a failure.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::models::{BookingForm, DraftRecord, FormData};
use crate::storage::KeyValueStore;

/// Result of a flush attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing to write
    Idle,
    /// A write is scheduled but the quiet period has not elapsed
    Pending,
    /// Draft written
    Saved,
    /// Write attempted and failed (logged)
    Failed,
}

/// Something that can be persisted as a draft record.
pub trait DraftPayload {
    /// Top-level fields of the record, without the save timestamp.
    fn draft_fields(&self) -> Result<Map<String, Value>, serde_json::Error>;
}

impl DraftPayload for FormData {
    fn draft_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        Ok(self.as_map().clone())
    }
}

impl DraftPayload for BookingForm {
    fn draft_fields(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(serde::ser::Error::custom("booking form must serialize to an object")),
        }
    }
}

/// Dirty tracking and debounced persistence for one storage key.
pub struct AutoSaver {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
    debounce: Duration,
    deadline: Option<DateTime<Utc>>,
    dirty: bool,
    last_saved: Option<DateTime<Utc>>,
}

impl AutoSaver {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        key: String,
        debounce: Duration,
    ) -> Self {
        Self {
            storage,
            clock,
            key,
            debounce,
            deadline: None,
            dirty: false,
            last_saved: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the persisted draft. Unreadable or corrupt records count as absent.
    pub fn load(&self) -> Option<DraftRecord> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!("failed to read draft {}: {}", self.key, e);
                return None;
            }
        };

        match DraftRecord::decode(&raw) {
            Ok(record) => {
                tracing::debug!("restored draft {}", self.key);
                Some(record)
            }
            Err(e) => {
                tracing::warn!("ignoring corrupt draft {}: {}", self.key, e);
                None
            }
        }
    }

    /// Record a restored draft's timestamp without marking anything dirty.
    pub fn restore_last_saved(&mut self, at: Option<DateTime<Utc>>) {
        self.last_saved = at;
    }

    /// Flag an in-memory change and (re)arm the debounce deadline.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        let now = self.clock.now();
        let deadline = now.checked_add_signed(self.debounce).unwrap_or_else(|| {
            tracing::warn!("debounce deadline for {} out of range, saving on next poll", self.key);
            now
        });
        self.deadline = Some(deadline);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// True while a debounced write is scheduled.
    pub fn is_auto_saving(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    /// When the pending write will fire, if one is scheduled.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Write the draft if the debounce deadline has passed.
    pub fn poll<P: DraftPayload + ?Sized>(&mut self, payload: &P) -> FlushOutcome {
        match self.deadline {
            None => FlushOutcome::Idle,
            Some(deadline) if self.clock.now() < deadline => FlushOutcome::Pending,
            Some(_) => self.persist(payload),
        }
    }

    /// Write immediately if there are unsaved changes, ignoring the deadline.
    pub fn flush_if_dirty<P: DraftPayload + ?Sized>(&mut self, payload: &P) -> FlushOutcome {
        if !self.dirty {
            self.deadline = None;
            return FlushOutcome::Idle;
        }
        self.persist(payload)
    }

    /// Drop any scheduled write without persisting.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// Remove the persisted draft and reset all tracking state.
    pub fn clear(&mut self) {
        if let Err(e) = self.storage.remove(&self.key) {
            tracing::error!("failed to remove draft {}: {}", self.key, e);
        }
        self.deadline = None;
        self.dirty = false;
        self.last_saved = None;
    }

    fn persist<P: DraftPayload + ?Sized>(&mut self, payload: &P) -> FlushOutcome {
        self.deadline = None;
        let now = self.clock.now();

        let encoded = payload
            .draft_fields()
            .and_then(|fields| DraftRecord::encode(&fields, now));
        let raw = match encoded {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("failed to encode draft {}: {}", self.key, e);
                return FlushOutcome::Failed;
            }
        };

        match self.storage.set(&self.key, &raw) {
            Ok(()) => {
                self.dirty = false;
                self.last_saved = Some(now);
                tracing::debug!("saved draft {} ({} bytes)", self.key, raw.len());
                FlushOutcome::Saved
            }
            Err(e) => {
                tracing::error!("failed to save draft {}: {}", self.key, e);
                FlushOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn setup() -> (AutoSaver, MemoryStore, ManualClock) {
        let store = MemoryStore::new();
        let clock = ManualClock::default();
        let saver = AutoSaver::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            "draft_1".into(),
            Duration::milliseconds(2000),
        );
        (saver, store, clock)
    }

    fn data() -> FormData {
        FormData::from_value(json!({"a": 1})).unwrap()
    }

    #[test]
    fn test_idle_until_dirty() {
        let (mut saver, store, clock) = setup();
        clock.advance_ms(10_000);
        assert_eq!(saver.poll(&data()), FlushOutcome::Idle);
        assert_eq!(saver.flush_if_dirty(&data()), FlushOutcome::Idle);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_deadline_rearmed_on_each_mark() {
        let (mut saver, store, clock) = setup();
        saver.mark_dirty();
        clock.advance_ms(1500);
        saver.mark_dirty();
        clock.advance_ms(1500);

        assert_eq!(saver.poll(&data()), FlushOutcome::Pending);
        clock.advance_ms(500);
        assert_eq!(saver.poll(&data()), FlushOutcome::Saved);
        assert_eq!(store.write_count(), 1);
        assert!(!saver.is_dirty());
        assert!(!saver.is_auto_saving());
        assert_eq!(saver.last_saved(), Some(clock.now()));
    }

    #[test]
    fn test_deadline_overflow_saves_on_next_poll() {
        let store = MemoryStore::new();
        let clock = ManualClock::new(DateTime::<Utc>::MAX_UTC - Duration::milliseconds(10));
        let mut saver = AutoSaver::new(
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            "draft_1".into(),
            Duration::milliseconds(2000),
        );

        saver.mark_dirty();
        assert_eq!(saver.deadline(), Some(clock.now()));
        assert_eq!(saver.poll(&data()), FlushOutcome::Saved);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_failure_keeps_dirty_and_clears_saving() {
        let (mut saver, store, clock) = setup();
        store.set_fail_writes(true);
        saver.mark_dirty();
        clock.advance_ms(2000);

        assert_eq!(saver.poll(&data()), FlushOutcome::Failed);
        assert!(saver.is_dirty());
        assert!(!saver.is_auto_saving());
        assert!(saver.last_saved().is_none());

        store.set_fail_writes(false);
        assert_eq!(saver.flush_if_dirty(&data()), FlushOutcome::Saved);
        assert!(!saver.is_dirty());
    }

    #[test]
    fn test_load_corrupt_is_none() {
        let (saver, store, _clock) = setup();
        store.seed("draft_1", "{\"a\":");
        assert!(saver.load().is_none());
    }

    #[test]
    fn test_clear_removes_key() {
        let (mut saver, store, _clock) = setup();
        saver.mark_dirty();
        saver.flush_if_dirty(&data());
        assert!(store.contains_key("draft_1"));

        saver.clear();
        assert!(!store.contains_key("draft_1"));
        assert!(saver.last_saved().is_none());
        assert!(!saver.is_dirty());
    }

    #[test]
    fn test_booking_form_payload_is_object() {
        let fields = BookingForm::new().draft_fields().unwrap();
        assert!(fields.contains_key("sessionId"));
        assert!(fields.contains_key("currentStep"));
    }
}
