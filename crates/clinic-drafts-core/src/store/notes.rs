//! Doctor-notes draft store.
//!
//! Holds one appointment's clinical note form in memory, reconciles it with
//! a locally persisted draft and server-supplied data at mount, and keeps the
//! local draft current through [`AutoSaver`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::DoctorNotesSubmission;
use crate::clock::Clock;
use crate::config::AutoSaveConfig;
use crate::models::FormData;
use crate::storage::KeyValueStore;

use super::{AutoSaver, DraftError, DraftResult, FlushOutcome};

/// Draft store for one appointment's doctor notes.
pub struct DoctorNotesStore {
    appointment_id: String,
    data: Arc<FormData>,
    saver: AutoSaver,
}

impl DoctorNotesStore {
    /// Mount the store for `appointment_id`.
    ///
    /// A persisted draft is restored first and `initial_data` (from the
    /// server) is merged over it, top-level keys from the server winning.
    /// Without a draft the store starts from `initial_data` or empty.
    ///
    /// The merge happens only here. Server data that arrives after mount is
    /// not merged; remount to pick it up.
    pub fn mount(
        config: &AutoSaveConfig,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        appointment_id: impl Into<String>,
        initial_data: Option<FormData>,
    ) -> Self {
        let appointment_id = appointment_id.into();
        let mut saver = AutoSaver::new(
            storage,
            clock,
            config.key_for(&appointment_id),
            config.debounce(),
        );

        let data = match saver.load() {
            Some(record) => {
                let mut data = FormData::from_map(record.fields);
                if let Some(server) = &initial_data {
                    data.merge_top_level(server);
                }
                saver.restore_last_saved(record.last_saved);
                data
            }
            None => initial_data.unwrap_or_default(),
        };

        tracing::debug!(
            "mounted doctor notes for appointment {} ({} fields)",
            appointment_id,
            data.len()
        );

        Self {
            appointment_id,
            data: Arc::new(data),
            saver,
        }
    }

    pub fn appointment_id(&self) -> &str {
        &self.appointment_id
    }

    pub fn storage_key(&self) -> &str {
        self.saver.key()
    }

    /// Current form snapshot. Later updates never alter a snapshot already handed out.
    pub fn form_data(&self) -> Arc<FormData> {
        Arc::clone(&self.data)
    }

    /// Set `value` at `path` and schedule an auto-save.
    pub fn update_form_data<P: AsRef<str>>(&mut self, path: &[P], value: Value) -> DraftResult<()> {
        if path.is_empty() {
            return Err(DraftError::EmptyPath);
        }
        Arc::make_mut(&mut self.data).set(path, value);
        self.saver.mark_dirty();
        Ok(())
    }

    /// Value at `path`, or `None` if any segment is missing.
    pub fn get_form_value<P: AsRef<str>>(&self, path: &[P]) -> Option<&Value> {
        self.data.get(path)
    }

    /// Drop the persisted draft and reset to an empty form.
    ///
    /// Call after the server has confirmed the submission.
    pub fn clear_form_data(&mut self) {
        self.saver.clear();
        self.data = Arc::new(FormData::new());
        tracing::debug!("cleared doctor notes for appointment {}", self.appointment_id);
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.saver.is_dirty()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.saver.last_saved()
    }

    pub fn is_auto_saving(&self) -> bool {
        self.saver.is_auto_saving()
    }

    /// Drive the debounce timer. Call from the host's event loop.
    pub fn poll(&mut self) -> FlushOutcome {
        self.saver.poll(&*self.data)
    }

    /// Last-chance flush on page unload or process teardown.
    pub fn handle_unload(&mut self) -> FlushOutcome {
        self.saver.flush_if_dirty(&*self.data)
    }

    /// Tear down without writing. Any scheduled save is cancelled.
    pub fn unmount(mut self) {
        self.saver.cancel();
    }

    /// Payload for the notes submission API built from the current snapshot.
    pub fn submission(&self) -> DoctorNotesSubmission {
        DoctorNotesSubmission {
            appointment_id: self.appointment_id.clone(),
            form_data: (*self.data).clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn mount(store: &MemoryStore, clock: &ManualClock, initial: Option<Value>) -> DoctorNotesStore {
        DoctorNotesStore::mount(
            &AutoSaveConfig::doctor_notes(),
            Arc::new(store.clone()),
            Arc::new(clock.clone()),
            "appt-1",
            initial.and_then(FormData::from_value),
        )
    }

    #[test]
    fn test_storage_key() {
        let notes = mount(&MemoryStore::new(), &ManualClock::default(), None);
        assert_eq!(notes.storage_key(), "doctor_notes_draft_appt-1");
        assert_eq!(notes.appointment_id(), "appt-1");
    }

    #[test]
    fn test_update_marks_dirty_and_saving() {
        let mut notes = mount(&MemoryStore::new(), &ManualClock::default(), None);
        assert!(!notes.has_unsaved_changes());
        assert!(!notes.is_auto_saving());

        notes.update_form_data(&["assessment"], json!("stable")).unwrap();
        assert!(notes.has_unsaved_changes());
        assert!(notes.is_auto_saving());
    }

    #[test]
    fn test_empty_path_rejected() {
        let mut notes = mount(&MemoryStore::new(), &ManualClock::default(), None);
        let empty: [&str; 0] = [];
        assert!(matches!(
            notes.update_form_data(&empty, json!(1)),
            Err(DraftError::EmptyPath)
        ));
        assert!(!notes.has_unsaved_changes());
    }

    #[test]
    fn test_snapshot_survives_update() {
        let mut notes = mount(&MemoryStore::new(), &ManualClock::default(), Some(json!({"a": 1})));
        let before = notes.form_data();
        notes.update_form_data(&["a"], json!(2)).unwrap();

        assert_eq!(before.get(&["a"]), Some(&json!(1)));
        assert_eq!(notes.get_form_value(&["a"]), Some(&json!(2)));
    }

    #[test]
    fn test_unmount_cancels_pending_save() {
        let store = MemoryStore::new();
        let clock = ManualClock::default();
        let mut notes = mount(&store, &clock, None);
        notes.update_form_data(&["a"], json!(1)).unwrap();
        notes.unmount();

        clock.advance_ms(5000);
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn test_submission_payload() {
        let mut notes = mount(&MemoryStore::new(), &ManualClock::default(), None);
        notes.update_form_data(&["plan"], json!("rest")).unwrap();

        let submission = notes.submission();
        assert_eq!(submission.appointment_id, "appt-1");
        assert_eq!(submission.form_data.get(&["plan"]), Some(&json!("rest")));
    }
}
