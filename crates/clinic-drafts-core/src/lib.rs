//! Clinic Drafts Core Library
//!
//! Local-first draft persistence for the clinic portal: doctor-notes forms and
//! the multi-step booking flow survive reloads and crashes without ever being
//! the system of record.
//!
//! # Architecture
//!
//! ```text
//!   form field edit ──► update_form_data(path, value)
//!                                 │
//!                   [in-memory FormData, dirty = true]
//!                                 │
//!                    debounce deadline (re)armed
//!                                 │
//!            ┌────────────────────┴────────────────────┐
//!            ▼                                         ▼
//!   poll() after quiet period                handle_unload() while dirty
//!            │                                         │
//!            └──────────────► KeyValueStore ◄──────────┘
//!                        prefix + appointmentId
//!                       { ...fields, _lastSaved }
//! ```
//!
//! # Core Principle
//!
//! **Drafts are best-effort.** Storage failures are logged and swallowed; the
//! server-side submission stays authoritative.
//!
//! # Modules
//!
//! - [`store`]: Doctor-notes and booking stores plus the shared auto-saver
//! - [`models`]: Form data tree, draft record format, booking selections
//! - [`storage`]: Key-value persistence (in-memory and SQLite)
//! - [`clock`]: Time source for debounce deadlines
//! - [`config`]: Storage prefixes and debounce windows
//! - [`api`]: Backend wire records

pub mod api;
pub mod clock;
pub mod config;
pub mod models;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AutoSaveConfig;
pub use models::{BookingForm, BookingStep, DraftRecord, FormData};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore};
pub use store::{BookingFormStore, DoctorNotesStore, DraftError, FlushOutcome};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{DateTime, SecondsFormat, Utc};

use models::{PatientDetails, PaymentMethod, PaymentSelection, PlanSelection, SlotSelection};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ClinicDraftsError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not mounted: {0}")]
    NotMounted(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<storage::StorageError> for ClinicDraftsError {
    fn from(e: storage::StorageError) -> Self {
        ClinicDraftsError::StorageError(e.to_string())
    }
}

impl From<serde_json::Error> for ClinicDraftsError {
    fn from(e: serde_json::Error) -> Self {
        ClinicDraftsError::SerializationError(e.to_string())
    }
}

impl From<DraftError> for ClinicDraftsError {
    fn from(e: DraftError) -> Self {
        match e {
            DraftError::Storage(e) => e.into(),
            DraftError::Json(e) => e.into(),
            other => ClinicDraftsError::InvalidInput(other.to_string()),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for ClinicDraftsError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        ClinicDraftsError::StorageError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a SQLite draft store at the given path.
#[uniffi::export]
pub fn open_draft_store(path: String) -> Result<Arc<ClinicDraftsCore>, ClinicDraftsError> {
    let storage = SqliteStore::open(&path)?;
    Ok(Arc::new(ClinicDraftsCore::new(Arc::new(storage))))
}

/// Create an in-memory draft store (for testing).
#[uniffi::export]
pub fn open_draft_store_in_memory() -> Arc<ClinicDraftsCore> {
    Arc::new(ClinicDraftsCore::new(Arc::new(MemoryStore::new())))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe holder for the mounted stores.
///
/// At most one doctor-notes store and one booking store are mounted at a
/// time; mounting again replaces (and unmounts) the previous one.
#[derive(uniffi::Object)]
pub struct ClinicDraftsCore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    notes: Mutex<Option<DoctorNotesStore>>,
    booking: Mutex<Option<BookingFormStore>>,
}

impl ClinicDraftsCore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(storage, Arc::new(SystemClock))
    }

    pub fn with_clock(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            notes: Mutex::new(None),
            booking: Mutex::new(None),
        }
    }

    fn with_notes<T>(
        &self,
        f: impl FnOnce(&mut DoctorNotesStore) -> Result<T, ClinicDraftsError>,
    ) -> Result<T, ClinicDraftsError> {
        let mut guard = self.notes.lock()?;
        let notes = guard
            .as_mut()
            .ok_or_else(|| ClinicDraftsError::NotMounted("doctor notes".into()))?;
        f(notes)
    }

    fn with_booking<T>(
        &self,
        f: impl FnOnce(&mut BookingFormStore) -> Result<T, ClinicDraftsError>,
    ) -> Result<T, ClinicDraftsError> {
        let mut guard = self.booking.lock()?;
        let booking = guard
            .as_mut()
            .ok_or_else(|| ClinicDraftsError::NotMounted("booking form".into()))?;
        f(booking)
    }
}

#[uniffi::export]
impl ClinicDraftsCore {
    // =========================================================================
    // Doctor Notes Operations
    // =========================================================================

    /// Mount the notes store for an appointment, optionally seeded with the
    /// server's form data (JSON object).
    pub fn mount_notes(
        &self,
        appointment_id: String,
        initial_data_json: Option<String>,
    ) -> Result<FfiDraftStatus, ClinicDraftsError> {
        let initial_data = initial_data_json
            .map(|json| parse_form_data(&json))
            .transpose()?;

        let store = DoctorNotesStore::mount(
            &AutoSaveConfig::doctor_notes(),
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
            appointment_id,
            initial_data,
        );
        let status = notes_status(&store);

        let mut guard = self.notes.lock()?;
        if let Some(previous) = guard.replace(store) {
            previous.unmount();
        }
        Ok(status)
    }

    /// Set a field by key path. `value_json` is any JSON value.
    pub fn update_note_field(
        &self,
        path: Vec<String>,
        value_json: String,
    ) -> Result<FfiDraftStatus, ClinicDraftsError> {
        let value: serde_json::Value = serde_json::from_str(&value_json)?;
        self.with_notes(|notes| {
            notes.update_form_data(&path, value)?;
            Ok(notes_status(notes))
        })
    }

    /// Read a field by key path as JSON, `None` if absent.
    pub fn get_note_field(&self, path: Vec<String>) -> Result<Option<String>, ClinicDraftsError> {
        self.with_notes(|notes| {
            notes
                .get_form_value(&path)
                .map(serde_json::to_string)
                .transpose()
                .map_err(Into::into)
        })
    }

    /// Whole form as a JSON object.
    pub fn note_form_json(&self) -> Result<String, ClinicDraftsError> {
        self.with_notes(|notes| Ok(serde_json::to_string(&*notes.form_data())?))
    }

    pub fn note_status(&self) -> Result<FfiDraftStatus, ClinicDraftsError> {
        self.with_notes(|notes| Ok(notes_status(notes)))
    }

    /// Submission body for the current notes.
    pub fn note_submission_json(&self) -> Result<String, ClinicDraftsError> {
        self.with_notes(|notes| Ok(notes.submission().to_json()?))
    }

    /// Drop the local draft after the server confirmed the submission.
    pub fn clear_notes(&self) -> Result<(), ClinicDraftsError> {
        self.with_notes(|notes| {
            notes.clear_form_data();
            Ok(())
        })
    }

    pub fn unmount_notes(&self) -> Result<(), ClinicDraftsError> {
        if let Some(notes) = self.notes.lock()?.take() {
            notes.unmount();
        }
        Ok(())
    }

    // =========================================================================
    // Booking Operations
    // =========================================================================

    pub fn mount_booking(&self) -> Result<FfiBookingState, ClinicDraftsError> {
        let store = BookingFormStore::mount(
            &AutoSaveConfig::booking_form(),
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
        );
        let state = booking_state(&store);

        let mut guard = self.booking.lock()?;
        if let Some(previous) = guard.replace(store) {
            previous.unmount();
        }
        Ok(state)
    }

    pub fn booking_select_plan(
        &self,
        plan: FfiPlanSelection,
    ) -> Result<FfiBookingState, ClinicDraftsError> {
        self.with_booking(|booking| {
            booking.select_plan(plan.into());
            Ok(booking_state(booking))
        })
    }

    pub fn booking_set_patient(
        &self,
        patient: FfiPatientDetails,
    ) -> Result<FfiBookingState, ClinicDraftsError> {
        self.with_booking(|booking| {
            booking.set_patient(patient.into())?;
            Ok(booking_state(booking))
        })
    }

    pub fn booking_select_slot(
        &self,
        slot: FfiSlotSelection,
    ) -> Result<FfiBookingState, ClinicDraftsError> {
        let slot = SlotSelection::try_from(slot)?;
        self.with_booking(|booking| {
            booking.select_slot(slot)?;
            Ok(booking_state(booking))
        })
    }

    /// `method` is one of `card`, `insurance`, `pay_at_clinic`.
    pub fn booking_set_payment(
        &self,
        method: String,
        reference: Option<String>,
    ) -> Result<FfiBookingState, ClinicDraftsError> {
        let method = parse_payment_method(&method)?;
        self.with_booking(|booking| {
            booking.set_payment(PaymentSelection { method, reference });
            Ok(booking_state(booking))
        })
    }

    pub fn booking_next_step(&self) -> Result<FfiBookingState, ClinicDraftsError> {
        self.with_booking(|booking| {
            booking.next_step()?;
            Ok(booking_state(booking))
        })
    }

    pub fn booking_previous_step(&self) -> Result<FfiBookingState, ClinicDraftsError> {
        self.with_booking(|booking| {
            booking.previous_step();
            Ok(booking_state(booking))
        })
    }

    pub fn booking_go_to_step(&self, step: String) -> Result<FfiBookingState, ClinicDraftsError> {
        let step = BookingStep::parse(&step)
            .ok_or_else(|| ClinicDraftsError::InvalidInput(format!("Unknown step: {}", step)))?;
        self.with_booking(|booking| {
            booking.go_to_step(step)?;
            Ok(booking_state(booking))
        })
    }

    /// Full booking form as JSON.
    pub fn booking_snapshot_json(&self) -> Result<String, ClinicDraftsError> {
        self.with_booking(|booking| Ok(serde_json::to_string(booking.form())?))
    }

    /// Confirmation request body; fails if any step is incomplete.
    pub fn booking_confirmation_json(&self) -> Result<String, ClinicDraftsError> {
        self.with_booking(|booking| Ok(booking.confirmation_request()?.to_json()?))
    }

    /// Start over after the booking was confirmed.
    pub fn booking_reset(&self) -> Result<FfiBookingState, ClinicDraftsError> {
        self.with_booking(|booking| {
            booking.reset();
            Ok(booking_state(booking))
        })
    }

    // =========================================================================
    // Auto-save Driving
    // =========================================================================

    /// Fire any debounced saves that are due. Returns how many drafts were written.
    pub fn poll(&self) -> Result<u32, ClinicDraftsError> {
        let mut saved = 0;
        if let Some(notes) = self.notes.lock()?.as_mut() {
            saved += u32::from(notes.poll() == FlushOutcome::Saved);
        }
        if let Some(booking) = self.booking.lock()?.as_mut() {
            saved += u32::from(booking.poll() == FlushOutcome::Saved);
        }
        Ok(saved)
    }

    /// Flush every dirty draft now (app backgrounded or closing).
    pub fn handle_unload(&self) -> Result<u32, ClinicDraftsError> {
        let mut saved = 0;
        if let Some(notes) = self.notes.lock()?.as_mut() {
            saved += u32::from(notes.handle_unload() == FlushOutcome::Saved);
        }
        if let Some(booking) = self.booking.lock()?.as_mut() {
            saved += u32::from(booking.handle_unload() == FlushOutcome::Saved);
        }
        Ok(saved)
    }
}

fn parse_form_data(json: &str) -> Result<FormData, ClinicDraftsError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    FormData::from_value(value)
        .ok_or_else(|| ClinicDraftsError::InvalidInput("Form data must be a JSON object".into()))
}

fn parse_payment_method(s: &str) -> Result<PaymentMethod, ClinicDraftsError> {
    match s {
        "card" => Ok(PaymentMethod::Card),
        "insurance" => Ok(PaymentMethod::Insurance),
        "pay_at_clinic" => Ok(PaymentMethod::PayAtClinic),
        _ => Err(ClinicDraftsError::InvalidInput(format!(
            "Unknown payment method: {}",
            s
        ))),
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn notes_status(notes: &DoctorNotesStore) -> FfiDraftStatus {
    FfiDraftStatus {
        has_unsaved_changes: notes.has_unsaved_changes(),
        is_auto_saving: notes.is_auto_saving(),
        last_saved: notes.last_saved().map(format_timestamp),
    }
}

fn booking_state(booking: &BookingFormStore) -> FfiBookingState {
    let form = booking.form();
    FfiBookingState {
        session_id: form.session_id.clone(),
        current_step: form.current_step.as_str().to_string(),
        furthest_step: form.furthest_step.as_str().to_string(),
        is_complete: form.is_complete(),
        status: FfiDraftStatus {
            has_unsaved_changes: booking.has_unsaved_changes(),
            is_auto_saving: booking.is_auto_saving(),
            last_saved: booking.last_saved().map(format_timestamp),
        },
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe auto-save status.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiDraftStatus {
    pub has_unsaved_changes: bool,
    pub is_auto_saving: bool,
    pub last_saved: Option<String>,
}

/// FFI-safe booking progress.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct FfiBookingState {
    pub session_id: String,
    pub current_step: String,
    pub furthest_step: String,
    pub is_complete: bool,
    pub status: FfiDraftStatus,
}

/// FFI-safe plan selection.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPlanSelection {
    pub plan_id: String,
    pub name: String,
    pub price_cents: i64,
    pub currency: String,
}

impl From<FfiPlanSelection> for PlanSelection {
    fn from(plan: FfiPlanSelection) -> Self {
        PlanSelection {
            plan_id: plan.plan_id,
            name: plan.name,
            price_cents: plan.price_cents,
            currency: plan.currency,
        }
    }
}

/// FFI-safe patient details.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatientDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<String>,
    pub notes: Option<String>,
}

impl From<FfiPatientDetails> for PatientDetails {
    fn from(patient: FfiPatientDetails) -> Self {
        PatientDetails {
            full_name: patient.full_name,
            email: patient.email,
            phone: patient.phone,
            date_of_birth: patient.date_of_birth,
            notes: patient.notes,
        }
    }
}

/// FFI-safe slot selection. `starts_at` is RFC 3339.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSlotSelection {
    pub slot_id: String,
    pub starts_at: String,
    pub duration_minutes: u32,
}

impl TryFrom<FfiSlotSelection> for SlotSelection {
    type Error = ClinicDraftsError;

    fn try_from(slot: FfiSlotSelection) -> Result<Self, Self::Error> {
        let starts_at = DateTime::parse_from_rfc3339(&slot.starts_at)
            .map_err(|e| ClinicDraftsError::InvalidInput(format!("Invalid slot time: {}", e)))?
            .with_timezone(&Utc);
        Ok(SlotSelection {
            slot_id: slot.slot_id,
            starts_at,
            duration_minutes: slot.duration_minutes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operations_require_mount() {
        let core = open_draft_store_in_memory();
        assert!(matches!(
            core.note_status(),
            Err(ClinicDraftsError::NotMounted(_))
        ));
        assert!(matches!(
            core.booking_next_step(),
            Err(ClinicDraftsError::NotMounted(_))
        ));
        assert_eq!(core.poll().unwrap(), 0);
    }

    #[test]
    fn test_notes_roundtrip_through_ffi() {
        let core = open_draft_store_in_memory();
        core.mount_notes("appt-7".into(), Some(r#"{"a": 1}"#.into()))
            .unwrap();

        let status = core
            .update_note_field(vec!["patient".into(), "weight".into()], "70".into())
            .unwrap();
        assert!(status.has_unsaved_changes);
        assert!(status.is_auto_saving);

        let weight = core
            .get_note_field(vec!["patient".into(), "weight".into()])
            .unwrap();
        assert_eq!(weight.as_deref(), Some("70"));
        assert_eq!(
            core.get_note_field(vec!["patient".into(), "missing".into()])
                .unwrap(),
            None
        );

        assert_eq!(core.handle_unload().unwrap(), 1);
        assert!(!core.note_status().unwrap().has_unsaved_changes);
    }

    #[test]
    fn test_mount_rejects_non_object_seed() {
        let core = open_draft_store_in_memory();
        assert!(matches!(
            core.mount_notes("appt-7".into(), Some("[1,2]".into())),
            Err(ClinicDraftsError::InvalidInput(_))
        ));
        assert!(matches!(
            core.mount_notes("appt-7".into(), Some("{oops".into())),
            Err(ClinicDraftsError::SerializationError(_))
        ));
    }

    #[test]
    fn test_booking_through_ffi() {
        let core = open_draft_store_in_memory();
        core.mount_booking().unwrap();

        assert!(matches!(
            core.booking_next_step(),
            Err(ClinicDraftsError::InvalidInput(_))
        ));

        core.booking_select_plan(FfiPlanSelection {
            plan_id: "basic".into(),
            name: "General consultation".into(),
            price_cents: 4500,
            currency: "GBP".into(),
        })
        .unwrap();
        let state = core.booking_next_step().unwrap();
        assert_eq!(state.current_step, "patient");

        assert!(matches!(
            core.booking_set_payment("cash".into(), None),
            Err(ClinicDraftsError::InvalidInput(_))
        ));
        assert!(matches!(
            core.booking_select_slot(FfiSlotSelection {
                slot_id: "slot-1".into(),
                starts_at: "tomorrow".into(),
                duration_minutes: 30,
            }),
            Err(ClinicDraftsError::InvalidInput(_))
        ));
    }
}
