//! Multi-step booking form store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::api::BookingRequest;
use crate::clock::Clock;
use crate::config::AutoSaveConfig;
use crate::models::{
    BookingForm, BookingStep, PatientDetails, PaymentSelection, PlanSelection, SlotSelection,
};
use crate::storage::KeyValueStore;

use super::{AutoSaver, DraftError, DraftResult, FlushOutcome};

/// Accumulates booking selections across steps and persists them across reloads.
pub struct BookingFormStore {
    form: BookingForm,
    saver: AutoSaver,
}

impl BookingFormStore {
    /// Mount the store, restoring an in-progress booking if one was saved.
    pub fn mount(
        config: &AutoSaveConfig,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut saver = AutoSaver::new(storage, clock, config.key_for(""), config.debounce());

        let form = match saver.load() {
            Some(record) => match serde_json::from_value::<BookingForm>(Value::Object(record.fields)) {
                Ok(mut form) => {
                    saver.restore_last_saved(record.last_saved);
                    form.reconcile_progress();
                    form
                }
                Err(e) => {
                    tracing::warn!("ignoring unreadable booking draft {}: {}", saver.key(), e);
                    BookingForm::new()
                }
            },
            None => BookingForm::new(),
        };

        Self { form, saver }
    }

    pub fn form(&self) -> &BookingForm {
        &self.form
    }

    pub fn current_step(&self) -> BookingStep {
        self.form.current_step
    }

    pub fn storage_key(&self) -> &str {
        self.saver.key()
    }

    /// Choose a plan. Switching to a different plan drops the slot and
    /// payment chosen for the old one and moves progress back to the slot step.
    pub fn select_plan(&mut self, plan: PlanSelection) {
        let changed = self
            .form
            .plan
            .as_ref()
            .is_some_and(|current| current.plan_id != plan.plan_id);
        if changed {
            self.form.slot = None;
            self.form.payment = None;
            self.form.rewind_to(BookingStep::Slot);
        }
        self.form.plan = Some(plan);
        self.saver.mark_dirty();
    }

    pub fn set_patient(&mut self, patient: PatientDetails) -> DraftResult<()> {
        patient.validate().map_err(DraftError::InvalidSelection)?;
        self.form.patient = Some(patient);
        self.saver.mark_dirty();
        Ok(())
    }

    pub fn select_slot(&mut self, slot: SlotSelection) -> DraftResult<()> {
        if slot.duration_minutes == 0 {
            return Err(DraftError::InvalidSelection(format!(
                "slot {} has no duration",
                slot.slot_id
            )));
        }
        self.form.slot = Some(slot);
        self.saver.mark_dirty();
        Ok(())
    }

    pub fn set_payment(&mut self, payment: PaymentSelection) {
        self.form.payment = Some(payment);
        self.saver.mark_dirty();
    }

    /// Advance to the next step once the current one is complete.
    pub fn next_step(&mut self) -> DraftResult<BookingStep> {
        let current = self.form.current_step;
        if !self.form.is_step_complete(current) {
            return Err(DraftError::StepIncomplete(current));
        }
        let next = current.next().ok_or(DraftError::AlreadyAtLastStep)?;
        self.form.move_to(next);
        self.saver.mark_dirty();
        Ok(next)
    }

    /// Go back one step. Stays put on the first step.
    pub fn previous_step(&mut self) -> BookingStep {
        if let Some(previous) = self.form.current_step.previous() {
            self.form.move_to(previous);
            self.saver.mark_dirty();
        }
        self.form.current_step
    }

    /// Jump to a step already reached whose preceding steps are all complete.
    pub fn go_to_step(&mut self, step: BookingStep) -> DraftResult<()> {
        if step > self.form.furthest_step {
            return Err(DraftError::StepNotReached(step));
        }
        if let Some(missing) = self.form.first_incomplete_step().filter(|m| *m < step) {
            return Err(DraftError::StepIncomplete(missing));
        }
        if step != self.form.current_step {
            self.form.move_to(step);
            self.saver.mark_dirty();
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.form.is_complete()
    }

    /// Build the request sent to the appointments API.
    pub fn confirmation_request(&self) -> DraftResult<BookingRequest> {
        match (&self.form.plan, &self.form.patient, &self.form.slot, &self.form.payment) {
            (Some(plan), Some(patient), Some(slot), Some(payment)) => Ok(BookingRequest {
                session_id: self.form.session_id.clone(),
                plan_id: plan.plan_id.clone(),
                slot_id: slot.slot_id.clone(),
                starts_at: slot.starts_at,
                duration_minutes: slot.duration_minutes,
                patient: patient.clone(),
                payment: payment.clone(),
            }),
            _ => Err(DraftError::StepIncomplete(
                self.form.first_incomplete_step().unwrap_or(BookingStep::Plan),
            )),
        }
    }

    /// Discard the booking (after it was confirmed) and start over.
    pub fn reset(&mut self) {
        self.saver.clear();
        self.form = BookingForm::new();
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.saver.is_dirty()
    }

    pub fn is_auto_saving(&self) -> bool {
        self.saver.is_auto_saving()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.saver.last_saved()
    }

    pub fn poll(&mut self) -> FlushOutcome {
        self.saver.poll(&self.form)
    }

    pub fn handle_unload(&mut self) -> FlushOutcome {
        self.saver.flush_if_dirty(&self.form)
    }

    pub fn unmount(mut self) {
        self.saver.cancel();
    }
}
