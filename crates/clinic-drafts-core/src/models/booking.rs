//! Booking flow models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Steps of the booking flow, in order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    /// Choose a consultation plan
    Plan,
    /// Enter patient details
    Patient,
    /// Pick an appointment slot
    Slot,
    /// Choose how to pay
    Payment,
    /// Review before confirming
    Review,
}

impl BookingStep {
    pub const ALL: [BookingStep; 5] = [
        BookingStep::Plan,
        BookingStep::Patient,
        BookingStep::Slot,
        BookingStep::Payment,
        BookingStep::Review,
    ];

    pub fn next(self) -> Option<Self> {
        match self {
            BookingStep::Plan => Some(BookingStep::Patient),
            BookingStep::Patient => Some(BookingStep::Slot),
            BookingStep::Slot => Some(BookingStep::Payment),
            BookingStep::Payment => Some(BookingStep::Review),
            BookingStep::Review => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            BookingStep::Plan => None,
            BookingStep::Patient => Some(BookingStep::Plan),
            BookingStep::Slot => Some(BookingStep::Patient),
            BookingStep::Payment => Some(BookingStep::Slot),
            BookingStep::Review => Some(BookingStep::Payment),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStep::Plan => "plan",
            BookingStep::Patient => "patient",
            BookingStep::Slot => "slot",
            BookingStep::Payment => "payment",
            BookingStep::Review => "review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == s)
    }
}

impl std::fmt::Display for BookingStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A chosen consultation plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanSelection {
    pub plan_id: String,
    pub name: String,
    /// Price in minor currency units
    pub price_cents: i64,
    pub currency: String,
}

/// Who the appointment is for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PatientDetails {
    /// Basic shape checks done client-side; the server remains authoritative.
    pub fn validate(&self) -> Result<(), String> {
        if self.full_name.trim().is_empty() {
            return Err("patient name is required".into());
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
            _ => Err(format!("invalid email address: {}", self.email)),
        }
    }
}

/// A chosen appointment slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotSelection {
    pub slot_id: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
}

/// How the patient will pay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Insurance,
    PayAtClinic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSelection {
    pub method: PaymentMethod,
    /// Card token or insurance policy number
    #[serde(default)]
    pub reference: Option<String>,
}

/// Everything the booking flow has collected so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingForm {
    /// Identifies this booking attempt across reloads
    pub session_id: String,
    pub current_step: BookingStep,
    /// Furthest step the user has reached (bounds backward/forward jumps)
    pub furthest_step: BookingStep,
    #[serde(default)]
    pub plan: Option<PlanSelection>,
    #[serde(default)]
    pub patient: Option<PatientDetails>,
    #[serde(default)]
    pub slot: Option<SlotSelection>,
    #[serde(default)]
    pub payment: Option<PaymentSelection>,
}

impl Default for BookingForm {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingForm {
    /// Start a fresh booking at the plan step.
    pub fn new() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            current_step: BookingStep::Plan,
            furthest_step: BookingStep::Plan,
            plan: None,
            patient: None,
            slot: None,
            payment: None,
        }
    }

    /// Whether the selection a step collects has been made.
    /// The review step has nothing to collect and is always complete.
    pub fn is_step_complete(&self, step: BookingStep) -> bool {
        match step {
            BookingStep::Plan => self.plan.is_some(),
            BookingStep::Patient => self.patient.is_some(),
            BookingStep::Slot => self.slot.is_some(),
            BookingStep::Payment => self.payment.is_some(),
            BookingStep::Review => true,
        }
    }

    /// First step whose selection is still missing.
    pub fn first_incomplete_step(&self) -> Option<BookingStep> {
        BookingStep::ALL
            .into_iter()
            .find(|step| !self.is_step_complete(*step))
    }

    pub fn is_complete(&self) -> bool {
        self.first_incomplete_step().is_none()
    }

    /// Move to `step`, extending the furthest-reached marker.
    pub fn move_to(&mut self, step: BookingStep) {
        self.current_step = step;
        if step > self.furthest_step {
            self.furthest_step = step;
        }
    }

    /// Pull the current and furthest-reached steps back to at most `step`.
    pub fn rewind_to(&mut self, step: BookingStep) {
        self.current_step = self.current_step.min(step);
        self.furthest_step = self.furthest_step.min(step);
    }

    /// Rewind past any step whose selection is missing, so progress never
    /// sits beyond the first incomplete step.
    pub fn reconcile_progress(&mut self) {
        if let Some(missing) = self.first_incomplete_step() {
            self.rewind_to(missing);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patient(email: &str) -> PatientDetails {
        PatientDetails {
            full_name: "Ada Lovelace".into(),
            email: email.into(),
            phone: "+44 20 7946 0000".into(),
            date_of_birth: None,
            notes: None,
        }
    }

    #[test]
    fn test_step_order() {
        assert!(BookingStep::Plan < BookingStep::Review);
        assert_eq!(BookingStep::Plan.next(), Some(BookingStep::Patient));
        assert_eq!(BookingStep::Review.next(), None);
        assert_eq!(BookingStep::Plan.previous(), None);
    }

    #[test]
    fn test_step_parse() {
        for step in BookingStep::ALL {
            assert_eq!(BookingStep::parse(step.as_str()), Some(step));
        }
        assert_eq!(BookingStep::parse("checkout"), None);
    }

    #[test]
    fn test_new_form() {
        let form = BookingForm::new();
        assert_eq!(form.current_step, BookingStep::Plan);
        assert_eq!(form.session_id.len(), 36);
        assert_eq!(form.first_incomplete_step(), Some(BookingStep::Plan));
        assert!(!form.is_complete());
    }

    #[test]
    fn test_move_to_tracks_furthest() {
        let mut form = BookingForm::new();
        form.move_to(BookingStep::Slot);
        form.move_to(BookingStep::Patient);
        assert_eq!(form.current_step, BookingStep::Patient);
        assert_eq!(form.furthest_step, BookingStep::Slot);
    }

    #[test]
    fn test_reconcile_progress_rewinds_to_missing_step() {
        let mut form = BookingForm::new();
        form.move_to(BookingStep::Review);
        form.reconcile_progress();
        assert_eq!(form.current_step, BookingStep::Plan);
        assert_eq!(form.furthest_step, BookingStep::Plan);
    }

    #[test]
    fn test_rewind_keeps_earlier_position() {
        let mut form = BookingForm::new();
        form.move_to(BookingStep::Review);
        form.move_to(BookingStep::Patient);
        form.rewind_to(BookingStep::Slot);
        assert_eq!(form.current_step, BookingStep::Patient);
        assert_eq!(form.furthest_step, BookingStep::Slot);
    }

    #[test]
    fn test_patient_validation() {
        assert!(patient("ada@example.com").validate().is_ok());
        assert!(patient("ada.example.com").validate().is_err());
        assert!(patient("@example.com").validate().is_err());

        let mut nameless = patient("ada@example.com");
        nameless.full_name = "  ".into();
        assert!(nameless.validate().is_err());
    }

    #[test]
    fn test_serde_shape() {
        let form = BookingForm::new();
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value["currentStep"], "plan");
        assert!(value["plan"].is_null());
    }
}
