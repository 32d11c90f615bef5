//! Wire records exchanged with the clinic backend.
//!
//! The stores never call the backend themselves. Page-level callers fetch
//! server notes to seed [`DoctorNotesStore::mount`](crate::store::DoctorNotesStore::mount)
//! and submit the payloads built here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{FormData, PatientDetails, PaymentSelection};

/// Response of the doctor-notes fetch endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorNotesResponse {
    pub success: bool,
    #[serde(default)]
    pub doctor_notes: Option<DoctorNotesBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorNotesBody {
    #[serde(default)]
    pub form_data: Value,
}

impl DoctorNotesResponse {
    /// Parse a raw response body.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Server form data to seed a store with. `None` unless the request
    /// succeeded and carried an object.
    pub fn initial_form_data(&self) -> Option<FormData> {
        if !self.success {
            return None;
        }
        self.doctor_notes
            .as_ref()
            .and_then(|notes| FormData::from_value(notes.form_data.clone()))
    }
}

/// Body posted to the doctor-notes submission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DoctorNotesSubmission {
    pub appointment_id: String,
    pub form_data: FormData,
}

impl DoctorNotesSubmission {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Body posted to the appointments endpoint to confirm a booking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub session_id: String,
    pub plan_id: String,
    pub slot_id: String,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub patient: PatientDetails,
    pub payment: PaymentSelection,
}

impl BookingRequest {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
