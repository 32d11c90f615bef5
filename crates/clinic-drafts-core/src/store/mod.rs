//! Draft stores with debounced local persistence.

mod autosave;
mod booking;
mod notes;

pub use autosave::*;
pub use booking::*;
pub use notes::*;

use thiserror::Error;

use crate::models::BookingStep;

/// Draft store errors.
#[derive(Error, Debug)]
pub enum DraftError {
    #[error("Form path must contain at least one key")]
    EmptyPath,

    #[error("Step not complete: {0}")]
    StepIncomplete(BookingStep),

    #[error("Step not reached yet: {0}")]
    StepNotReached(BookingStep),

    #[error("Already at the last step")]
    AlreadyAtLastStep,

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DraftResult<T> = Result<T, DraftError>;
