//! Domain models for clinic drafts.

mod booking;
mod draft;
mod form;

pub use booking::*;
pub use draft::*;
pub use form::*;
