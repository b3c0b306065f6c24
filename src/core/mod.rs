//! Core types shared by every opm module.
//!
//! Currently this is the error taxonomy and its user-facing rendering; see
//! [`error`] for the variants and the suggestions attached to each.

pub mod error;

pub use error::{ErrorContext, OpmError, user_friendly_error};
