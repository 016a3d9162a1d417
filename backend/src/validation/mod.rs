//! Unified validation framework for request payloads.
//!
//! This module provides reusable validation rules and utilities
//! to ensure consistent input validation across all API endpoints.

pub mod rules;

pub use validator::Validate;

use crate::error::AppError;

/// Runs derive-based validation and maps failures to `AppError::Validation`.
pub fn validate_payload<T: Validate>(payload: &T) -> Result<(), AppError> {
    payload.validate().map_err(AppError::from)
}
