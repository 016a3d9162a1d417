use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::models::entitlement::{DeviceSummary, EntitlementStatus};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Expected outcomes of the device seat enforcer and entitlement mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementError {
    #[error("No active subscription.")]
    NotFound,
    #[error("No active subscription.")]
    Inactive { status: EntitlementStatus },
    #[error("Subscription expired.")]
    Expired { expires_at: DateTime<Utc> },
    #[error("Seat limit reached. Deactivate a device to free a seat.")]
    SeatLimitReached {
        seats: u32,
        active_devices: Vec<DeviceSummary>,
    },
    #[error("Device is not active for this product.")]
    DeviceNotActive,
}

impl EntitlementError {
    pub fn code(&self) -> &'static str {
        match self {
            EntitlementError::NotFound => "ENTITLEMENT_NOT_FOUND",
            EntitlementError::Inactive { .. } => "ENTITLEMENT_INACTIVE",
            EntitlementError::Expired { .. } => "ENTITLEMENT_EXPIRED",
            EntitlementError::SeatLimitReached { .. } => "SEAT_LIMIT_REACHED",
            EntitlementError::DeviceNotActive => "DEVICE_NOT_ACTIVE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            EntitlementError::NotFound
            | EntitlementError::Inactive { .. }
            | EntitlementError::Expired { .. } => StatusCode::FORBIDDEN,
            EntitlementError::SeatLimitReached { .. } => StatusCode::CONFLICT,
            EntitlementError::DeviceNotActive => StatusCode::NOT_FOUND,
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            EntitlementError::Inactive { status } => Some(json!({ "status": status })),
            EntitlementError::Expired { expires_at } => Some(json!({ "expiresAt": expires_at })),
            EntitlementError::SeatLimitReached {
                seats,
                active_devices,
            } => Some(json!({ "seats": seats, "activeDevices": active_devices })),
            EntitlementError::NotFound | EntitlementError::DeviceNotActive => None,
        }
    }
}

/// Rejections produced by the request-time access guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("No active subscription.")]
    NoSubscription,
    #[error("Subscription expired.")]
    SubscriptionExpired,
}

impl AccessDenied {
    pub fn code(&self) -> &'static str {
        match self {
            AccessDenied::NoSubscription => "NO_SUBSCRIPTION",
            AccessDenied::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
    Entitlement(EntitlementError),
    Access(AccessDenied),
    /// Optimistic-lock mismatch; the caller must re-fetch and retry.
    VersionConflict,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string(), None),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                msg,
                "UNAUTHORIZED".to_string(),
                None,
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN".to_string(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT".to_string(), None),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "BAD_REQUEST".to_string(),
                None,
            ),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(json!({ "errors": errors })),
            ),
            AppError::Entitlement(err) => (
                err.status(),
                err.to_string(),
                err.code().to_string(),
                err.details(),
            ),
            AppError::Access(denied) => (
                StatusCode::FORBIDDEN,
                denied.to_string(),
                denied.code().to_string(),
                None,
            ),
            AppError::VersionConflict => (
                StatusCode::CONFLICT,
                "The record was modified concurrently; re-fetch and retry".to_string(),
                "VERSION_CONFLICT".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            _ => AppError::InternalServerError(err.into()),
        }
    }
}

impl From<EntitlementError> for AppError {
    fn from(err: EntitlementError) -> Self {
        AppError::Entitlement(err)
    }
}

impl From<AccessDenied> for AppError {
    fn from(denied: AccessDenied) -> Self {
        AppError::Access(denied)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages = Vec::new();
        collect_validation_messages("", &errors, &mut messages);
        messages.sort();
        AppError::Validation(messages)
    }
}

impl From<validator::ValidationError> for AppError {
    fn from(error: validator::ValidationError) -> Self {
        AppError::Validation(vec![error.code.to_string()])
    }
}

fn collect_validation_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.extend(errs.iter().map(|e| format!("{}: {}", path, e.code)));
            }
            ValidationErrorsKind::Struct(inner) => collect_validation_messages(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_validation_messages(&format!("{}[{}]", path, index), inner, out);
                }
            }
        }
    }
}
