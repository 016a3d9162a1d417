use axum::{
    extract::{Extension, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    models::{
        entitlement::{
            ActivateDeviceRequest, DeactivateDeviceRequest, DeviceSummary, Entitlement,
            EntitlementSummary,
        },
        user::User,
    },
    services::{entitlements, seats::ActivationOutcome},
    state::AppState,
    utils::license::issue_license_token,
    validation::validate_payload,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LicenseResponse {
    pub license_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Raw entitlement records, device history included.
pub async fn my_entitlements(Extension(user): Extension<User>) -> Json<Vec<Entitlement>> {
    Json(user.entitlements.to_vec())
}

pub async fn my_license(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<LicenseResponse>, AppError> {
    let now = Utc::now();
    let ttl = Duration::days(state.config.license_token_ttl_days);
    let license_token = issue_license_token(&user, &state.config.license_secret, ttl, now)?;
    Ok(Json(LicenseResponse {
        license_token,
        expires_at: now + ttl,
    }))
}

pub async fn list_entitlements(Extension(user): Extension<User>) -> Json<Vec<EntitlementSummary>> {
    let now = Utc::now();
    Json(
        user.entitlements
            .iter()
            .map(|entitlement| EntitlementSummary::from_entitlement(entitlement, now))
            .collect(),
    )
}

pub async fn activate(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ActivateDeviceRequest>,
) -> Result<Json<ActivationOutcome>, AppError> {
    validate_payload(&payload)?;
    let outcome =
        entitlements::activate_device(state.users.as_ref(), user.id, &payload, Utc::now()).await?;
    Ok(Json(outcome))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<DeactivateDeviceRequest>,
) -> Result<Json<DeviceSummary>, AppError> {
    validate_payload(&payload)?;
    let device =
        entitlements::deactivate_device(state.users.as_ref(), user.id, &payload, Utc::now())
            .await?;
    Ok(Json(device))
}

/// Served behind the entitlement guard, which supplies the record.
pub async fn access_summary(
    Extension(entitlement): Extension<Entitlement>,
) -> Json<EntitlementSummary> {
    Json(EntitlementSummary::from_entitlement(&entitlement, Utc::now()))
}
