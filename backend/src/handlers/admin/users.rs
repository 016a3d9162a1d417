use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{
        entitlement::{
            AdminResetDeviceRequest, AdminSetEntitlementRequest, EntitlementSummary,
            ResetDeviceResponse,
        },
        user::{AdminDisableUserRequest, AdminUserEntitlements, EmailQuery, UserResponse},
        PaginatedResponse, PaginationQuery,
    },
    services::entitlements,
    state::AppState,
    validation::validate_payload,
};

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, AppError> {
    let (users, total) = state.users.list(page.limit(), page.offset()).await?;
    Ok(Json(PaginatedResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
        total,
        page.limit(),
        page.offset(),
    )))
}

pub async fn user_entitlements(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<AdminUserEntitlements>, AppError> {
    let user = state
        .users
        .find_by_email(&query.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    let now = Utc::now();
    let entitlements = user
        .entitlements
        .iter()
        .map(|entitlement| EntitlementSummary::from_entitlement(entitlement, now))
        .collect();
    Ok(Json(AdminUserEntitlements {
        user: UserResponse::from(&user),
        entitlements,
    }))
}

pub async fn set_entitlement(
    State(state): State<AppState>,
    Json(payload): Json<AdminSetEntitlementRequest>,
) -> Result<Json<EntitlementSummary>, AppError> {
    validate_payload(&payload)?;
    let now = Utc::now();
    let user = entitlements::admin_set_entitlement(state.users.as_ref(), &payload, now).await?;
    let entitlement = user.entitlement(&payload.product_key).ok_or_else(|| {
        AppError::InternalServerError(anyhow::anyhow!("entitlement missing after override"))
    })?;
    Ok(Json(EntitlementSummary::from_entitlement(entitlement, now)))
}

pub async fn reset_device(
    State(state): State<AppState>,
    Json(payload): Json<AdminResetDeviceRequest>,
) -> Result<Json<ResetDeviceResponse>, AppError> {
    validate_payload(&payload)?;
    let (user, revoked) = entitlements::admin_reset_device(
        state.users.as_ref(),
        &payload.email,
        &payload.product_key,
        Utc::now(),
    )
    .await?;
    Ok(Json(ResetDeviceResponse {
        email: user.email,
        product_key: payload.product_key,
        revoked,
    }))
}

pub async fn disable_user(
    State(state): State<AppState>,
    Json(payload): Json<AdminDisableUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    validate_payload(&payload)?;
    let user =
        entitlements::set_disabled(state.users.as_ref(), &payload.email, payload.disabled).await?;
    Ok(Json(UserResponse::from(user)))
}
