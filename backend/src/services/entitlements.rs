//! Entitlement mutations that act on a whole user document.
//!
//! Each operation loads the user, mutates the embedded entitlements in
//! memory and writes the document back with a version check. A concurrent
//! writer makes the save fail with `VersionConflict`; nothing is retried.

use chrono::{DateTime, Utc};

use crate::{
    error::{AppError, EntitlementError},
    models::{
        entitlement::{
            ActivateDeviceRequest, AdminSetEntitlementRequest, DeactivateDeviceRequest,
            DeviceSummary,
        },
        user::User,
    },
    repositories::UserRepository,
    services::{
        expiry,
        seats::{self, ActivationOutcome},
    },
    types::UserId,
};

async fn load_by_id(users: &dyn UserRepository, user_id: UserId) -> Result<User, AppError> {
    users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

async fn load_by_email(users: &dyn UserRepository, email: &str) -> Result<User, AppError> {
    users
        .find_by_email(email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Binds the caller's device to a seat of `request.product_key`.
pub async fn activate_device(
    users: &dyn UserRepository,
    user_id: UserId,
    request: &ActivateDeviceRequest,
    now: DateTime<Utc>,
) -> Result<ActivationOutcome, AppError> {
    let mut user = load_by_id(users, user_id).await?;
    let outcome = seats::activate(
        user.entitlements.get_mut(&request.product_key),
        request.device_fingerprint.trim(),
        request.device_name.as_deref(),
        now,
    )?;
    users.save(&user).await?;

    if outcome.newly_bound {
        tracing::info!(
            user_id = %user_id,
            product_key = %outcome.product_key,
            seats_used = outcome.seats_used,
            seats = outcome.seats,
            "Device bound"
        );
    }
    Ok(outcome)
}

pub async fn deactivate_device(
    users: &dyn UserRepository,
    user_id: UserId,
    request: &DeactivateDeviceRequest,
    now: DateTime<Utc>,
) -> Result<DeviceSummary, AppError> {
    let mut user = load_by_id(users, user_id).await?;
    let device = seats::deactivate(
        user.entitlements.get_mut(&request.product_key),
        request.device_fingerprint.trim(),
        now,
    )?;
    users.save(&user).await?;
    Ok(device)
}

/// Manual grant or override.
///
/// Positive `months` extend (creating the record if needed); the status is
/// set verbatim and `seats`, when given, replaces the seat count.
pub async fn admin_set_entitlement(
    users: &dyn UserRepository,
    request: &AdminSetEntitlementRequest,
    now: DateTime<Utc>,
) -> Result<User, AppError> {
    let mut user = load_by_email(users, &request.email).await?;
    let months = request.months.unwrap_or(0);

    let entitlement = if months > 0 {
        let entitlement = user.entitlements.get_or_insert(&request.product_key);
        entitlement.expires_at = Some(expiry::extend(entitlement.expires_at, months, now));
        entitlement
    } else {
        user.entitlements
            .get_mut(&request.product_key)
            .ok_or(EntitlementError::NotFound)?
    };
    entitlement.status = request.status;
    if let Some(seats) = request.seats {
        entitlement.seats = seats.max(1);
    }
    if let Some(license_type) = &request.license_type {
        entitlement.license_type = Some(license_type.clone());
    }

    let saved = users.save(&user).await?;
    tracing::info!(
        email = %saved.email,
        product_key = %request.product_key,
        months,
        status = request.status.as_str(),
        "Entitlement overridden"
    );
    Ok(saved)
}

/// Revokes every bound device and signs the user out everywhere.
/// Returns the saved user and the number of revoked bindings.
pub async fn admin_reset_device(
    users: &dyn UserRepository,
    email: &str,
    product_key: &str,
    now: DateTime<Utc>,
) -> Result<(User, usize), AppError> {
    let mut user = load_by_email(users, email).await?;
    let entitlement = user
        .entitlements
        .get_mut(product_key)
        .ok_or(EntitlementError::NotFound)?;
    let revoked = seats::revoke_all(entitlement, now);
    user.bump_refresh_version();

    let saved = users.save(&user).await?;
    tracing::info!(email = %saved.email, product_key, revoked, "Devices reset");
    Ok((saved, revoked))
}

/// Toggles the disabled flag; disabling also invalidates outstanding tokens.
pub async fn set_disabled(
    users: &dyn UserRepository,
    email: &str,
    disabled: bool,
) -> Result<User, AppError> {
    let mut user = load_by_email(users, email).await?;
    if user.disabled == disabled {
        return Ok(user);
    }
    user.disabled = disabled;
    if disabled {
        user.bump_refresh_version();
    }
    let saved = users.save(&user).await?;
    tracing::info!(email = %saved.email, disabled, "User disabled flag changed");
    Ok(saved)
}
