//! Device seat enforcement over a single entitlement.
//!
//! These functions only mutate the in-memory document; callers persist the
//! owning user with a version-checked write so concurrent activations cannot
//! oversell the last seat.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::EntitlementError,
    models::entitlement::{DeviceBinding, DeviceSummary, Entitlement, EntitlementStatus},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivationOutcome {
    pub product_key: String,
    /// `false` when the fingerprint already held a seat.
    pub newly_bound: bool,
    pub seats: u32,
    pub seats_used: usize,
    pub expires_at: Option<DateTime<Utc>>,
    pub device: DeviceSummary,
}

/// Binds `fingerprint` to a seat, or refreshes an existing binding.
pub fn activate(
    entitlement: Option<&mut Entitlement>,
    fingerprint: &str,
    name: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ActivationOutcome, EntitlementError> {
    let entitlement = entitlement.ok_or(EntitlementError::NotFound)?;
    if entitlement.status != EntitlementStatus::Active {
        return Err(EntitlementError::Inactive {
            status: entitlement.status,
        });
    }
    if let Some(expires_at) = entitlement.expires_at.filter(|expires_at| *expires_at <= now) {
        return Err(EntitlementError::Expired { expires_at });
    }

    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);

    let newly_bound = if let Some(device) = entitlement.active_device_mut(fingerprint) {
        device.last_seen_at = now;
        if name.is_some() {
            device.name = name;
        }
        false
    } else {
        if entitlement.seats_used() >= entitlement.seats as usize {
            return Err(EntitlementError::SeatLimitReached {
                seats: entitlement.seats,
                active_devices: entitlement.device_summaries(),
            });
        }
        entitlement
            .devices
            .push(DeviceBinding::new(fingerprint.to_string(), name, now));
        true
    };

    let device = entitlement
        .active_devices()
        .find(|device| device.fingerprint == fingerprint)
        .map(DeviceSummary::from)
        .ok_or(EntitlementError::DeviceNotActive)?;

    Ok(ActivationOutcome {
        product_key: entitlement.product_key.clone(),
        newly_bound,
        seats: entitlement.seats,
        seats_used: entitlement.seats_used(),
        expires_at: entitlement.expires_at,
        device,
    })
}

/// Frees the seat held by `fingerprint`; the binding is kept for history.
pub fn deactivate(
    entitlement: Option<&mut Entitlement>,
    fingerprint: &str,
    now: DateTime<Utc>,
) -> Result<DeviceSummary, EntitlementError> {
    let device = entitlement
        .and_then(|entitlement| entitlement.active_device_mut(fingerprint))
        .ok_or(EntitlementError::DeviceNotActive)?;
    device.revoked_at = Some(now);
    Ok(DeviceSummary::from(&*device))
}

/// Revokes every active binding at once. Returns how many were revoked.
pub fn revoke_all(entitlement: &mut Entitlement, now: DateTime<Utc>) -> usize {
    let mut revoked = 0;
    for device in entitlement
        .devices
        .iter_mut()
        .filter(|device| device.is_active())
    {
        device.revoked_at = Some(now);
        revoked += 1;
    }
    revoked
}
