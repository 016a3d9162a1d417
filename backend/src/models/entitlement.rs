//! Per-user product entitlements and the devices bound to them.
//!
//! Entitlements live inside the user document. Older documents store them as
//! an array (possibly with duplicate product keys) and bind a single device
//! through flat `deviceFingerprint`/`deviceBoundAt` fields; both shapes are
//! normalised here on deserialisation so nothing downstream sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
/// Stored status of an entitlement.
pub enum EntitlementStatus {
    /// Granted, subject to `expiresAt`.
    Active,
    /// Never granted or switched off without a ban.
    #[default]
    Inactive,
    /// Administrative override that denies access regardless of expiry.
    Disabled,
}

impl EntitlementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntitlementStatus::Active => "active",
            EntitlementStatus::Inactive => "inactive",
            EntitlementStatus::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
/// Status as observed at a given instant, folding expiry into `Active`.
pub enum EffectiveStatus {
    Active,
    Expired,
    Inactive,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// A device installation occupying (or having occupied) one seat.
pub struct DeviceBinding {
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub bound_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Revoked bindings stay for audit history but no longer hold a seat.
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl DeviceBinding {
    pub fn new(fingerprint: String, name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            fingerprint,
            name,
            bound_at: now,
            last_seen_at: now,
            revoked_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.revoked_at.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Public view of an active device binding.
pub struct DeviceSummary {
    pub fingerprint: String,
    pub name: Option<String>,
    pub bound_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl From<&DeviceBinding> for DeviceSummary {
    fn from(device: &DeviceBinding) -> Self {
        Self {
            fingerprint: device.fingerprint.clone(),
            name: device.name.clone(),
            bound_at: device.bound_at,
            last_seen_at: device.last_seen_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", from = "StoredEntitlement")]
/// A user's right to one product: time-boxed, seat-limited, device-bound.
pub struct Entitlement {
    pub product_key: String,
    pub status: EntitlementStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub seats: u32,
    pub devices: Vec<DeviceBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_type: Option<String>,
}

impl Entitlement {
    /// Fresh, inactive record with one seat and no devices.
    pub fn new(product_key: impl Into<String>) -> Self {
        Self {
            product_key: product_key.into(),
            status: EntitlementStatus::Inactive,
            expires_at: None,
            seats: 1,
            devices: Vec::new(),
            license_type: None,
        }
    }

    /// `status == active && (expiresAt is null || expiresAt > now)`.
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        self.status == EntitlementStatus::Active && !self.is_expired(now)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn effective_status(&self, now: DateTime<Utc>) -> EffectiveStatus {
        match self.status {
            EntitlementStatus::Active if self.is_expired(now) => EffectiveStatus::Expired,
            EntitlementStatus::Active => EffectiveStatus::Active,
            EntitlementStatus::Inactive => EffectiveStatus::Inactive,
            EntitlementStatus::Disabled => EffectiveStatus::Disabled,
        }
    }

    pub fn active_devices(&self) -> impl Iterator<Item = &DeviceBinding> {
        self.devices.iter().filter(|device| device.is_active())
    }

    pub fn seats_used(&self) -> usize {
        self.active_devices().count()
    }

    pub fn active_device_mut(&mut self, fingerprint: &str) -> Option<&mut DeviceBinding> {
        self.devices
            .iter_mut()
            .find(|device| device.is_active() && device.fingerprint == fingerprint)
    }

    pub fn device_summaries(&self) -> Vec<DeviceSummary> {
        self.active_devices().map(DeviceSummary::from).collect()
    }

    /// Merges a duplicate record for the same product found in legacy data.
    /// The record reaching further into the future wins; seats take the max.
    fn absorb(&mut self, other: Entitlement) {
        let other_later = match (self.expires_at, other.expires_at) {
            (_, None) => other.status == EntitlementStatus::Active,
            (None, Some(_)) => false,
            (Some(mine), Some(theirs)) => theirs > mine,
        };
        let seats = self.seats.max(other.seats);
        let (mut winner, loser) = if other_later {
            (other, std::mem::replace(self, Entitlement::new(String::new())))
        } else {
            (std::mem::replace(self, Entitlement::new(String::new())), other)
        };
        winner.seats = seats;
        for device in loser.devices {
            if !winner
                .devices
                .iter()
                .any(|existing| existing.fingerprint == device.fingerprint)
            {
                winner.devices.push(device);
            }
        }
        *self = winner;
    }
}

fn default_seats() -> u32 {
    1
}

/// On-disk shape, tolerating the flat single-device fields of older records.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntitlement {
    product_key: String,
    #[serde(default)]
    status: EntitlementStatus,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_seats")]
    seats: u32,
    #[serde(default)]
    devices: Vec<DeviceBinding>,
    #[serde(default)]
    license_type: Option<String>,
    #[serde(default)]
    device_fingerprint: Option<String>,
    #[serde(default)]
    device_bound_at: Option<DateTime<Utc>>,
}

impl From<StoredEntitlement> for Entitlement {
    fn from(stored: StoredEntitlement) -> Self {
        let mut devices = stored.devices;
        if let Some(fingerprint) = stored
            .device_fingerprint
            .filter(|fingerprint| !fingerprint.trim().is_empty())
        {
            if !devices.iter().any(|device| device.fingerprint == fingerprint) {
                let bound_at = stored.device_bound_at.unwrap_or(DateTime::UNIX_EPOCH);
                devices.push(DeviceBinding::new(fingerprint, None, bound_at));
            }
        }

        Entitlement {
            product_key: stored.product_key,
            status: stored.status,
            expires_at: stored.expires_at,
            seats: stored.seats.max(1),
            devices,
            license_type: stored.license_type,
        }
    }
}

/// Entitlements keyed by product; at most one record per product by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementSet(BTreeMap<String, Entitlement>);

impl EntitlementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, product_key: &str) -> Option<&Entitlement> {
        self.0.get(product_key)
    }

    pub fn get_mut(&mut self, product_key: &str) -> Option<&mut Entitlement> {
        self.0.get_mut(product_key)
    }

    /// Returns the record for `product_key`, creating an inactive one if needed.
    pub fn get_or_insert(&mut self, product_key: &str) -> &mut Entitlement {
        self.0
            .entry(product_key.to_string())
            .or_insert_with(|| Entitlement::new(product_key))
    }

    pub fn contains(&self, product_key: &str) -> bool {
        self.0.contains_key(product_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entitlement> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Entitlement> {
        self.0.values().cloned().collect()
    }

    fn insert_merging(&mut self, entitlement: Entitlement) {
        match self.0.get_mut(&entitlement.product_key) {
            Some(existing) => existing.absorb(entitlement),
            None => {
                self.0.insert(entitlement.product_key.clone(), entitlement);
            }
        }
    }
}

impl FromIterator<Entitlement> for EntitlementSet {
    fn from_iter<I: IntoIterator<Item = Entitlement>>(iter: I) -> Self {
        let mut set = EntitlementSet::new();
        for entitlement in iter {
            set.insert_merging(entitlement);
        }
        set
    }
}

impl Serialize for EntitlementSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.0.values())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredEntitlementSet {
    List(Vec<Entitlement>),
    Map(BTreeMap<String, Entitlement>),
}

impl<'de> Deserialize<'de> for EntitlementSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let stored = Option::<StoredEntitlementSet>::deserialize(deserializer)?;
        Ok(match stored {
            None => EntitlementSet::new(),
            Some(StoredEntitlementSet::List(list)) => list.into_iter().collect(),
            Some(StoredEntitlementSet::Map(map)) => map
                .into_iter()
                .map(|(key, mut entitlement)| {
                    entitlement.product_key = key;
                    entitlement
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Entitlement view with computed seat usage, returned by `GET /api/entitlements`.
pub struct EntitlementSummary {
    pub product_key: String,
    pub status: EntitlementStatus,
    pub effective_status: EffectiveStatus,
    pub has_access: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub seats: u32,
    pub seats_used: usize,
    pub license_type: Option<String>,
    pub active_devices: Vec<DeviceSummary>,
}

impl EntitlementSummary {
    pub fn from_entitlement(entitlement: &Entitlement, now: DateTime<Utc>) -> Self {
        Self {
            product_key: entitlement.product_key.clone(),
            status: entitlement.status,
            effective_status: entitlement.effective_status(now),
            has_access: entitlement.has_access(now),
            expires_at: entitlement.expires_at,
            seats: entitlement.seats,
            seats_used: entitlement.seats_used(),
            license_type: entitlement.license_type.clone(),
            active_devices: entitlement.device_summaries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivateDeviceRequest {
    #[validate(custom(function = "crate::validation::rules::validate_product_key"))]
    pub product_key: String,
    #[validate(custom(function = "crate::validation::rules::validate_fingerprint"))]
    pub device_fingerprint: String,
    #[validate(length(max = 120))]
    pub device_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateDeviceRequest {
    #[validate(custom(function = "crate::validation::rules::validate_product_key"))]
    pub product_key: String,
    #[validate(custom(function = "crate::validation::rules::validate_fingerprint"))]
    pub device_fingerprint: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Manual grant or override of one user's entitlement.
pub struct AdminSetEntitlementRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "crate::validation::rules::validate_product_key"))]
    pub product_key: String,
    /// Months to add; `0` or absent leaves the expiry alone.
    #[validate(range(max = 120))]
    pub months: Option<u32>,
    pub status: EntitlementStatus,
    /// Replaces the seat count exactly when present.
    #[validate(range(min = 1, max = 1000))]
    pub seats: Option<u32>,
    pub license_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminResetDeviceRequest {
    #[validate(email)]
    pub email: String,
    #[validate(custom(function = "crate::validation::rules::validate_product_key"))]
    pub product_key: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResetDeviceResponse {
    pub email: String,
    pub product_key: String,
    pub revoked: usize,
}
