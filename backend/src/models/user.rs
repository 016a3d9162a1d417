//! Models that represent users, authentication payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    models::entitlement::{Entitlement, EntitlementSet, EntitlementSummary},
    types::UserId,
};

#[derive(Debug, Clone, FromRow)]
/// The user document. Entitlements are embedded and owned exclusively.
pub struct User {
    #[sqlx(try_from = "String")]
    pub id: UserId,
    /// Lowercased, unique login identifier.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub full_name: String,
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    pub disabled: bool,
    /// Embedded in every token; bumping it invalidates all sessions.
    pub refresh_version: i32,
    #[sqlx(json)]
    pub entitlements: EntitlementSet,
    /// Optimistic-concurrency token checked by every document write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ToSchema, Default)]
/// Supported user roles stored in the database.
pub enum UserRole {
    /// Customer account.
    #[default]
    User,
    /// Full staff privileges.
    Admin,
    /// Staff limited to purchase and training operations.
    MiniAdmin,
}

impl UserRole {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
            UserRole::MiniAdmin => "mini_admin",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            "mini_admin" | "miniadmin" | "mini-admin" => Ok(UserRole::MiniAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for UserRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|_| {
            serde::de::Error::unknown_variant(&s, &["user", "admin", "mini_admin"])
        })
    }
}

impl User {
    /// Constructs a new customer account with no entitlements.
    pub fn new(email: &str, password_hash: String, full_name: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            email: normalize_email(email),
            password_hash,
            full_name,
            role,
            disabled: false,
            refresh_version: 0,
            entitlements: EntitlementSet::new(),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` when the user holds the full `Admin` role.
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    /// Returns `true` for either staff role.
    pub fn is_staff(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::MiniAdmin)
    }

    pub fn entitlement(&self, product_key: &str) -> Option<&Entitlement> {
        self.entitlements.get(product_key)
    }

    /// Invalidates every outstanding access and refresh token.
    pub fn bump_refresh_version(&mut self) {
        self.refresh_version = self.refresh_version.wrapping_add(1);
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload for self-service signup.
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 120))]
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Payload submitted when a user requests to change their password.
pub struct ChangePasswordRequest {
    /// Existing password that will be verified before applying the change.
    pub current_password: String,
    /// Replacement password that will be stored if verification succeeds.
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Tokens returned after a successful login or refresh.
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Offline-verifiable summary of the user's entitlements.
    pub license_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Public-facing representation of a user returned by the API.
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        UserResponse {
            id: user.id.to_string(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role.as_str().to_string(),
            disabled: user.disabled,
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        UserResponse::from(&user)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminDisableUserRequest {
    #[validate(email)]
    pub email: String,
    pub disabled: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// A user's entitlements as seen by staff.
pub struct AdminUserEntitlements {
    pub user: UserResponse,
    pub entitlements: Vec<EntitlementSummary>,
}
