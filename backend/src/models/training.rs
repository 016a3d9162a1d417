//! Physical training events, their enrollments, and the grants they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{EnrollmentId, TrainingId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Entitlement handed out when a trainee's installation is completed.
pub struct EntitlementGrant {
    #[validate(custom(function = "crate::validation::rules::validate_product_key"))]
    pub product_key: String,
    #[validate(range(min = 1, max = 120))]
    pub months: u32,
    #[serde(default = "default_seats")]
    #[validate(range(min = 1, max = 100))]
    pub seats: u32,
    #[serde(default)]
    pub license_type: Option<String>,
}

fn default_seats() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Training {
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub id: TrainingId,
    pub title: String,
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub capacity: i32,
    /// Minor currency units.
    pub price: i64,
    #[sqlx(json)]
    pub entitlement_grants: Vec<EntitlementGrant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTraining {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[validate(range(min = 1, max = 10000))]
    pub capacity: i32,
    #[validate(range(min = 0))]
    pub price: i64,
    #[serde(default)]
    #[validate(nested)]
    pub entitlement_grants: Vec<EntitlementGrant>,
}

impl CreateTraining {
    pub fn into_training(self, now: DateTime<Utc>) -> Training {
        Training {
            id: TrainingId::new(),
            title: self.title,
            location: self.location,
            starts_at: self.starts_at,
            capacity: self.capacity,
            price: self.price,
            entitlement_grants: self.entitlement_grants,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResponse {
    #[serde(flatten)]
    pub training: Training,
    pub enrolled: i64,
    pub seats_left: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    PendingPayment,
    PaymentConfirmed,
    InstallationComplete,
    Cancelled,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::PendingPayment => "pending_payment",
            EnrollmentStatus::PaymentConfirmed => "payment_confirmed",
            EnrollmentStatus::InstallationComplete => "installation_complete",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the enrollment occupies a place in the training.
    pub fn holds_place(&self) -> bool {
        !matches!(self, EnrollmentStatus::Cancelled)
    }
}

impl TryFrom<String> for EnrollmentStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending_payment" => Ok(EnrollmentStatus::PendingPayment),
            "payment_confirmed" => Ok(EnrollmentStatus::PaymentConfirmed),
            "installation_complete" => Ok(EnrollmentStatus::InstallationComplete),
            "cancelled" => Ok(EnrollmentStatus::Cancelled),
            other => Err(format!("unknown enrollment status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrainingEnrollment {
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub id: EnrollmentId,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub training_id: TrainingId,
    #[sqlx(try_from = "String")]
    #[schema(value_type = String)]
    pub user_id: UserId,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub status: EnrollmentStatus,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub installation_completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingEnrollment {
    pub fn new(
        training_id: TrainingId,
        user_id: UserId,
        email: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EnrollmentId::new(),
            training_id,
            user_id,
            email,
            status: EnrollmentStatus::PendingPayment,
            payment_confirmed_at: None,
            installation_completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
