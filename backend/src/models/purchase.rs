//! Purchases created by checkout and consumed once by staff approval.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{PurchaseId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Approved,
    Rejected,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Approved => "approved",
            PurchaseStatus::Rejected => "rejected",
        }
    }
}

impl TryFrom<String> for PurchaseStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(PurchaseStatus::Pending),
            "approved" => Ok(PurchaseStatus::Approved),
            "rejected" => Ok(PurchaseStatus::Rejected),
            other => Err(format!("unknown purchase status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    #[default]
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn months_per_period(&self) -> u32 {
        match self {
            BillingInterval::Monthly => 1,
            BillingInterval::Yearly => 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// One cart line; `qty` is the number of seats requested.
pub struct PurchaseLine {
    #[validate(custom(function = "crate::validation::rules::validate_product_key"))]
    pub product_key: String,
    #[validate(range(min = 1, max = 100))]
    pub qty: u32,
    #[validate(range(min = 1, max = 36))]
    pub periods: u32,
    #[serde(default)]
    pub billing_interval: BillingInterval,
    #[serde(default)]
    pub license_type: Option<String>,
}

impl PurchaseLine {
    pub fn months(&self) -> u32 {
        self.periods
            .saturating_mul(self.billing_interval.months_per_period())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
/// What was bought. Single-product purchases predate carts.
pub enum PurchaseItems {
    Cart {
        lines: Vec<PurchaseLine>,
    },
    Legacy {
        #[serde(rename = "productKey")]
        product_key: String,
        #[serde(rename = "requestedMonths")]
        requested_months: u32,
        #[serde(rename = "approvedMonths")]
        approved_months: Option<u32>,
    },
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    #[schema(value_type = String)]
    pub id: PurchaseId,
    #[schema(value_type = String)]
    pub user_id: UserId,
    pub email: String,
    pub items: PurchaseItems,
    pub coupon_code: Option<String>,
    /// Amounts are in minor currency units.
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub currency: String,
    pub status: PurchaseStatus,
    #[schema(value_type = Option<String>)]
    pub decided_by: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Purchase {
    pub fn is_pending(&self) -> bool {
        self.status == PurchaseStatus::Pending
    }
}

/// Column layout of the `purchases` table.
#[derive(Debug, FromRow)]
pub struct PurchaseRow {
    pub id: String,
    pub user_id: String,
    pub email: String,
    pub lines: Option<sqlx::types::Json<Vec<PurchaseLine>>>,
    pub product_key: Option<String>,
    pub requested_months: Option<i32>,
    pub approved_months: Option<i32>,
    pub coupon_code: Option<String>,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub currency: String,
    pub status: String,
    pub decided_by: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PurchaseRow> for Purchase {
    type Error = anyhow::Error;

    fn try_from(row: PurchaseRow) -> Result<Self, Self::Error> {
        let items = match (row.lines, row.product_key) {
            (Some(lines), _) => PurchaseItems::Cart { lines: lines.0 },
            (None, Some(product_key)) => PurchaseItems::Legacy {
                product_key,
                requested_months: non_negative(row.requested_months.unwrap_or(0)),
                approved_months: row.approved_months.map(non_negative),
            },
            (None, None) => anyhow::bail!("purchase {} has neither lines nor product_key", row.id),
        };

        Ok(Purchase {
            id: row.id.parse()?,
            user_id: row.user_id.parse()?,
            email: row.email,
            items,
            coupon_code: row.coupon_code,
            subtotal: row.subtotal,
            discount: row.discount,
            total: row.total,
            currency: row.currency,
            status: PurchaseStatus::try_from(row.status).map_err(anyhow::Error::msg)?,
            decided_by: row.decided_by.map(|id| id.parse()).transpose()?,
            decided_at: row.decided_at,
            decision_note: row.decision_note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn non_negative(value: i32) -> u32 {
    value.max(0) as u32
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Cart submitted for pricing or checkout.
pub struct CheckoutRequest {
    #[validate(length(min = 1, max = 20), nested)]
    pub lines: Vec<PurchaseLine>,
    #[serde(default)]
    #[validate(length(min = 1, max = 40))]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuoteLine {
    pub product_key: String,
    pub qty: u32,
    pub periods: u32,
    pub billing_interval: BillingInterval,
    pub unit_price: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
/// Priced cart.
pub struct Quote {
    pub lines: Vec<QuoteLine>,
    pub coupon_code: Option<String>,
    pub percent_off: u32,
    pub subtotal: i64,
    pub discount: i64,
    pub total: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovePurchaseRequest {
    /// Overrides `requestedMonths` on single-product purchases.
    #[validate(range(min = 1, max = 120))]
    pub approved_months: Option<u32>,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectPurchaseRequest {
    #[validate(length(max = 500))]
    pub note: Option<String>,
}
