//! Catalog entries and discount coupons used to price checkout carts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::rules::validate_product_key;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub key: String,
    pub name: String,
    /// Price of one seat for one month, in minor units.
    pub monthly_price: i64,
    /// Price of one seat for one year, in minor units.
    pub yearly_price: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProduct {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(range(min = 0))]
    pub monthly_price: i64,
    #[validate(range(min = 0))]
    pub yearly_price: i64,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl UpsertProduct {
    pub fn into_product(
        self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<Product, validator::ValidationError> {
        validate_product_key(key)?;
        Ok(Product {
            key: key.to_string(),
            name: self.name,
            monthly_price: self.monthly_price,
            yearly_price: self.yearly_price,
            active: self.active,
            created_at: now,
            updated_at: now,
        })
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Stored uppercase; lookups are case-insensitive.
    pub code: String,
    pub percent_off: i32,
    pub max_redemptions: Option<i32>,
    pub redemptions: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        self.active
            && self.expires_at.map_or(true, |expires_at| expires_at > now)
            && self
                .max_redemptions
                .map_or(true, |max| self.redemptions < max)
    }
}

pub fn normalize_coupon_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCoupon {
    #[validate(length(min = 3, max = 40))]
    pub code: String,
    #[validate(range(min = 1, max = 100))]
    pub percent_off: i32,
    #[validate(range(min = 1))]
    pub max_redemptions: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateCoupon {
    pub fn into_coupon(self, now: DateTime<Utc>) -> Coupon {
        Coupon {
            code: normalize_coupon_code(&self.code),
            percent_off: self.percent_off,
            max_redemptions: self.max_redemptions,
            redemptions: 0,
            expires_at: self.expires_at,
            active: true,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon() -> Coupon {
        CreateCoupon {
            code: " launch10 ".into(),
            percent_off: 10,
            max_redemptions: Some(2),
            expires_at: None,
        }
        .into_coupon(Utc::now())
    }

    #[test]
    fn coupon_codes_are_uppercased() {
        assert_eq!(coupon().code, "LAUNCH10");
    }

    #[test]
    fn coupon_redeemability_checks_cap_expiry_and_flag() {
        let now = Utc::now();
        let mut c = coupon();
        assert!(c.is_redeemable(now));

        c.redemptions = 2;
        assert!(!c.is_redeemable(now));

        c.redemptions = 0;
        c.expires_at = Some(now - Duration::minutes(1));
        assert!(!c.is_redeemable(now));

        c.expires_at = None;
        c.active = false;
        assert!(!c.is_redeemable(now));
    }

    #[test]
    fn product_keys_are_validated_on_upsert() {
        let payload = UpsertProduct {
            name: "RateGen".into(),
            monthly_price: 5_000_00,
            yearly_price: 50_000_00,
            active: true,
        };
        assert!(payload.clone().into_product("rate gen", Utc::now()).is_err());
        let product = payload.into_product("rategen", Utc::now()).expect("product");
        assert_eq!(product.key, "rategen");
    }
}
