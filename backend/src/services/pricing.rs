//! Cart pricing against the product catalog.

use std::collections::HashMap;

use crate::{
    error::AppError,
    models::{
        product::{Coupon, Product},
        purchase::{BillingInterval, PurchaseLine, Quote, QuoteLine},
    },
};

/// Prices `lines` against `catalog` and applies an optional coupon.
///
/// The coupon must already have been checked for redeemability.
pub fn quote(
    lines: &[PurchaseLine],
    catalog: &HashMap<String, Product>,
    coupon: Option<&Coupon>,
    currency: &str,
) -> Result<Quote, AppError> {
    let mut quoted = Vec::with_capacity(lines.len());
    let mut subtotal: i64 = 0;

    for line in lines {
        let product = catalog
            .get(&line.product_key)
            .filter(|product| product.active)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Unknown product: {}", line.product_key))
            })?;
        let unit_price = match line.billing_interval {
            BillingInterval::Monthly => product.monthly_price,
            BillingInterval::Yearly => product.yearly_price,
        };
        let amount = unit_price
            .checked_mul(i64::from(line.periods))
            .and_then(|amount| amount.checked_mul(i64::from(line.qty)))
            .ok_or_else(|| AppError::BadRequest("Cart total is too large".to_string()))?;
        subtotal = subtotal
            .checked_add(amount)
            .ok_or_else(|| AppError::BadRequest("Cart total is too large".to_string()))?;

        quoted.push(QuoteLine {
            product_key: line.product_key.clone(),
            qty: line.qty,
            periods: line.periods,
            billing_interval: line.billing_interval,
            unit_price,
            amount,
        });
    }

    let percent_off = coupon
        .map(|coupon| coupon.percent_off.clamp(0, 100) as u32)
        .unwrap_or(0);
    let discount = (i128::from(subtotal) * i128::from(percent_off) / 100) as i64;

    Ok(Quote {
        lines: quoted,
        coupon_code: coupon.map(|coupon| coupon.code.clone()),
        percent_off,
        subtotal,
        discount,
        total: subtotal - discount,
        currency: currency.to_string(),
    })
}
