use std::collections::HashMap;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        product::Product,
        purchase::{CheckoutRequest, Purchase, PurchaseItems, PurchaseStatus, Quote},
        user::User,
    },
    services::pricing,
    state::AppState,
    types::PurchaseId,
    validation::validate_payload,
};

async fn price_cart(
    state: &AppState,
    payload: &CheckoutRequest,
    now: DateTime<Utc>,
) -> Result<Quote, AppError> {
    validate_payload(payload)?;

    let catalog: HashMap<String, Product> = state
        .catalog
        .list_products()
        .await?
        .into_iter()
        .map(|product| (product.key.clone(), product))
        .collect();

    let coupon = match payload.coupon_code.as_deref() {
        Some(code) => Some(
            state
                .catalog
                .find_coupon(code)
                .await?
                .filter(|coupon| coupon.is_redeemable(now))
                .ok_or_else(|| AppError::BadRequest("Coupon is not valid".to_string()))?,
        ),
        None => None,
    };

    pricing::quote(
        &payload.lines,
        &catalog,
        coupon.as_ref(),
        &state.config.currency,
    )
}

/// Prices a cart without storing it or redeeming the coupon.
pub async fn quote(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<Quote>, AppError> {
    Ok(Json(price_cart(&state, &payload, Utc::now()).await?))
}

pub async fn checkout(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Purchase>), AppError> {
    let now = Utc::now();
    let quote = price_cart(&state, &payload, now).await?;

    let purchase = Purchase {
        id: PurchaseId::new(),
        user_id: user.id,
        email: user.email.clone(),
        items: PurchaseItems::Cart {
            lines: payload.lines,
        },
        coupon_code: quote.coupon_code,
        subtotal: quote.subtotal,
        discount: quote.discount,
        total: quote.total,
        currency: quote.currency,
        status: PurchaseStatus::Pending,
        decided_by: None,
        decided_at: None,
        decision_note: None,
        created_at: now,
        updated_at: now,
    };
    state.purchases.create(&purchase).await?;
    tracing::info!(
        purchase_id = %purchase.id,
        user_id = %user.id,
        total = purchase.total,
        "Purchase submitted"
    );

    Ok((StatusCode::CREATED, Json(purchase)))
}

pub async fn my_purchases(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<Purchase>>, AppError> {
    Ok(Json(state.purchases.list_for_user(user.id).await?))
}
