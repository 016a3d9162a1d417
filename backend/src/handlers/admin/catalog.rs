use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::product::{Coupon, CreateCoupon, Product, UpsertProduct},
    state::AppState,
    validation::validate_payload,
};

pub async fn upsert_product(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<UpsertProduct>,
) -> Result<Json<Product>, AppError> {
    validate_payload(&payload)?;
    let product = payload.into_product(&key, Utc::now())?;
    let stored = state.catalog.upsert_product(&product).await?;
    tracing::info!(product_key = %stored.key, active = stored.active, "Product upserted");
    Ok(Json(stored))
}

pub async fn list_coupons(State(state): State<AppState>) -> Result<Json<Vec<Coupon>>, AppError> {
    Ok(Json(state.catalog.list_coupons().await?))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    Json(payload): Json<CreateCoupon>,
) -> Result<(StatusCode, Json<Coupon>), AppError> {
    validate_payload(&payload)?;
    let coupon = payload.into_coupon(Utc::now());
    state.catalog.create_coupon(&coupon).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}
