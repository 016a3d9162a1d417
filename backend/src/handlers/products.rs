use axum::{extract::State, Json};

use crate::{error::AppError, models::product::Product, state::AppState};

/// Active products only.
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state
        .catalog
        .list_products()
        .await?
        .into_iter()
        .filter(|product| product.active)
        .collect();
    Ok(Json(products))
}
