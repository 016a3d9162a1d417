use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::AppError,
    models::{
        purchase::{ApprovePurchaseRequest, Purchase, PurchaseStatus, RejectPurchaseRequest},
        user::User,
        PaginatedResponse, PaginationQuery,
    },
    repositories::PurchaseDecision,
    state::AppState,
    types::PurchaseId,
    validation::validate_payload,
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PurchaseListQuery {
    pub status: Option<PurchaseStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_purchases(
    State(state): State<AppState>,
    Query(query): Query<PurchaseListQuery>,
) -> Result<Json<PaginatedResponse<Purchase>>, AppError> {
    let mut page = PaginationQuery::default();
    if let Some(limit) = query.limit {
        page.limit = limit;
    }
    if let Some(offset) = query.offset {
        page.offset = offset;
    }
    let (purchases, total) = state
        .purchases
        .list(query.status, page.limit(), page.offset())
        .await?;
    Ok(Json(PaginatedResponse::new(
        purchases,
        total,
        page.limit(),
        page.offset(),
    )))
}

/// Approves a pending purchase and applies its grants exactly once.
pub async fn approve_purchase(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<PurchaseId>,
    payload: Option<Json<ApprovePurchaseRequest>>,
) -> Result<Json<Purchase>, AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    validate_payload(&payload)?;

    let decision = PurchaseDecision {
        decided_by: staff.id,
        note: payload.note,
        approved_months: payload.approved_months,
        decided_at: Utc::now(),
    };
    let (purchase, buyer) = state.purchases.approve(id, decision).await?;
    tracing::info!(
        purchase_id = %purchase.id,
        buyer = %buyer.email,
        decided_by = %staff.id,
        "Purchase approved"
    );
    Ok(Json(purchase))
}

pub async fn reject_purchase(
    State(state): State<AppState>,
    Extension(staff): Extension<User>,
    Path(id): Path<PurchaseId>,
    payload: Option<Json<RejectPurchaseRequest>>,
) -> Result<Json<Purchase>, AppError> {
    let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
    validate_payload(&payload)?;

    let decision = PurchaseDecision {
        decided_by: staff.id,
        note: payload.note,
        approved_months: None,
        decided_at: Utc::now(),
    };
    let purchase = state.purchases.reject(id, decision).await?;
    tracing::info!(purchase_id = %purchase.id, decided_by = %staff.id, "Purchase rejected");
    Ok(Json(purchase))
}
