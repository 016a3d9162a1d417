//! Request-time product access guard.
//!
//! Runs after [`auth`](super::auth::auth), which puts the caller's freshly
//! loaded [`User`] into the request extensions. On success the matching
//! [`Entitlement`] is inserted for the handler.

use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::{
    error::AppError,
    models::{entitlement::Entitlement, user::User},
    services::access::check_access,
};

/// Guards a route with a fixed product, e.g.
/// `from_fn_with_state("rategen", require_entitlement)`.
pub async fn require_entitlement(
    State(product_key): State<&'static str>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(product_key, request, next).await
}

/// Guards a route whose `{product_key}` path segment names the product.
pub async fn require_path_entitlement(
    Path(product_key): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&product_key, request, next).await
}

async fn guard(product_key: &str, mut request: Request, next: Next) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<User>()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let entitlement: Entitlement = check_access(user.entitlement(product_key), Utc::now())
        .map_err(|denied| {
            tracing::debug!(user_id = %user.id, product_key, code = denied.code(), "Access denied");
            denied
        })?
        .clone();

    request.extensions_mut().insert(entitlement);
    Ok(next.run(request).await)
}
