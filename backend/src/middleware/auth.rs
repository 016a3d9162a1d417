use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    error::AppError,
    models::user::User,
    state::AppState,
    utils::jwt::{verify_token, Claims, TokenType},
};

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

// Auth + either staff role, for purchase and training operations
pub async fn auth_staff(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    if !user.is_staff() {
        return Err(AppError::Forbidden("Staff access required".to_string()));
    }
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

// Auth + full admin role, for entitlement overrides, user management and the catalog
pub async fn auth_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    if !user.is_admin() {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub(crate) fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        let token = rest.trim();
        (!token.is_empty()).then_some(token)
    } else {
        None
    }
}

async fn authenticate_request(
    headers: &axum::http::HeaderMap,
    state: &AppState,
) -> Result<(Claims, User), AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let claims = verify_token(token, &state.config.jwt_secret, TokenType::Access)
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;
    let user_id = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;
    check_session(&claims, &user)?;

    Ok((claims, user))
}

/// Rejects disabled accounts and tokens minted before the last
/// `refresh_version` bump.
pub(crate) fn check_session(claims: &Claims, user: &User) -> Result<(), AppError> {
    if user.disabled {
        return Err(AppError::Forbidden("Account is disabled".to_string()));
    }
    if claims.rv != user.refresh_version {
        return Err(AppError::Unauthorized("Session has been revoked".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(parse_bearer_token("BEARER abc"), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
        assert_eq!(parse_bearer_token("Bearer"), None);
    }
}
