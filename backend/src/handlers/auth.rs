use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::check_session,
    models::user::{
        normalize_email, ChangePasswordRequest, LoginRequest, LoginResponse, RefreshRequest,
        RegisterRequest, User, UserResponse, UserRole,
    },
    state::AppState,
    utils::{
        jwt::{create_token, verify_token, TokenType},
        license::issue_license_token,
        password::{hash_password, verify_login, verify_password},
    },
    validation::validate_payload,
};

/// Mints an access, refresh and license token for `user`.
pub(crate) fn issue_session(config: &Config, user: &User) -> Result<LoginResponse, AppError> {
    let access_token = create_token(
        user,
        TokenType::Access,
        &config.jwt_secret,
        Duration::minutes(config.access_token_ttl_minutes),
    )?;
    let refresh_token = create_token(
        user,
        TokenType::Refresh,
        &config.jwt_secret,
        Duration::days(config.refresh_token_ttl_days),
    )?;
    let license_token = issue_license_token(
        user,
        &config.license_secret,
        Duration::days(config.license_token_ttl_days),
        Utc::now(),
    )?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        license_token,
        user: UserResponse::from(user),
    })
}

pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    payload.email = normalize_email(&payload.email);
    validate_payload(&payload)?;

    let password_hash = hash_password(&payload.password)?;
    let user = User::new(
        &payload.email,
        password_hash,
        payload.full_name.trim().to_string(),
        UserRole::User,
    );
    state.users.insert(&user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let user = state.users.find_by_email(&payload.email).await?;
    let matches = verify_login(
        &payload.password,
        user.as_ref().map(|user| user.password_hash.as_str()),
    )?;
    let user = match user {
        Some(user) if matches => user,
        _ => {
            return Err(AppError::Unauthorized(
                "Invalid email or password".to_string(),
            ))
        }
    };
    if user.disabled {
        return Err(AppError::Forbidden("Account is disabled".to_string()));
    }

    Ok(Json(issue_session(&state.config, &user)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid or expired refresh token".to_string());

    let claims = verify_token(
        &payload.refresh_token,
        &state.config.jwt_secret,
        TokenType::Refresh,
    )
    .map_err(|_| invalid())?;
    let user_id = claims.sub.parse().map_err(|_| invalid())?;
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(invalid)?;
    check_session(&claims, &user)?;

    Ok(Json(issue_session(&state.config, &user)?))
}

pub async fn me(Extension(user): Extension<User>) -> Json<UserResponse> {
    Json(UserResponse::from(user))
}

/// Changes the password and signs out every other session. The response
/// carries a fresh token set for the caller.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_payload(&payload)?;
    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }
    if payload.current_password == payload.new_password {
        return Err(AppError::BadRequest(
            "New password must differ from the current password".to_string(),
        ));
    }

    let mut user = user;
    user.password_hash = hash_password(&payload.new_password)?;
    user.bump_refresh_version();
    let user = state.users.save(&user).await?;
    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(issue_session(&state.config, &user)?))
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(mut user): Extension<User>,
) -> Result<StatusCode, AppError> {
    user.bump_refresh_version();
    state.users.save(&user).await?;
    Ok(StatusCode::NO_CONTENT)
}
