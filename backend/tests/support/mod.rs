#![allow(dead_code)]

pub mod postgres;

use adlm_backend::{
    app,
    config::Config,
    models::{
        entitlement::EntitlementStatus,
        product::{Coupon, Product},
        training::{EntitlementGrant, Training},
        user::{User, UserRole},
    },
    state::AppState,
    types::TrainingId,
    utils::{
        jwt::{create_token, TokenType},
        password::hash_password,
    },
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        database_max_connections: 1,
        jwt_secret: "test-jwt-secret".into(),
        license_secret: "test-license-secret".into(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_days: 30,
        license_token_ttl_days: 15,
        currency: "NGN".into(),
        bind_addr: "127.0.0.1:0".into(),
        cors_allow_origins: Vec::new(),
    }
}

pub fn test_state() -> AppState {
    AppState::in_memory(test_config())
}

pub fn test_app(state: &AppState) -> Router {
    app(state.clone())
}

pub async fn seed_user(state: &AppState, email: &str, role: UserRole) -> User {
    let password_hash = hash_password(TEST_PASSWORD).expect("hash password");
    let user = User::new(email, password_hash, "Test User".into(), role);
    state.users.insert(&user).await.expect("insert user");
    user
}

/// Adds or replaces one entitlement on a stored user.
pub async fn seed_entitlement(
    state: &AppState,
    user: &User,
    product_key: &str,
    status: EntitlementStatus,
    expires_at: Option<DateTime<Utc>>,
    seats: u32,
) -> User {
    let mut stored = reload(state, user).await;
    let entitlement = stored.entitlements.get_or_insert(product_key);
    entitlement.status = status;
    entitlement.expires_at = expires_at;
    entitlement.seats = seats;
    state.users.save(&stored).await.expect("save entitlement")
}

pub async fn reload(state: &AppState, user: &User) -> User {
    state
        .users
        .find_by_id(user.id)
        .await
        .expect("find user")
        .expect("user exists")
}

pub async fn seed_product(state: &AppState, key: &str, monthly_price: i64, yearly_price: i64) {
    let now = Utc::now();
    state
        .catalog
        .upsert_product(&Product {
            key: key.into(),
            name: key.to_uppercase(),
            monthly_price,
            yearly_price,
            active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("upsert product");
}

pub async fn seed_coupon(
    state: &AppState,
    code: &str,
    percent_off: i32,
    max_redemptions: Option<i32>,
) {
    state
        .catalog
        .create_coupon(&Coupon {
            code: code.to_uppercase(),
            percent_off,
            max_redemptions,
            redemptions: 0,
            expires_at: None,
            active: true,
            created_at: Utc::now(),
        })
        .await
        .expect("create coupon");
}

pub async fn seed_training(
    state: &AppState,
    capacity: i32,
    grants: Vec<EntitlementGrant>,
) -> TrainingId {
    let now = Utc::now();
    let training = Training {
        id: TrainingId::new(),
        title: "Revit for Estimators".into(),
        location: Some("Lagos".into()),
        starts_at: now + Duration::days(14),
        capacity,
        price: 150_000,
        entitlement_grants: grants,
        created_at: now,
        updated_at: now,
    };
    state.trainings.create(&training).await.expect("create training");
    training.id
}

pub fn create_test_token(state: &AppState, user: &User) -> String {
    create_token(
        user,
        TokenType::Access,
        &state.config.jwt_secret,
        Duration::minutes(15),
    )
    .expect("create token")
}

/// Sends one request through `app` and returns the status and JSON body.
pub async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    };

    let response = app.clone().oneshot(request).await.expect("call app");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 256)
        .await
        .expect("read response body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, json)
}
