pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod types;
pub mod utils;
pub mod validation;

use axum::{
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{config::Config, middleware as app_middleware, state::AppState};

const RATEGEN_PRODUCT_KEY: &str = "rategen";

/// Builds the full HTTP application over `state`.
pub fn app(state: AppState) -> Router {
    // Public routes (no auth)
    let public_routes = Router::new()
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route("/api/products", get(handlers::products::list_products));

    // Product-gated routes; the guard runs inside `auth`
    let product_routes = Router::new()
        .route(
            "/api/products/{product_key}/access",
            get(handlers::entitlements::access_summary),
        )
        .route_layer(axum_middleware::from_fn(
            app_middleware::require_path_entitlement,
        ));
    let rategen_routes = Router::new()
        .route(
            "/api/rategen/access",
            get(handlers::entitlements::access_summary),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            RATEGEN_PRODUCT_KEY,
            app_middleware::require_entitlement,
        ));

    // User routes (auth required)
    let user_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/auth/change-password",
            put(handlers::auth::change_password),
        )
        .route("/api/auth/logout-all", post(handlers::auth::logout_all))
        .route(
            "/api/me/entitlements",
            get(handlers::entitlements::my_entitlements),
        )
        .route("/api/me/license", get(handlers::entitlements::my_license))
        .route(
            "/api/entitlements",
            get(handlers::entitlements::list_entitlements),
        )
        .route(
            "/api/entitlements/activate",
            post(handlers::entitlements::activate),
        )
        .route(
            "/api/entitlements/deactivate",
            post(handlers::entitlements::deactivate),
        )
        .route("/api/purchases/quote", post(handlers::purchases::quote))
        .route("/api/purchases", post(handlers::purchases::checkout))
        .route("/api/purchases/me", get(handlers::purchases::my_purchases))
        .route("/api/trainings", get(handlers::trainings::list_trainings))
        .route(
            "/api/trainings/{id}/enroll",
            post(handlers::trainings::enroll),
        )
        .route(
            "/api/trainings/enrollments/me",
            get(handlers::trainings::my_enrollments),
        )
        .merge(product_routes)
        .merge(rategen_routes)
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth,
        ));

    // Staff routes (admin or mini_admin)
    let staff_routes = Router::new()
        .route("/api/admin/users", get(handlers::admin::users::list_users))
        .route(
            "/api/admin/users/entitlements",
            get(handlers::admin::users::user_entitlements),
        )
        .route(
            "/api/admin/purchases",
            get(handlers::admin::purchases::list_purchases),
        )
        .route(
            "/api/admin/purchases/{id}/approve",
            post(handlers::admin::purchases::approve_purchase),
        )
        .route(
            "/api/admin/purchases/{id}/reject",
            post(handlers::admin::purchases::reject_purchase),
        )
        .route(
            "/api/admin/ptrainings/{id}/enrollments",
            get(handlers::admin::trainings::list_enrollments),
        )
        .route(
            "/api/admin/ptrainings/enrollments/{id}/payment-confirmed",
            patch(handlers::admin::trainings::confirm_payment),
        )
        .route(
            "/api/admin/ptrainings/enrollments/{id}/installation-complete",
            patch(handlers::admin::trainings::complete_installation),
        )
        .route(
            "/api/admin/ptrainings/enrollments/{id}/cancel",
            patch(handlers::admin::trainings::cancel_enrollment),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_staff,
        ));

    // Admin-only routes
    let admin_routes = Router::new()
        .route(
            "/api/admin/users/entitlement",
            post(handlers::admin::users::set_entitlement),
        )
        .route(
            "/api/admin/users/reset-device",
            post(handlers::admin::users::reset_device),
        )
        .route(
            "/api/admin/users/disable",
            post(handlers::admin::users::disable_user),
        )
        .route(
            "/api/admin/products/{key}",
            put(handlers::admin::catalog::upsert_product),
        )
        .route(
            "/api/admin/coupons",
            get(handlers::admin::catalog::list_coupons)
                .post(handlers::admin::catalog::create_coupon),
        )
        .route(
            "/api/admin/ptrainings",
            post(handlers::admin::trainings::create_training),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth_admin,
        ));

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(staff_routes)
        .merge(admin_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", docs::ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(app_middleware::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(
                    app_middleware::log_error_responses,
                ))
                .layer(cors),
        )
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(24 * 60 * 60))
}
