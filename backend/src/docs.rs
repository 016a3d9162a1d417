#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    handlers::{admin::purchases::PurchaseListQuery, entitlements::LicenseResponse},
    models::{
        entitlement::{
            ActivateDeviceRequest, AdminResetDeviceRequest, AdminSetEntitlementRequest,
            DeactivateDeviceRequest, DeviceBinding, DeviceSummary, EffectiveStatus, Entitlement,
            EntitlementStatus, EntitlementSummary, ResetDeviceResponse,
        },
        product::{Coupon, CreateCoupon, Product, UpsertProduct},
        purchase::{
            ApprovePurchaseRequest, BillingInterval, CheckoutRequest, Purchase, PurchaseItems,
            PurchaseLine, PurchaseStatus, Quote, QuoteLine, RejectPurchaseRequest,
        },
        training::{
            CreateTraining, EnrollmentStatus, EntitlementGrant, Training, TrainingEnrollment,
            TrainingResponse,
        },
        user::{
            AdminDisableUserRequest, AdminUserEntitlements, ChangePasswordRequest, EmailQuery,
            LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, UserResponse, UserRole,
        },
        PaginationQuery,
    },
    services::seats::ActivationOutcome,
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        register_doc,
        login_doc,
        refresh_doc,
        me_doc,
        change_password_doc,
        logout_all_doc,
        list_products_doc,
        my_entitlements_doc,
        my_license_doc,
        list_entitlements_doc,
        activate_doc,
        deactivate_doc,
        product_access_doc,
        rategen_access_doc,
        quote_doc,
        checkout_doc,
        my_purchases_doc,
        list_trainings_doc,
        enroll_doc,
        my_enrollments_doc,
        admin_list_users_doc,
        admin_user_entitlements_doc,
        admin_set_entitlement_doc,
        admin_reset_device_doc,
        admin_disable_user_doc,
        admin_list_purchases_doc,
        admin_approve_purchase_doc,
        admin_reject_purchase_doc,
        admin_upsert_product_doc,
        admin_list_coupons_doc,
        admin_create_coupon_doc,
        admin_create_training_doc,
        admin_list_enrollments_doc,
        admin_confirm_payment_doc,
        admin_complete_installation_doc,
        admin_cancel_enrollment_doc
    ),
    components(
        schemas(
            // auth & users
            RegisterRequest,
            LoginRequest,
            RefreshRequest,
            LoginResponse,
            ChangePasswordRequest,
            UserResponse,
            UserRole,
            // entitlements
            Entitlement,
            EntitlementStatus,
            EffectiveStatus,
            EntitlementSummary,
            DeviceBinding,
            DeviceSummary,
            ActivateDeviceRequest,
            DeactivateDeviceRequest,
            ActivationOutcome,
            LicenseResponse,
            // catalog & purchases
            Product,
            UpsertProduct,
            Coupon,
            CreateCoupon,
            BillingInterval,
            PurchaseLine,
            PurchaseItems,
            PurchaseStatus,
            Purchase,
            CheckoutRequest,
            Quote,
            QuoteLine,
            // trainings
            EntitlementGrant,
            Training,
            CreateTraining,
            TrainingResponse,
            TrainingEnrollment,
            EnrollmentStatus,
            // admin-specific payloads
            AdminSetEntitlementRequest,
            AdminResetDeviceRequest,
            ResetDeviceResponse,
            AdminDisableUserRequest,
            AdminUserEntitlements,
            ApprovePurchaseRequest,
            RejectPurchaseRequest
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Registration, login and session management"),
        (name = "Entitlements", description = "Subscriptions, device seats and license tokens"),
        (name = "Purchases", description = "Catalog, pricing and checkout"),
        (name = "Trainings", description = "Physical training sessions"),
        (name = "Admin", description = "Staff and administrator operations")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = UserResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email is already registered")
    ),
    tag = "Auth",
    security(())
)]
fn register_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account is disabled")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh token set", body = LoginResponse),
        (status = 401, description = "Refresh token is invalid or revoked")
    ),
    tag = "Auth",
    security(())
)]
fn refresh_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Current user", body = UserResponse)),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; other sessions revoked", body = LoginResponse),
        (status = 400, description = "Current password is wrong or unchanged")
    ),
    tag = "Auth"
)]
fn change_password_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout-all",
    responses((status = 204, description = "All sessions revoked")),
    tag = "Auth"
)]
fn logout_all_doc() {}

#[utoipa::path(
    get,
    path = "/api/products",
    responses((status = 200, description = "Active products", body = [Product])),
    tag = "Purchases",
    security(())
)]
fn list_products_doc() {}

#[utoipa::path(
    get,
    path = "/api/me/entitlements",
    responses((status = 200, description = "Raw entitlement records", body = [Entitlement])),
    tag = "Entitlements"
)]
fn my_entitlements_doc() {}

#[utoipa::path(
    get,
    path = "/api/me/license",
    responses((status = 200, description = "Signed offline license token", body = LicenseResponse)),
    tag = "Entitlements"
)]
fn my_license_doc() {}

#[utoipa::path(
    get,
    path = "/api/entitlements",
    responses((status = 200, description = "Entitlement summaries", body = [EntitlementSummary])),
    tag = "Entitlements"
)]
fn list_entitlements_doc() {}

#[utoipa::path(
    post,
    path = "/api/entitlements/activate",
    request_body = ActivateDeviceRequest,
    responses(
        (status = 200, description = "Device bound or refreshed", body = ActivationOutcome),
        (status = 403, description = "No usable subscription"),
        (status = 409, description = "Seat limit reached")
    ),
    tag = "Entitlements"
)]
fn activate_doc() {}

#[utoipa::path(
    post,
    path = "/api/entitlements/deactivate",
    request_body = DeactivateDeviceRequest,
    responses(
        (status = 200, description = "Device released", body = DeviceSummary),
        (status = 404, description = "Device is not active for this product")
    ),
    tag = "Entitlements"
)]
fn deactivate_doc() {}

#[utoipa::path(
    get,
    path = "/api/products/{product_key}/access",
    params(("product_key" = String, Path, description = "Product key")),
    responses(
        (status = 200, description = "Caller may use the product", body = EntitlementSummary),
        (status = 403, description = "NO_SUBSCRIPTION or SUBSCRIPTION_EXPIRED")
    ),
    tag = "Entitlements"
)]
fn product_access_doc() {}

#[utoipa::path(
    get,
    path = "/api/rategen/access",
    responses(
        (status = 200, description = "Caller may use RateGen", body = EntitlementSummary),
        (status = 403, description = "NO_SUBSCRIPTION or SUBSCRIPTION_EXPIRED")
    ),
    tag = "Entitlements"
)]
fn rategen_access_doc() {}

#[utoipa::path(
    post,
    path = "/api/purchases/quote",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Priced cart", body = Quote),
        (status = 400, description = "Unknown product or invalid coupon")
    ),
    tag = "Purchases"
)]
fn quote_doc() {}

#[utoipa::path(
    post,
    path = "/api/purchases",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Purchase awaiting approval", body = Purchase),
        (status = 400, description = "Unknown product or invalid coupon")
    ),
    tag = "Purchases"
)]
fn checkout_doc() {}

#[utoipa::path(
    get,
    path = "/api/purchases/me",
    responses((status = 200, description = "Caller's purchases", body = [Purchase])),
    tag = "Purchases"
)]
fn my_purchases_doc() {}

#[utoipa::path(
    get,
    path = "/api/trainings",
    responses((status = 200, description = "Trainings with remaining seats", body = [TrainingResponse])),
    tag = "Trainings"
)]
fn list_trainings_doc() {}

#[utoipa::path(
    post,
    path = "/api/trainings/{id}/enroll",
    params(("id" = String, Path, description = "Training ID")),
    responses(
        (status = 201, description = "Enrollment created", body = TrainingEnrollment),
        (status = 404, description = "Training not found"),
        (status = 409, description = "Already enrolled or training is full")
    ),
    tag = "Trainings"
)]
fn enroll_doc() {}

#[utoipa::path(
    get,
    path = "/api/trainings/enrollments/me",
    responses((status = 200, description = "Caller's enrollments", body = [TrainingEnrollment])),
    tag = "Trainings"
)]
fn my_enrollments_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(PaginationQuery),
    responses((status = 200, description = "Paginated users")),
    tag = "Admin"
)]
fn admin_list_users_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/users/entitlements",
    params(EmailQuery),
    responses(
        (status = 200, description = "User with entitlement summaries", body = AdminUserEntitlements),
        (status = 404, description = "User not found")
    ),
    tag = "Admin"
)]
fn admin_user_entitlements_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/users/entitlement",
    request_body = AdminSetEntitlementRequest,
    responses(
        (status = 200, description = "Entitlement overridden", body = EntitlementSummary),
        (status = 404, description = "User or entitlement not found")
    ),
    tag = "Admin"
)]
fn admin_set_entitlement_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/users/reset-device",
    request_body = AdminResetDeviceRequest,
    responses(
        (status = 200, description = "Devices revoked and sessions invalidated", body = ResetDeviceResponse),
        (status = 404, description = "User or entitlement not found")
    ),
    tag = "Admin"
)]
fn admin_reset_device_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/users/disable",
    request_body = AdminDisableUserRequest,
    responses(
        (status = 200, description = "Account flag updated", body = UserResponse),
        (status = 404, description = "User not found")
    ),
    tag = "Admin"
)]
fn admin_disable_user_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/purchases",
    params(PurchaseListQuery),
    responses((status = 200, description = "Paginated purchases")),
    tag = "Admin"
)]
fn admin_list_purchases_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/purchases/{id}/approve",
    params(("id" = String, Path, description = "Purchase ID")),
    request_body(content = ApprovePurchaseRequest, description = "Optional decision details"),
    responses(
        (status = 200, description = "Purchase approved and entitlements granted", body = Purchase),
        (status = 404, description = "Purchase not found"),
        (status = 409, description = "Purchase already decided")
    ),
    tag = "Admin"
)]
fn admin_approve_purchase_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/purchases/{id}/reject",
    params(("id" = String, Path, description = "Purchase ID")),
    request_body(content = RejectPurchaseRequest, description = "Optional decision details"),
    responses(
        (status = 200, description = "Purchase rejected", body = Purchase),
        (status = 404, description = "Purchase not found"),
        (status = 409, description = "Purchase already decided")
    ),
    tag = "Admin"
)]
fn admin_reject_purchase_doc() {}

#[utoipa::path(
    put,
    path = "/api/admin/products/{key}",
    params(("key" = String, Path, description = "Product key")),
    request_body = UpsertProduct,
    responses((status = 200, description = "Product stored", body = Product)),
    tag = "Admin"
)]
fn admin_upsert_product_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/coupons",
    responses((status = 200, description = "All coupons", body = [Coupon])),
    tag = "Admin"
)]
fn admin_list_coupons_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/coupons",
    request_body = CreateCoupon,
    responses(
        (status = 201, description = "Coupon created", body = Coupon),
        (status = 409, description = "Coupon code already exists")
    ),
    tag = "Admin"
)]
fn admin_create_coupon_doc() {}

#[utoipa::path(
    post,
    path = "/api/admin/ptrainings",
    request_body = CreateTraining,
    responses((status = 201, description = "Training created", body = Training)),
    tag = "Admin"
)]
fn admin_create_training_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/ptrainings/{id}/enrollments",
    params(("id" = String, Path, description = "Training ID")),
    responses(
        (status = 200, description = "Enrollments for the training", body = [TrainingEnrollment]),
        (status = 404, description = "Training not found")
    ),
    tag = "Admin"
)]
fn admin_list_enrollments_doc() {}

#[utoipa::path(
    patch,
    path = "/api/admin/ptrainings/enrollments/{id}/payment-confirmed",
    params(("id" = String, Path, description = "Enrollment ID")),
    responses(
        (status = 200, description = "Payment confirmed", body = TrainingEnrollment),
        (status = 409, description = "Enrollment is not awaiting payment")
    ),
    tag = "Admin"
)]
fn admin_confirm_payment_doc() {}

#[utoipa::path(
    patch,
    path = "/api/admin/ptrainings/enrollments/{id}/installation-complete",
    params(("id" = String, Path, description = "Enrollment ID")),
    responses(
        (status = 200, description = "Installation recorded and entitlements granted", body = TrainingEnrollment),
        (status = 409, description = "Enrollment is not payment-confirmed")
    ),
    tag = "Admin"
)]
fn admin_complete_installation_doc() {}

#[utoipa::path(
    patch,
    path = "/api/admin/ptrainings/enrollments/{id}/cancel",
    params(("id" = String, Path, description = "Enrollment ID")),
    responses(
        (status = 200, description = "Enrollment cancelled", body = TrainingEnrollment),
        (status = 409, description = "Enrollment can no longer be cancelled")
    ),
    tag = "Admin"
)]
fn admin_cancel_enrollment_doc() {}
