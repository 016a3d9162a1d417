use adlm_backend::models::{training::EntitlementGrant, user::UserRole};
use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

mod support;

use support::{call, create_test_token, reload, seed_training, seed_user, test_app, test_state};

fn bim_grant() -> EntitlementGrant {
    EntitlementGrant {
        product_key: "bimCourse".into(),
        months: 6,
        seats: 1,
        license_type: Some("training".into()),
    }
}

#[tokio::test]
async fn admin_creates_training_and_customers_see_seats_left() {
    let state = test_state();
    let app = test_app(&state);
    let admin = seed_user(&state, "admin@example.com", UserRole::Admin).await;
    let user = seed_user(&state, "ada@example.com", UserRole::User).await;
    let admin_token = create_test_token(&state, &admin);
    let user_token = create_test_token(&state, &user);

    let (status, training) = call(
        &app,
        Method::POST,
        "/api/admin/ptrainings",
        Some(&admin_token),
        Some(json!({
            "title": "Quantity Surveying with Revit",
            "location": "Abuja",
            "startsAt": Utc::now() + Duration::days(7),
            "capacity": 3,
            "price": 250000,
            "entitlementGrants": [{ "productKey": "rategen", "months": 3 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{training}");
    let id = training["id"].as_str().expect("training id").to_string();

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/trainings/{}/enroll", id),
        Some(&user_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["status"], "pending_payment");

    let (status, body) = call(&app, Method::GET, "/api/trainings", Some(&user_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], id.as_str());
    assert_eq!(body[0]["enrolled"], 1);
    assert_eq!(body[0]["seatsLeft"], 2);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/admin/ptrainings",
        Some(&user_token),
        Some(json!({ "title": "x", "startsAt": Utc::now(), "capacity": 1, "price": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn enrollment_rejects_duplicates_and_full_trainings() {
    let state = test_state();
    let app = test_app(&state);
    let training_id = seed_training(&state, 1, vec![]).await;
    let first = seed_user(&state, "ada@example.com", UserRole::User).await;
    let second = seed_user(&state, "bola@example.com", UserRole::User).await;
    let first_token = create_test_token(&state, &first);
    let second_token = create_test_token(&state, &second);
    let enroll_uri = format!("/api/trainings/{}/enroll", training_id);

    let (status, _) = call(&app, Method::POST, &enroll_uri, Some(&first_token), None).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::POST, &enroll_uri, Some(&first_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Already enrolled in this training");

    let (status, body) = call(&app, Method::POST, &enroll_uri, Some(&second_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Training is full");

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/api/trainings/{}/enroll", uuid::Uuid::new_v4()),
        Some(&second_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Training not found");
}

#[tokio::test]
async fn cancelled_enrollments_release_their_place() {
    let state = test_state();
    let app = test_app(&state);
    let training_id = seed_training(&state, 1, vec![]).await;
    let staff = seed_user(&state, "ops@example.com", UserRole::MiniAdmin).await;
    let first = seed_user(&state, "ada@example.com", UserRole::User).await;
    let second = seed_user(&state, "bola@example.com", UserRole::User).await;
    let staff_token = create_test_token(&state, &staff);
    let enroll_uri = format!("/api/trainings/{}/enroll", training_id);

    let (_, enrollment) = call(
        &app,
        Method::POST,
        &enroll_uri,
        Some(&create_test_token(&state, &first)),
        None,
    )
    .await;
    let enrollment_id = enrollment["id"].as_str().expect("enrollment id").to_string();

    let cancel_uri = format!("/api/admin/ptrainings/enrollments/{}/cancel", enrollment_id);
    let (status, body) = call(&app, Method::PATCH, &cancel_uri, Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "cancelled");

    let (status, _) = call(&app, Method::PATCH, &cancel_uri, Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = call(
        &app,
        Method::POST,
        &enroll_uri,
        Some(&create_test_token(&state, &second)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn installation_complete_grants_training_entitlements_once() {
    let state = test_state();
    let app = test_app(&state);
    let training_id = seed_training(&state, 5, vec![bim_grant()]).await;
    let staff = seed_user(&state, "ops@example.com", UserRole::MiniAdmin).await;
    let trainee = seed_user(&state, "ada@example.com", UserRole::User).await;
    let staff_token = create_test_token(&state, &staff);
    let trainee_token = create_test_token(&state, &trainee);

    let (_, enrollment) = call(
        &app,
        Method::POST,
        &format!("/api/trainings/{}/enroll", training_id),
        Some(&trainee_token),
        None,
    )
    .await;
    let enrollment_id = enrollment["id"].as_str().expect("enrollment id").to_string();
    let install_uri = format!(
        "/api/admin/ptrainings/enrollments/{}/installation-complete",
        enrollment_id
    );

    // Installation requires confirmed payment first.
    let (status, body) = call(&app, Method::PATCH, &install_uri, Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = call(
        &app,
        Method::PATCH,
        &format!(
            "/api/admin/ptrainings/enrollments/{}/payment-confirmed",
            enrollment_id
        ),
        Some(&staff_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "payment_confirmed");

    let (status, body) = call(&app, Method::PATCH, &install_uri, Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "installation_complete");

    let granted = reload(&state, &trainee).await;
    let entitlement = granted.entitlement("bimCourse").expect("granted");
    assert_eq!(entitlement.license_type.as_deref(), Some("training"));
    let expires_at = entitlement.expires_at.expect("expiry");

    let (status, _) = call(&app, Method::PATCH, &install_uri, Some(&staff_token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let again = reload(&state, &trainee).await;
    assert_eq!(
        again.entitlement("bimCourse").and_then(|e| e.expires_at),
        Some(expires_at)
    );

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/products/bimCourse/access",
        Some(&trainee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/admin/ptrainings/{}/enrollments", training_id),
        Some(&staff_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let (status, body) = call(
        &app,
        Method::GET,
        "/api/trainings/enrollments/me",
        Some(&trainee_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["status"], "installation_complete");
}
