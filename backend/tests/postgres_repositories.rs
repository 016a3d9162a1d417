use adlm_backend::{
    error::AppError,
    models::{
        entitlement::{DeviceBinding, EntitlementStatus},
        purchase::{BillingInterval, Purchase, PurchaseItems, PurchaseLine, PurchaseStatus},
        training::EntitlementGrant,
        user::{User, UserRole},
    },
    repositories::PurchaseDecision,
    state::AppState,
    types::PurchaseId,
};
use chrono::{Duration, Months, Utc};

mod support;

use support::{
    postgres::{integration_guard, test_pool},
    reload, seed_coupon, seed_training, seed_user, test_config,
};

async fn pg_state() -> Option<AppState> {
    let pool = test_pool().await?;
    Some(AppState::postgres(pool, test_config()))
}

fn cart_purchase(buyer: &User, coupon_code: Option<&str>) -> Purchase {
    let now = Utc::now();
    Purchase {
        id: PurchaseId::new(),
        user_id: buyer.id,
        email: buyer.email.clone(),
        items: PurchaseItems::Cart {
            lines: vec![PurchaseLine {
                product_key: "rategen".into(),
                qty: 2,
                periods: 3,
                billing_interval: BillingInterval::Monthly,
                license_type: None,
            }],
        },
        coupon_code: coupon_code.map(str::to_string),
        subtotal: 60_000,
        discount: 0,
        total: 60_000,
        currency: "NGN".into(),
        status: PurchaseStatus::Pending,
        decided_by: None,
        decided_at: None,
        decision_note: None,
        created_at: now,
        updated_at: now,
    }
}

fn decision(staff: &User) -> PurchaseDecision {
    PurchaseDecision {
        decided_by: staff.id,
        note: None,
        approved_months: None,
        decided_at: Utc::now(),
    }
}

#[tokio::test]
async fn entitlement_documents_round_trip_through_jsonb() {
    let _guard = integration_guard().await;
    let Some(state) = pg_state().await else {
        return;
    };
    let user = seed_user(&state, "ada@example.com", UserRole::User).await;

    let mut stored = reload(&state, &user).await;
    let expires_at = Utc::now() + Duration::days(30);
    let entitlement = stored.entitlements.get_or_insert("rategen");
    entitlement.status = EntitlementStatus::Active;
    entitlement.expires_at = Some(expires_at);
    entitlement.seats = 2;
    entitlement
        .devices
        .push(DeviceBinding::new("fp-laptop".into(), Some("Laptop".into()), Utc::now()));
    let saved = state.users.save(&stored).await.expect("save user");
    assert_eq!(saved.version, stored.version + 1);

    let loaded = reload(&state, &user).await;
    let entitlement = loaded.entitlement("rategen").expect("entitlement");
    assert_eq!(entitlement.status, EntitlementStatus::Active);
    assert_eq!(entitlement.seats, 2);
    assert_eq!(entitlement.seats_used(), 1);
    assert_eq!(entitlement.devices[0].fingerprint, "fp-laptop");
    assert_eq!(
        entitlement.expires_at.map(|at| at.timestamp()),
        Some(expires_at.timestamp())
    );
}

#[tokio::test]
async fn stale_saves_are_rejected_with_a_version_conflict() {
    let _guard = integration_guard().await;
    let Some(state) = pg_state().await else {
        return;
    };
    let user = seed_user(&state, "ada@example.com", UserRole::User).await;

    let first = reload(&state, &user).await;
    let mut second = first.clone();

    let mut winner = first;
    winner.entitlements.get_or_insert("rategen").seats = 1;
    state.users.save(&winner).await.expect("first save");

    second.entitlements.get_or_insert("revit").seats = 1;
    let err = state.users.save(&second).await.expect_err("stale save");
    assert!(matches!(err, AppError::VersionConflict), "{err:?}");

    let stored = reload(&state, &user).await;
    assert!(stored.entitlements.contains("rategen"));
    assert!(!stored.entitlements.contains("revit"));
}

#[tokio::test]
async fn approving_twice_grants_once() {
    let _guard = integration_guard().await;
    let Some(state) = pg_state().await else {
        return;
    };
    let staff = seed_user(&state, "ops@example.com", UserRole::MiniAdmin).await;
    let buyer = seed_user(&state, "ada@example.com", UserRole::User).await;
    let purchase = cart_purchase(&buyer, None);
    state.purchases.create(&purchase).await.expect("create purchase");

    let before = Utc::now();
    let (approved, user) = state
        .purchases
        .approve(purchase.id, decision(&staff))
        .await
        .expect("approve");
    assert_eq!(approved.status, PurchaseStatus::Approved);
    assert_eq!(approved.decided_by, Some(staff.id));

    let entitlement = user.entitlement("rategen").expect("granted");
    assert_eq!(entitlement.status, EntitlementStatus::Active);
    assert_eq!(entitlement.seats, 2);
    let expires_at = entitlement.expires_at.expect("expiry");
    assert!(expires_at >= before + Months::new(3));
    assert!(expires_at <= Utc::now() + Months::new(3));

    let err = state
        .purchases
        .approve(purchase.id, decision(&staff))
        .await
        .expect_err("second approval");
    match err {
        AppError::Conflict(message) => assert_eq!(message, "Purchase is already approved"),
        other => panic!("unexpected error: {other:?}"),
    }

    let stored = reload(&state, &buyer).await;
    assert_eq!(
        stored.entitlement("rategen").and_then(|e| e.expires_at),
        Some(expires_at)
    );

    let err = state
        .purchases
        .reject(purchase.id, decision(&staff))
        .await
        .expect_err("reject after approval");
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

    let err = state
        .purchases
        .approve(PurchaseId::new(), decision(&staff))
        .await
        .expect_err("unknown purchase");
    assert!(matches!(err, AppError::NotFound(_)), "{err:?}");
}

#[tokio::test]
async fn coupons_stop_redeeming_at_their_limit() {
    let _guard = integration_guard().await;
    let Some(state) = pg_state().await else {
        return;
    };
    let buyer = seed_user(&state, "ada@example.com", UserRole::User).await;
    seed_coupon(&state, "ONCE", 10, Some(1)).await;

    state
        .purchases
        .create(&cart_purchase(&buyer, Some("ONCE")))
        .await
        .expect("first redemption");

    let second = cart_purchase(&buyer, Some("ONCE"));
    let err = state
        .purchases
        .create(&second)
        .await
        .expect_err("limit reached");
    assert!(matches!(err, AppError::BadRequest(_)), "{err:?}");
    assert!(state
        .purchases
        .find(second.id)
        .await
        .expect("find purchase")
        .is_none());

    let coupon = state
        .catalog
        .find_coupon("once")
        .await
        .expect("find coupon")
        .expect("coupon exists");
    assert_eq!(coupon.redemptions, 1);
    assert_eq!(
        state
            .purchases
            .list_for_user(buyer.id)
            .await
            .expect("list purchases")
            .len(),
        1
    );
}

#[tokio::test]
async fn full_trainings_refuse_enrollment_until_a_place_is_released() {
    let _guard = integration_guard().await;
    let Some(state) = pg_state().await else {
        return;
    };
    let first = seed_user(&state, "ada@example.com", UserRole::User).await;
    let second = seed_user(&state, "obi@example.com", UserRole::User).await;
    let training_id = seed_training(&state, 1, Vec::new()).await;
    let now = Utc::now();

    let held = state
        .trainings
        .enroll(training_id, first.id, &first.email, now)
        .await
        .expect("first enrollment");

    let err = state
        .trainings
        .enroll(training_id, first.id, &first.email, now)
        .await
        .expect_err("duplicate enrollment");
    match err {
        AppError::Conflict(message) => assert_eq!(message, "Already enrolled in this training"),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = state
        .trainings
        .enroll(training_id, second.id, &second.email, now)
        .await
        .expect_err("training full");
    match err {
        AppError::Conflict(message) => assert_eq!(message, "Training is full"),
        other => panic!("unexpected error: {other:?}"),
    }

    state.trainings.cancel(held.id, now).await.expect("cancel");
    state
        .trainings
        .enroll(training_id, second.id, &second.email, now)
        .await
        .expect("enrollment after cancel");

    let listed = state.trainings.list_with_counts().await.expect("list");
    assert_eq!(listed[0].enrolled, 1);
    assert_eq!(listed[0].seats_left, 0);
}

#[tokio::test]
async fn completing_installation_applies_grants_once() {
    let _guard = integration_guard().await;
    let Some(state) = pg_state().await else {
        return;
    };
    let trainee = seed_user(&state, "ada@example.com", UserRole::User).await;
    let training_id = seed_training(
        &state,
        5,
        vec![EntitlementGrant {
            product_key: "revit".into(),
            months: 6,
            seats: 1,
            license_type: Some("student".into()),
        }],
    )
    .await;
    let now = Utc::now();
    let enrollment = state
        .trainings
        .enroll(training_id, trainee.id, &trainee.email, now)
        .await
        .expect("enroll");

    let err = state
        .trainings
        .complete_installation(enrollment.id, now)
        .await
        .expect_err("payment not confirmed");
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

    state
        .trainings
        .confirm_payment(enrollment.id, now)
        .await
        .expect("confirm payment");
    let (_, user) = state
        .trainings
        .complete_installation(enrollment.id, now)
        .await
        .expect("complete installation");
    let expires_at = user
        .entitlement("revit")
        .and_then(|e| e.expires_at)
        .expect("granted");

    let err = state
        .trainings
        .complete_installation(enrollment.id, Utc::now())
        .await
        .expect_err("second completion");
    assert!(matches!(err, AppError::Conflict(_)), "{err:?}");

    let stored = reload(&state, &trainee).await;
    assert_eq!(
        stored.entitlement("revit").and_then(|e| e.expires_at),
        Some(expires_at)
    );
}
