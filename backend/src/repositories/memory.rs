//! In-process store implementing every repository trait.
//!
//! Used by the integration tests and for running the API without a
//! database. Each operation holds one lock for its whole duration, which
//! gives the same atomicity the Postgres transactions provide.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppError,
    models::{
        product::{normalize_coupon_code, Coupon, Product},
        purchase::{Purchase, PurchaseItems, PurchaseStatus},
        training::{EnrollmentStatus, Training, TrainingEnrollment, TrainingResponse},
        user::{normalize_email, User},
    },
    repositories::{
        CatalogRepository, PurchaseDecision, PurchaseRepository, TrainingRepository,
        UserRepository,
    },
    services::grants::{self, Grant},
    types::{EnrollmentId, PurchaseId, TrainingId, UserId},
};

#[derive(Default)]
struct Data {
    users: HashMap<UserId, User>,
    purchases: Vec<Purchase>,
    products: BTreeMap<String, Product>,
    coupons: BTreeMap<String, Coupon>,
    trainings: Vec<Training>,
    enrollments: Vec<TrainingEnrollment>,
}

impl Data {
    fn store_user(&mut self, user: &User, now: DateTime<Utc>) -> Result<User, AppError> {
        let stored = self
            .users
            .get_mut(&user.id)
            .filter(|stored| stored.version == user.version)
            .ok_or(AppError::VersionConflict)?;
        *stored = User {
            version: user.version + 1,
            updated_at: now,
            ..user.clone()
        };
        Ok(stored.clone())
    }

    fn grant_to_user(
        &mut self,
        user_id: UserId,
        to_apply: &[Grant],
        now: DateTime<Utc>,
    ) -> Result<User, AppError> {
        let mut user = self
            .users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        grants::apply_all(&mut user.entitlements, to_apply, now);
        self.store_user(&user, now)
    }

    fn enrollment_mut(&mut self, id: EnrollmentId) -> Result<&mut TrainingEnrollment, AppError> {
        self.enrollments
            .iter_mut()
            .find(|enrollment| enrollment.id == id)
            .ok_or_else(|| AppError::NotFound("Enrollment not found".to_string()))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<Data>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> Result<MutexGuard<'_, Data>, AppError> {
        self.data
            .lock()
            .map_err(|_| AppError::InternalServerError(anyhow!("memory store lock poisoned")))
    }
}

fn already(label: &str, status: &str) -> AppError {
    AppError::Conflict(format!("{} is already {}", label, status))
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        Ok(self.data()?.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = normalize_email(email);
        Ok(self
            .data()?
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), AppError> {
        let data = self.data()?;
        let mut users: Vec<User> = data.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.email.cmp(&b.email)));
        let total = users.len() as i64;
        let page = users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut data = self.data()?;
        if data.users.values().any(|existing| existing.email == user.email) {
            return Err(AppError::Conflict(
                "Email is already registered".to_string(),
            ));
        }
        data.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        self.data()?.store_user(user, Utc::now())
    }
}

#[async_trait]
impl PurchaseRepository for MemoryStore {
    async fn create(&self, purchase: &Purchase) -> Result<(), AppError> {
        let mut data = self.data()?;
        if let Some(code) = &purchase.coupon_code {
            let coupon = data
                .coupons
                .get_mut(code)
                .filter(|coupon| coupon.is_redeemable(purchase.created_at))
                .ok_or_else(|| AppError::BadRequest("Coupon is not valid".to_string()))?;
            coupon.redemptions += 1;
        }
        data.purchases.push(purchase.clone());
        Ok(())
    }

    async fn find(&self, id: PurchaseId) -> Result<Option<Purchase>, AppError> {
        Ok(self
            .data()?
            .purchases
            .iter()
            .find(|purchase| purchase.id == id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>, AppError> {
        Ok(self
            .data()?
            .purchases
            .iter()
            .rev()
            .filter(|purchase| purchase.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list(
        &self,
        status: Option<PurchaseStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Purchase>, i64), AppError> {
        let data = self.data()?;
        let matching: Vec<&Purchase> = data
            .purchases
            .iter()
            .rev()
            .filter(|purchase| status.map_or(true, |status| purchase.status == status))
            .collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn approve(
        &self,
        id: PurchaseId,
        decision: PurchaseDecision,
    ) -> Result<(Purchase, User), AppError> {
        let mut data = self.data()?;
        let purchase = data
            .purchases
            .iter()
            .find(|purchase| purchase.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Purchase not found".to_string()))?;
        if !purchase.is_pending() {
            return Err(already("Purchase", purchase.status.as_str()));
        }

        let mut approved = purchase;
        approved.status = PurchaseStatus::Approved;
        approved.decided_by = Some(decision.decided_by);
        approved.decided_at = Some(decision.decided_at);
        approved.decision_note = decision.note;
        approved.updated_at = decision.decided_at;
        if let PurchaseItems::Legacy {
            approved_months, ..
        } = &mut approved.items
        {
            if decision.approved_months.is_some() {
                *approved_months = decision.approved_months;
            }
        }

        let user = data.grant_to_user(
            approved.user_id,
            &grants::grants_for_purchase(&approved),
            decision.decided_at,
        )?;
        if let Some(stored) = data.purchases.iter_mut().find(|purchase| purchase.id == id) {
            *stored = approved.clone();
        }
        Ok((approved, user))
    }

    async fn reject(
        &self,
        id: PurchaseId,
        decision: PurchaseDecision,
    ) -> Result<Purchase, AppError> {
        let mut data = self.data()?;
        let purchase = data
            .purchases
            .iter_mut()
            .find(|purchase| purchase.id == id)
            .ok_or_else(|| AppError::NotFound("Purchase not found".to_string()))?;
        if !purchase.is_pending() {
            return Err(already("Purchase", purchase.status.as_str()));
        }
        purchase.status = PurchaseStatus::Rejected;
        purchase.decided_by = Some(decision.decided_by);
        purchase.decided_at = Some(decision.decided_at);
        purchase.decision_note = decision.note;
        purchase.updated_at = decision.decided_at;
        Ok(purchase.clone())
    }
}

#[async_trait]
impl CatalogRepository for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        Ok(self.data()?.products.values().cloned().collect())
    }

    async fn upsert_product(&self, product: &Product) -> Result<Product, AppError> {
        let mut data = self.data()?;
        let stored = data
            .products
            .entry(product.key.clone())
            .and_modify(|existing| {
                *existing = Product {
                    created_at: existing.created_at,
                    ..product.clone()
                }
            })
            .or_insert_with(|| product.clone());
        Ok(stored.clone())
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>, AppError> {
        Ok(self
            .data()?
            .coupons
            .get(&normalize_coupon_code(code))
            .cloned())
    }

    async fn list_coupons(&self) -> Result<Vec<Coupon>, AppError> {
        let mut coupons: Vec<Coupon> = self.data()?.coupons.values().cloned().collect();
        coupons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(coupons)
    }

    async fn create_coupon(&self, coupon: &Coupon) -> Result<(), AppError> {
        let mut data = self.data()?;
        if data.coupons.contains_key(&coupon.code) {
            return Err(AppError::Conflict("Coupon code already exists".to_string()));
        }
        data.coupons.insert(coupon.code.clone(), coupon.clone());
        Ok(())
    }
}

#[async_trait]
impl TrainingRepository for MemoryStore {
    async fn create(&self, training: &Training) -> Result<(), AppError> {
        self.data()?.trainings.push(training.clone());
        Ok(())
    }

    async fn find(&self, id: TrainingId) -> Result<Option<Training>, AppError> {
        Ok(self
            .data()?
            .trainings
            .iter()
            .find(|training| training.id == id)
            .cloned())
    }

    async fn list_with_counts(&self) -> Result<Vec<TrainingResponse>, AppError> {
        let data = self.data()?;
        let mut trainings: Vec<TrainingResponse> = data
            .trainings
            .iter()
            .map(|training| {
                let enrolled = data
                    .enrollments
                    .iter()
                    .filter(|e| e.training_id == training.id && e.status.holds_place())
                    .count() as i64;
                TrainingResponse {
                    training: training.clone(),
                    enrolled,
                    seats_left: (i64::from(training.capacity) - enrolled).max(0),
                }
            })
            .collect();
        trainings.sort_by(|a, b| a.training.starts_at.cmp(&b.training.starts_at));
        Ok(trainings)
    }

    async fn enroll(
        &self,
        training_id: TrainingId,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError> {
        let mut data = self.data()?;
        let capacity = data
            .trainings
            .iter()
            .find(|training| training.id == training_id)
            .map(|training| training.capacity)
            .ok_or_else(|| AppError::NotFound("Training not found".to_string()))?;

        let holding: Vec<&TrainingEnrollment> = data
            .enrollments
            .iter()
            .filter(|e| e.training_id == training_id && e.status.holds_place())
            .collect();
        if holding.iter().any(|e| e.user_id == user_id) {
            return Err(AppError::Conflict(
                "Already enrolled in this training".to_string(),
            ));
        }
        if holding.len() as i64 >= i64::from(capacity) {
            return Err(AppError::Conflict("Training is full".to_string()));
        }

        let enrollment = TrainingEnrollment::new(training_id, user_id, email.to_string(), now);
        data.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn list_enrollments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TrainingEnrollment>, AppError> {
        Ok(self
            .data()?
            .enrollments
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_enrollments(
        &self,
        training_id: TrainingId,
    ) -> Result<Vec<TrainingEnrollment>, AppError> {
        Ok(self
            .data()?
            .enrollments
            .iter()
            .filter(|e| e.training_id == training_id)
            .cloned()
            .collect())
    }

    async fn confirm_payment(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError> {
        let mut data = self.data()?;
        let enrollment = data.enrollment_mut(id)?;
        if enrollment.status != EnrollmentStatus::PendingPayment {
            return Err(already("Enrollment", enrollment.status.as_str()));
        }
        enrollment.status = EnrollmentStatus::PaymentConfirmed;
        enrollment.payment_confirmed_at = Some(now);
        enrollment.updated_at = now;
        Ok(enrollment.clone())
    }

    async fn complete_installation(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<(TrainingEnrollment, User), AppError> {
        let mut data = self.data()?;
        let enrollment = data.enrollment_mut(id)?.clone();
        if enrollment.status != EnrollmentStatus::PaymentConfirmed {
            return Err(already("Enrollment", enrollment.status.as_str()));
        }
        let training_grants = data
            .trainings
            .iter()
            .find(|training| training.id == enrollment.training_id)
            .map(|training| grants::grants_for_training(&training.entitlement_grants))
            .ok_or_else(|| AppError::NotFound("Training not found".to_string()))?;

        let user = data.grant_to_user(enrollment.user_id, &training_grants, now)?;

        let stored = data.enrollment_mut(id)?;
        stored.status = EnrollmentStatus::InstallationComplete;
        stored.installation_completed_at = Some(now);
        stored.updated_at = now;
        Ok((stored.clone(), user))
    }

    async fn cancel(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError> {
        let mut data = self.data()?;
        let enrollment = data.enrollment_mut(id)?;
        if !matches!(
            enrollment.status,
            EnrollmentStatus::PendingPayment | EnrollmentStatus::PaymentConfirmed
        ) {
            return Err(already("Enrollment", enrollment.status.as_str()));
        }
        enrollment.status = EnrollmentStatus::Cancelled;
        enrollment.updated_at = now;
        Ok(enrollment.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::UserRole;

    fn user(email: &str) -> User {
        User::new(email, "hash".into(), "Test User".into(), UserRole::User)
    }

    #[tokio::test]
    async fn stale_saves_are_rejected() {
        let store = MemoryStore::new();
        let original = user("stale@example.com");
        store.insert(&original).await.expect("insert");

        let first = store.save(&original).await.expect("first save");
        assert_eq!(first.version, original.version + 1);

        let err = store.save(&original).await.expect_err("stale");
        assert!(matches!(err, AppError::VersionConflict));
    }

    #[tokio::test]
    async fn duplicate_emails_conflict_case_insensitively() {
        let store = MemoryStore::new();
        store.insert(&user("dup@example.com")).await.expect("insert");
        let err = store
            .insert(&user("DUP@example.com"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
