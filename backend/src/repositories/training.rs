use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow};

use crate::{
    error::AppError,
    models::{
        training::{EntitlementGrant, Training, TrainingEnrollment, TrainingResponse},
        user::User,
    },
    repositories::{
        transaction::{begin, commit, transition_miss},
        user::{lock_user, save_user},
        PgStore,
    },
    services::grants,
    types::{EnrollmentId, TrainingId, UserId},
};

const TRAINING_COLUMNS: &str =
    "id, title, location, starts_at, capacity, price, entitlement_grants, created_at, updated_at";
const ENROLLMENT_TABLE: &str = "training_enrollments";
const ENROLLMENT_COLUMNS: &str = "id, training_id, user_id, email, status, payment_confirmed_at, \
     installation_completed_at, created_at, updated_at";

#[async_trait]
pub trait TrainingRepository: Send + Sync {
    async fn create(&self, training: &Training) -> Result<(), AppError>;

    async fn find(&self, id: TrainingId) -> Result<Option<Training>, AppError>;

    /// Trainings by start date with their non-cancelled enrollment counts.
    async fn list_with_counts(&self) -> Result<Vec<TrainingResponse>, AppError>;

    /// Takes a place in the training. Fails with `Conflict` when the training
    /// is full or the user already holds a place.
    async fn enroll(
        &self,
        training_id: TrainingId,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError>;

    async fn list_enrollments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TrainingEnrollment>, AppError>;

    async fn list_enrollments(
        &self,
        training_id: TrainingId,
    ) -> Result<Vec<TrainingEnrollment>, AppError>;

    /// `pending_payment -> payment_confirmed`.
    async fn confirm_payment(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError>;

    /// `payment_confirmed -> installation_complete`, applying the training's
    /// grants to the trainee in the same transaction.
    async fn complete_installation(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<(TrainingEnrollment, User), AppError>;

    /// Releases the place held by an enrollment that has not completed.
    async fn cancel(&self, id: EnrollmentId, now: DateTime<Utc>)
        -> Result<TrainingEnrollment, AppError>;
}

#[derive(FromRow)]
struct TrainingCountRow {
    #[sqlx(flatten)]
    training: Training,
    enrolled: i64,
}

impl From<TrainingCountRow> for TrainingResponse {
    fn from(row: TrainingCountRow) -> Self {
        let seats_left = (i64::from(row.training.capacity) - row.enrolled).max(0);
        TrainingResponse {
            training: row.training,
            enrolled: row.enrolled,
            seats_left,
        }
    }
}

#[async_trait]
impl TrainingRepository for PgStore {
    async fn create(&self, training: &Training) -> Result<(), AppError> {
        let query = format!(
            "INSERT INTO trainings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            TRAINING_COLUMNS
        );
        sqlx::query(&query)
            .bind(training.id.to_string())
            .bind(&training.title)
            .bind(&training.location)
            .bind(training.starts_at)
            .bind(training.capacity)
            .bind(training.price)
            .bind(Json(&training.entitlement_grants))
            .bind(training.created_at)
            .bind(training.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find(&self, id: TrainingId) -> Result<Option<Training>, AppError> {
        let query = format!("SELECT {} FROM trainings WHERE id = $1", TRAINING_COLUMNS);
        let training = sqlx::query_as::<_, Training>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(training)
    }

    async fn list_with_counts(&self) -> Result<Vec<TrainingResponse>, AppError> {
        let rows = sqlx::query_as::<_, TrainingCountRow>(
            "SELECT t.id, t.title, t.location, t.starts_at, t.capacity, t.price, \
             t.entitlement_grants, t.created_at, t.updated_at, \
             COUNT(e.id) FILTER (WHERE e.status <> 'cancelled') AS enrolled \
             FROM trainings t LEFT JOIN training_enrollments e ON e.training_id = t.id \
             GROUP BY t.id ORDER BY t.starts_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(TrainingResponse::from).collect())
    }

    async fn enroll(
        &self,
        training_id: TrainingId,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError> {
        let mut tx = begin(&self.pool).await?;

        let capacity: i32 =
            sqlx::query_scalar("SELECT capacity FROM trainings WHERE id = $1 FOR UPDATE")
                .bind(training_id.to_string())
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::NotFound("Training not found".to_string()))?;

        let (taken, mine): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE user_id = $2) \
             FROM training_enrollments WHERE training_id = $1 AND status <> 'cancelled'",
        )
        .bind(training_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&mut *tx)
        .await?;
        if mine > 0 {
            return Err(AppError::Conflict(
                "Already enrolled in this training".to_string(),
            ));
        }
        if taken >= i64::from(capacity) {
            return Err(AppError::Conflict("Training is full".to_string()));
        }

        let enrollment = TrainingEnrollment::new(training_id, user_id, email.to_string(), now);
        let query = format!(
            "INSERT INTO {} ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            ENROLLMENT_TABLE, ENROLLMENT_COLUMNS
        );
        sqlx::query(&query)
            .bind(enrollment.id.to_string())
            .bind(enrollment.training_id.to_string())
            .bind(enrollment.user_id.to_string())
            .bind(&enrollment.email)
            .bind(enrollment.status.as_str())
            .bind(enrollment.payment_confirmed_at)
            .bind(enrollment.installation_completed_at)
            .bind(enrollment.created_at)
            .bind(enrollment.updated_at)
            .execute(&mut *tx)
            .await?;

        commit(tx).await?;
        Ok(enrollment)
    }

    async fn list_enrollments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TrainingEnrollment>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 ORDER BY created_at DESC",
            ENROLLMENT_COLUMNS, ENROLLMENT_TABLE
        );
        let enrollments = sqlx::query_as::<_, TrainingEnrollment>(&query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(enrollments)
    }

    async fn list_enrollments(
        &self,
        training_id: TrainingId,
    ) -> Result<Vec<TrainingEnrollment>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE training_id = $1 ORDER BY created_at",
            ENROLLMENT_COLUMNS, ENROLLMENT_TABLE
        );
        let enrollments = sqlx::query_as::<_, TrainingEnrollment>(&query)
            .bind(training_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        Ok(enrollments)
    }

    async fn confirm_payment(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError> {
        let query = format!(
            "UPDATE {} SET status = 'payment_confirmed', payment_confirmed_at = $2, \
             updated_at = $2 WHERE id = $1 AND status = 'pending_payment' RETURNING {}",
            ENROLLMENT_TABLE, ENROLLMENT_COLUMNS
        );
        let mut conn = self.pool.acquire().await?;
        let updated = sqlx::query_as::<_, TrainingEnrollment>(&query)
            .bind(id.to_string())
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?;
        match updated {
            Some(enrollment) => Ok(enrollment),
            None => Err(
                transition_miss(&mut conn, ENROLLMENT_TABLE, &id.to_string(), "Enrollment").await,
            ),
        }
    }

    async fn complete_installation(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<(TrainingEnrollment, User), AppError> {
        let mut tx = begin(&self.pool).await?;

        let query = format!(
            "UPDATE {} SET status = 'installation_complete', installation_completed_at = $2, \
             updated_at = $2 WHERE id = $1 AND status = 'payment_confirmed' RETURNING {}",
            ENROLLMENT_TABLE, ENROLLMENT_COLUMNS
        );
        let enrollment = sqlx::query_as::<_, TrainingEnrollment>(&query)
            .bind(id.to_string())
            .bind(now)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(enrollment) = enrollment else {
            return Err(
                transition_miss(&mut tx, ENROLLMENT_TABLE, &id.to_string(), "Enrollment").await,
            );
        };

        let Json(training_grants): Json<Vec<EntitlementGrant>> =
            sqlx::query_scalar("SELECT entitlement_grants FROM trainings WHERE id = $1")
                .bind(enrollment.training_id.to_string())
                .fetch_one(&mut *tx)
                .await?;

        let mut user = lock_user(&mut tx, enrollment.user_id).await?;
        grants::apply_all(
            &mut user.entitlements,
            &grants::grants_for_training(&training_grants),
            now,
        );
        let user = save_user(&mut *tx, &user).await?;

        commit(tx).await?;
        Ok((enrollment, user))
    }

    async fn cancel(
        &self,
        id: EnrollmentId,
        now: DateTime<Utc>,
    ) -> Result<TrainingEnrollment, AppError> {
        let query = format!(
            "UPDATE {} SET status = 'cancelled', updated_at = $2 \
             WHERE id = $1 AND status IN ('pending_payment', 'payment_confirmed') RETURNING {}",
            ENROLLMENT_TABLE, ENROLLMENT_COLUMNS
        );
        let mut conn = self.pool.acquire().await?;
        let updated = sqlx::query_as::<_, TrainingEnrollment>(&query)
            .bind(id.to_string())
            .bind(now)
            .fetch_optional(&mut *conn)
            .await?;
        match updated {
            Some(enrollment) => Ok(enrollment),
            None => Err(
                transition_miss(&mut conn, ENROLLMENT_TABLE, &id.to_string(), "Enrollment").await,
            ),
        }
    }
}
