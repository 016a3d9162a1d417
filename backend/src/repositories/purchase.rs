use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use crate::{
    error::AppError,
    models::{
        purchase::{Purchase, PurchaseItems, PurchaseRow, PurchaseStatus},
        user::User,
    },
    repositories::{
        transaction::{begin, commit, transition_miss},
        user::{lock_user, save_user},
        PgStore,
    },
    services::grants,
    types::{PurchaseId, UserId},
};

const TABLE_NAME: &str = "purchases";
const SELECT_COLUMNS: &str = "id, user_id, email, lines, product_key, requested_months, \
     approved_months, coupon_code, subtotal, discount, total, currency, status, decided_by, \
     decided_at, decision_note, created_at, updated_at";

/// Staff decision recorded on a pending purchase.
#[derive(Debug, Clone)]
pub struct PurchaseDecision {
    pub decided_by: UserId,
    pub note: Option<String>,
    /// Only honoured for single-product purchases.
    pub approved_months: Option<u32>,
    pub decided_at: DateTime<Utc>,
}

#[async_trait]
pub trait PurchaseRepository: Send + Sync {
    /// Stores a pending purchase, redeeming its coupon in the same
    /// transaction. An unredeemable coupon fails with `BadRequest`.
    async fn create(&self, purchase: &Purchase) -> Result<(), AppError>;

    async fn find(&self, id: PurchaseId) -> Result<Option<Purchase>, AppError>;

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>, AppError>;

    async fn list(
        &self,
        status: Option<PurchaseStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Purchase>, i64), AppError>;

    /// Claims the purchase (`pending -> approved`) and applies its grants to
    /// the buyer atomically. A purchase that is no longer pending fails with
    /// `Conflict` and grants nothing.
    async fn approve(
        &self,
        id: PurchaseId,
        decision: PurchaseDecision,
    ) -> Result<(Purchase, User), AppError>;

    async fn reject(&self, id: PurchaseId, decision: PurchaseDecision)
        -> Result<Purchase, AppError>;
}

fn into_purchases(rows: Vec<PurchaseRow>) -> Result<Vec<Purchase>, AppError> {
    rows.into_iter()
        .map(|row| Purchase::try_from(row).map_err(AppError::from))
        .collect()
}

#[async_trait]
impl PurchaseRepository for PgStore {
    async fn create(&self, purchase: &Purchase) -> Result<(), AppError> {
        let mut tx = begin(&self.pool).await?;

        if let Some(code) = &purchase.coupon_code {
            let redeemed = sqlx::query(
                "UPDATE coupons SET redemptions = redemptions + 1 \
                 WHERE code = $1 AND active \
                 AND (expires_at IS NULL OR expires_at > $2) \
                 AND (max_redemptions IS NULL OR redemptions < max_redemptions)",
            )
            .bind(code)
            .bind(purchase.created_at)
            .execute(&mut *tx)
            .await?;
            if redeemed.rows_affected() == 0 {
                return Err(AppError::BadRequest("Coupon is not valid".to_string()));
            }
        }

        let (lines, product_key, requested_months, approved_months) = match &purchase.items {
            PurchaseItems::Cart { lines } => (Some(Json(lines)), None, None, None),
            PurchaseItems::Legacy {
                product_key,
                requested_months,
                approved_months,
            } => (
                None,
                Some(product_key.as_str()),
                Some(*requested_months as i32),
                approved_months.map(|months| months as i32),
            ),
        };

        let query = format!(
            "INSERT INTO {} ({}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            TABLE_NAME, SELECT_COLUMNS
        );
        sqlx::query(&query)
            .bind(purchase.id.to_string())
            .bind(purchase.user_id.to_string())
            .bind(&purchase.email)
            .bind(lines)
            .bind(product_key)
            .bind(requested_months)
            .bind(approved_months)
            .bind(&purchase.coupon_code)
            .bind(purchase.subtotal)
            .bind(purchase.discount)
            .bind(purchase.total)
            .bind(&purchase.currency)
            .bind(purchase.status.as_str())
            .bind(purchase.decided_by.map(|id| id.to_string()))
            .bind(purchase.decided_at)
            .bind(&purchase.decision_note)
            .bind(purchase.created_at)
            .bind(purchase.updated_at)
            .execute(&mut *tx)
            .await?;

        commit(tx).await
    }

    async fn find(&self, id: PurchaseId) -> Result<Option<Purchase>, AppError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", SELECT_COLUMNS, TABLE_NAME);
        sqlx::query_as::<_, PurchaseRow>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| Purchase::try_from(row).map_err(AppError::from))
            .transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Purchase>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, PurchaseRow>(&query)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        into_purchases(rows)
    }

    async fn list(
        &self,
        status: Option<PurchaseStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Purchase>, i64), AppError> {
        let status = status.map(|status| status.as_str());
        let query = format!(
            "SELECT {} FROM {} WHERE ($1::TEXT IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            SELECT_COLUMNS, TABLE_NAME
        );
        let rows = sqlx::query_as::<_, PurchaseRow>(&query)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE ($1::TEXT IS NULL OR status = $1)",
            TABLE_NAME
        ))
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok((into_purchases(rows)?, total))
    }

    async fn approve(
        &self,
        id: PurchaseId,
        decision: PurchaseDecision,
    ) -> Result<(Purchase, User), AppError> {
        let mut tx = begin(&self.pool).await?;

        let query = format!(
            "UPDATE {} SET status = 'approved', decided_by = $2, decided_at = $3, \
             decision_note = $4, \
             approved_months = CASE WHEN lines IS NULL THEN COALESCE($5, approved_months) \
             ELSE approved_months END, \
             updated_at = $3 \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PurchaseRow>(&query)
            .bind(id.to_string())
            .bind(decision.decided_by.to_string())
            .bind(decision.decided_at)
            .bind(&decision.note)
            .bind(decision.approved_months.map(|months| months as i32))
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(transition_miss(&mut tx, TABLE_NAME, &id.to_string(), "Purchase").await);
        };
        let purchase = Purchase::try_from(row)?;

        let mut user = lock_user(&mut tx, purchase.user_id).await?;
        grants::apply_all(
            &mut user.entitlements,
            &grants::grants_for_purchase(&purchase),
            decision.decided_at,
        );
        let user = save_user(&mut *tx, &user).await?;

        commit(tx).await?;
        Ok((purchase, user))
    }

    async fn reject(
        &self,
        id: PurchaseId,
        decision: PurchaseDecision,
    ) -> Result<Purchase, AppError> {
        let mut tx = begin(&self.pool).await?;
        let query = format!(
            "UPDATE {} SET status = 'rejected', decided_by = $2, decided_at = $3, \
             decision_note = $4, updated_at = $3 \
             WHERE id = $1 AND status = 'pending' RETURNING {}",
            TABLE_NAME, SELECT_COLUMNS
        );
        let row = sqlx::query_as::<_, PurchaseRow>(&query)
            .bind(id.to_string())
            .bind(decision.decided_by.to_string())
            .bind(decision.decided_at)
            .bind(&decision.note)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(transition_miss(&mut tx, TABLE_NAME, &id.to_string(), "Purchase").await);
        };
        let purchase = Purchase::try_from(row)?;
        commit(tx).await?;
        Ok(purchase)
    }
}
