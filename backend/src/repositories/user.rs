//! User document repository.
//!
//! Every write is a compare-and-swap on `version`: the update only lands if
//! the stored document is the one the caller loaded.

use async_trait::async_trait;
use sqlx::{types::Json, Postgres};

use crate::{
    error::AppError,
    models::user::User,
    repositories::{is_unique_violation, PgStore},
    types::UserId,
};

pub(crate) const TABLE_NAME: &str = "users";
pub(crate) const SELECT_COLUMNS: &str = "id, email, password_hash, full_name, role, disabled, \
     refresh_version, entitlements, version, created_at, updated_at";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Newest first; returns the page and the total count.
    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), AppError>;

    /// Fails with `Conflict` when the email is taken.
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    /// Persists the document if its `version` is unchanged since it was read,
    /// returning the stored copy with the bumped version. Otherwise fails
    /// with `VersionConflict`.
    async fn save(&self, user: &User) -> Result<User, AppError>;
}

#[async_trait]
impl UserRepository for PgStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {} FROM {} WHERE id = $1", SELECT_COLUMNS, TABLE_NAME);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let query = format!(
            "SELECT {} FROM {} WHERE email = $1",
            SELECT_COLUMNS, TABLE_NAME
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(crate::models::user::normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<(Vec<User>, i64), AppError> {
        let query = format!(
            "SELECT {} FROM {} ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            SELECT_COLUMNS, TABLE_NAME
        );
        let users = sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", TABLE_NAME))
            .fetch_one(&self.pool)
            .await?;
        Ok((users, total))
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let query = format!(
            "INSERT INTO {} (id, email, password_hash, full_name, role, disabled, refresh_version, \
             entitlements, version, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            TABLE_NAME
        );
        sqlx::query(&query)
            .bind(user.id.to_string())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(user.role.as_str())
            .bind(user.disabled)
            .bind(user.refresh_version)
            .bind(Json(&user.entitlements))
            .bind(user.version)
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AppError::Conflict("Email is already registered".to_string())
                } else {
                    AppError::from(err)
                }
            })?;
        Ok(())
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        save_user(&self.pool, user).await
    }
}

/// Version-checked write usable with a pool or inside a transaction.
pub(crate) async fn save_user<'e, E>(executor: E, user: &User) -> Result<User, AppError>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let query = format!(
        "UPDATE {} SET password_hash = $3, full_name = $4, role = $5, disabled = $6, \
         refresh_version = $7, entitlements = $8, version = version + 1, updated_at = NOW() \
         WHERE id = $1 AND version = $2 RETURNING {}",
        TABLE_NAME, SELECT_COLUMNS
    );
    sqlx::query_as::<_, User>(&query)
        .bind(user.id.to_string())
        .bind(user.version)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(user.disabled)
        .bind(user.refresh_version)
        .bind(Json(&user.entitlements))
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::VersionConflict)
}

/// Loads and row-locks a user for the remainder of the transaction.
pub(crate) async fn lock_user(
    tx: &mut sqlx::PgConnection,
    id: UserId,
) -> Result<User, AppError> {
    let query = format!(
        "SELECT {} FROM {} WHERE id = $1 FOR UPDATE",
        SELECT_COLUMNS, TABLE_NAME
    );
    sqlx::query_as::<_, User>(&query)
        .bind(id.to_string())
        .fetch_optional(tx)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}
