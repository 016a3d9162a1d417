//! Transaction helpers shared by the Postgres repositories.

use sqlx::{postgres::PgTransaction, PgConnection, PgPool};

use crate::error::AppError;

/// Begins a transaction; dropping it without [`commit`] rolls back.
pub(crate) async fn begin(pool: &PgPool) -> Result<PgTransaction<'static>, AppError> {
    pool.begin()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}

pub(crate) async fn commit(tx: PgTransaction<'_>) -> Result<(), AppError> {
    tx.commit()
        .await
        .map_err(|e| AppError::InternalServerError(e.into()))
}

/// Explains why a conditional status transition on `table` matched no row:
/// the row is missing, or it has already moved past the expected state.
pub(crate) async fn transition_miss(
    conn: &mut PgConnection,
    table: &str,
    id: &str,
    label: &str,
) -> AppError {
    let query = format!("SELECT status FROM {} WHERE id = $1", table);
    match sqlx::query_scalar::<_, String>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await
    {
        Ok(Some(status)) => AppError::Conflict(format!("{} is already {}", label, status)),
        Ok(None) => AppError::NotFound(format!("{} not found", label)),
        Err(err) => AppError::from(err),
    }
}
