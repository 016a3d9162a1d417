//! Persistence traits and their Postgres and in-memory implementations.

pub mod catalog;
pub mod memory;
pub mod purchase;
pub mod training;
pub mod transaction;
pub mod user;

pub use catalog::CatalogRepository;
pub use memory::MemoryStore;
pub use purchase::{PurchaseDecision, PurchaseRepository};
pub use training::TrainingRepository;
pub use user::UserRepository;

use sqlx::PgPool;

/// Postgres-backed implementation of every repository trait.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}
