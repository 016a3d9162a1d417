use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    config::Config,
    repositories::{
        CatalogRepository, MemoryStore, PgStore, PurchaseRepository, TrainingRepository,
        UserRepository,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub purchases: Arc<dyn PurchaseRepository>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub trainings: Arc<dyn TrainingRepository>,
    pub config: Config,
}

impl AppState {
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        let store = Arc::new(PgStore::new(pool));
        Self {
            users: store.clone(),
            purchases: store.clone(),
            catalog: store.clone(),
            trainings: store,
            config,
        }
    }

    /// Backs every repository with one shared in-process store.
    pub fn in_memory(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            purchases: store.clone(),
            catalog: store.clone(),
            trainings: store,
            config,
        }
    }
}
