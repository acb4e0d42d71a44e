use sqlx::PgPool;
use std::sync::Arc;

use crate::db::{PgItemStore, PgResultStore};
use crate::services::bus::RedisBus;
use crate::services::moderation::ModerationService;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub bus: Arc<RedisBus>,
    pub moderation: Arc<ModerationService>,
}

impl AppState {
    pub fn new(db: PgPool, bus: RedisBus) -> Self {
        let bus = Arc::new(bus);
        let results = Arc::new(PgResultStore::new(db.clone()));
        let items = Arc::new(PgItemStore::new(db.clone()));
        let moderation = Arc::new(ModerationService::new(results, items, bus.clone()));

        Self {
            db,
            bus,
            moderation,
        }
    }
}
