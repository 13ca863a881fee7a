use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::store::JobStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub store: Arc<JobStore>,
    pub api_key: String,
}

impl AppState {
    pub fn new(db: SqlitePool, store: Arc<JobStore>, api_key: impl Into<String>) -> Self {
        Self {
            db,
            store,
            api_key: api_key.into(),
        }
    }
}
