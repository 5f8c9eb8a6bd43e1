use crate::services::gateway::Gateway;
use sqlx::SqlitePool;
use std::sync::Arc;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,

    /// Pool behind the permission store and audit log, used for readiness.
    pub db: Arc<SqlitePool>,
}
