//! Decides whether a user may touch a given file id.
//!
//! Permission rows hold a ceiling: the highest file sequence number the user
//! may access for a project/object pair. Lookups fail closed, so a missing
//! row or an unavailable store is always a denial.

use crate::models::permission::{PermissionRecord, composite_key};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PermissionStoreError {
    #[error("no permission for user `{user_id}` on `{key}`")]
    NotFound { user_id: String, key: String },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type PermissionStoreResult<T> = Result<T, PermissionStoreError>;

/// Keyed read access to permission records.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn fetch(
        &self,
        project_id: &str,
        object_id: &str,
        user_id: &str,
    ) -> PermissionStoreResult<PermissionRecord>;
}

/// Permission store backed by the `permissions` table.
#[derive(Clone)]
pub struct SqlitePermissionStore {
    db: Arc<SqlitePool>,
}

impl SqlitePermissionStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PermissionStore for SqlitePermissionStore {
    async fn fetch(
        &self,
        project_id: &str,
        object_id: &str,
        user_id: &str,
    ) -> PermissionStoreResult<PermissionRecord> {
        let key = composite_key(project_id, object_id);
        sqlx::query_as::<_, PermissionRecord>(
            "SELECT user_id, project_id_and_object_id, project_id, object_id, file_id, updated_at
             FROM permissions
             WHERE user_id = ? AND project_id_and_object_id = ?",
        )
        .bind(user_id)
        .bind(key.clone())
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => PermissionStoreError::NotFound {
                user_id: user_id.to_string(),
                key,
            },
            other => PermissionStoreError::Sqlx(other),
        })
    }
}

/// Answers allow/deny from a [`PermissionStore`].
#[derive(Clone)]
pub struct PermissionAuthorizer {
    store: Arc<dyn PermissionStore>,
}

impl PermissionAuthorizer {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self { store }
    }

    /// `true` when the numeric part of `requested_file_id` does not exceed
    /// the stored ceiling. Store errors deny.
    pub async fn authorize(
        &self,
        project_id: &str,
        object_id: &str,
        user_id: &str,
        requested_file_id: &str,
    ) -> bool {
        let requested = parse_file_number(requested_file_id);
        let permission = match self.store.fetch(project_id, object_id, user_id).await {
            Ok(permission) => permission,
            Err(err) => {
                warn!("permission lookup failed, denying: {}", err);
                return false;
            }
        };
        let ceiling = parse_file_number(&permission.file_id);
        debug!(
            "file {} requested by user {}, ceiling {}",
            requested, user_id, ceiling
        );
        requested <= ceiling
    }
}

/// Numeric value of the first run of ASCII digits, or 0 if there is none.
///
/// `"007.csv"` and `"7"` both parse to 7. A run too long for `u64` also
/// parses to 0.
pub fn parse_file_number(file_id: &str) -> u64 {
    let digits: String = file_id
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}
