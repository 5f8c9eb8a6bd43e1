//! Permission ceilings read from the permission store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// The highest file a user may touch for one project/object pair.
///
/// The store is keyed by `user_id` and `project_id_and_object_id`. The
/// gateway only ever reads these rows.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct PermissionRecord {
    pub user_id: String,

    /// Composite key, `{project_id}_{object_id}`.
    pub project_id_and_object_id: String,

    pub project_id: String,

    pub object_id: String,

    /// Allowed file ceiling. Only its leading digit run is meaningful.
    pub file_id: String,

    pub updated_at: DateTime<Utc>,
}

/// Build the composite key the store uses as its range key.
pub fn composite_key(project_id: &str, object_id: &str) -> String {
    format!("{}_{}", project_id, object_id)
}
