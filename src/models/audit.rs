//! One audit line per handled request.

use serde::Serialize;

/// Outcome text recorded for a request that was granted a URL.
pub const OUTCOME_SUCCEEDED: &str = "succeeded";

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    /// User id claimed in the request path.
    pub user_id: String,

    /// Object key, `/{project}/{object}/{file}`.
    pub resource_key: String,

    /// Bucket the request targeted. Empty when it is not configured.
    pub bucket_label: String,

    /// `succeeded` or a diagnostic describing the failure.
    pub outcome: String,
}

impl AuditRecord {
    pub fn new(
        user_id: impl Into<String>,
        resource_key: impl Into<String>,
        bucket_label: impl Into<String>,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            resource_key: resource_key.into(),
            bucket_label: bucket_label.into(),
            outcome: outcome.into(),
        }
    }

    /// Render the comma-delimited line appended to the audit stream.
    pub fn to_line(&self) -> String {
        format!(
            ",{},\"s3://{}{}\",\"{}\"",
            self.user_id, self.bucket_label, self.resource_key, self.outcome
        )
    }
}
