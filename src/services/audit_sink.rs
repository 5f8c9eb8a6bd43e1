//! src/services/audit_sink.rs
//!
//! Append-only audit log. Events land in one stream per UTC day inside a
//! log group. Each stream carries an upload sequence token that is advanced
//! on every append; appends still go through when the token cannot be read.

use crate::models::audit::AuditRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type AuditResult<T> = Result<T, AuditError>;

/// Destination for per-request audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: &AuditRecord) -> AuditResult<()>;
}

/// Stream name for the day `time` falls on, e.g. `20261016Z`.
pub fn stream_name(time: DateTime<Utc>) -> String {
    time.format("%Y%m%dZ").to_string()
}

/// Audit log stored in SQLite, partitioned by day.
#[derive(Clone)]
pub struct SqliteAuditSink {
    db: Arc<SqlitePool>,
    group_name: String,
    /// Create the group and the day's stream before appending.
    setup: bool,
}

impl SqliteAuditSink {
    pub fn new(db: Arc<SqlitePool>, group_name: impl Into<String>, setup: bool) -> Self {
        Self {
            db,
            group_name: group_name.into(),
            setup,
        }
    }

    async fn create_log_group(&self, now: DateTime<Utc>) -> AuditResult<()> {
        sqlx::query("INSERT OR IGNORE INTO audit_log_groups (name, created_at) VALUES (?, ?)")
            .bind(&self.group_name)
            .bind(now)
            .execute(&*self.db)
            .await?;
        Ok(())
    }

    async fn create_log_stream(&self, stream: &str, now: DateTime<Utc>) -> AuditResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO audit_log_streams
                (group_name, name, upload_sequence_token, created_at)
             VALUES (?, ?, NULL, ?)",
        )
        .bind(&self.group_name)
        .bind(stream)
        .bind(now)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    /// Current upload sequence token of `stream`, if it has one.
    async fn next_sequence_token(&self, stream: &str) -> Option<String> {
        let token = sqlx::query_scalar::<_, Option<String>>(
            "SELECT upload_sequence_token FROM audit_log_streams
             WHERE group_name = ? AND name = ?",
        )
        .bind(&self.group_name)
        .bind(stream)
        .fetch_optional(&*self.db)
        .await;

        match token {
            Ok(token) => token.flatten(),
            Err(err) => {
                debug!("could not read sequence token for {}: {}", stream, err);
                None
            }
        }
    }

    /// Append one event at `now` and return the token it was written with.
    pub async fn append_at(
        &self,
        record: &AuditRecord,
        now: DateTime<Utc>,
    ) -> AuditResult<Option<String>> {
        let stream = stream_name(now);

        if self.setup {
            self.create_log_group(now).await?;
            self.create_log_stream(&stream, now).await?;
        }

        let token = self.next_sequence_token(&stream).await;

        sqlx::query(
            "INSERT INTO audit_log_events
                (id, group_name, stream_name, sequence_token, message, timestamp_ms)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4())
        .bind(&self.group_name)
        .bind(&stream)
        .bind(token.as_deref())
        .bind(record.to_line())
        .bind(now.timestamp_millis())
        .execute(&*self.db)
        .await?;

        let advanced = sqlx::query(
            "UPDATE audit_log_streams SET upload_sequence_token = ?
             WHERE group_name = ? AND name = ?",
        )
        .bind(Uuid::new_v4().simple().to_string())
        .bind(&self.group_name)
        .bind(&stream)
        .execute(&*self.db)
        .await;
        if let Err(err) = advanced {
            debug!("could not advance sequence token for {}: {}", stream, err);
        }

        Ok(token)
    }
}

#[async_trait]
impl AuditSink for SqliteAuditSink {
    async fn record(&self, record: &AuditRecord) -> AuditResult<()> {
        self.append_at(record, Utc::now()).await.map(|_| ())
    }
}
