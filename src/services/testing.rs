//! In-memory collaborators for exercising the gateway without SQLite or S3.

use crate::models::{
    audit::AuditRecord,
    permission::{PermissionRecord, composite_key},
    request_path::Operation,
};
use crate::services::{
    audit_sink::{AuditError, AuditResult, AuditSink},
    permission_authorizer::{PermissionStore, PermissionStoreError, PermissionStoreResult},
    url_signer::{SignError, UrlSigner},
};
use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

/// sha256("X"), so `Bearer X` resolves through [`identity_source`].
pub const X_DIGEST: &str = "4b68ab3847feda7d6c62c1fbcbeebfa35eab7351ed5e78f4ddadea5df64b8015";

/// Identity map JSON with the given digest -> user id entries.
pub fn identity_source(entries: &[(&str, &str)]) -> String {
    let maps: HashMap<&str, &str> = entries.iter().copied().collect();
    serde_json::json!({ "Maps": maps }).to_string()
}

#[derive(Default)]
pub struct MapPermissionStore {
    ceilings: Mutex<HashMap<(String, String), String>>,
    lookups: Mutex<Vec<(String, String)>>,
}

impl MapPermissionStore {
    pub fn insert(&self, user_id: &str, project_id: &str, object_id: &str, ceiling: &str) {
        self.ceilings.lock().unwrap().insert(
            (user_id.to_string(), composite_key(project_id, object_id)),
            ceiling.to_string(),
        );
    }

    /// `(user_id, composite key)` of every fetch so far.
    pub fn lookups(&self) -> Vec<(String, String)> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait]
impl PermissionStore for MapPermissionStore {
    async fn fetch(
        &self,
        project_id: &str,
        object_id: &str,
        user_id: &str,
    ) -> PermissionStoreResult<PermissionRecord> {
        let key = composite_key(project_id, object_id);
        self.lookups
            .lock()
            .unwrap()
            .push((user_id.to_string(), key.clone()));
        let ceiling = self
            .ceilings
            .lock()
            .unwrap()
            .get(&(user_id.to_string(), key.clone()))
            .cloned();
        match ceiling {
            Some(file_id) => Ok(PermissionRecord {
                user_id: user_id.to_string(),
                project_id_and_object_id: key,
                project_id: project_id.to_string(),
                object_id: object_id.to_string(),
                file_id,
                updated_at: Utc::now(),
            }),
            None => Err(PermissionStoreError::NotFound {
                user_id: user_id.to_string(),
                key,
            }),
        }
    }
}

/// Never answers.
pub struct PendingPermissionStore;

#[async_trait]
impl PermissionStore for PendingPermissionStore {
    async fn fetch(
        &self,
        _project_id: &str,
        _object_id: &str,
        _user_id: &str,
    ) -> PermissionStoreResult<PermissionRecord> {
        std::future::pending().await
    }
}

/// Returns `https://signed.example/{method}/{bucket}{key}`.
#[derive(Default)]
pub struct FakeSigner {
    fail: bool,
    calls: AtomicUsize,
}

impl FakeSigner {
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UrlSigner for FakeSigner {
    async fn sign(
        &self,
        operation: Operation,
        resource_key: &str,
        bucket: &str,
    ) -> Result<String, SignError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SignError::SigningFailed("store unavailable".into()));
        }
        Ok(format!(
            "https://signed.example/{}/{}{}",
            operation.http_method(),
            bucket,
            resource_key
        ))
    }
}

#[derive(Default)]
pub struct RecordingAuditSink {
    fail: bool,
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            records: Mutex::default(),
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, record: &AuditRecord) -> AuditResult<()> {
        self.records.lock().unwrap().push(record.clone());
        if self.fail {
            return Err(AuditError::Sqlx(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}
