//! src/services/gateway.rs
//!
//! Gateway: the per-request workflow that turns a file path and a bearer
//! credential into either a presigned URL or a classified refusal.
//!
//! The permission lookup is started first, on its own task, using the user
//! id claimed in the path. Identity resolution and signing run on the
//! request's own future meanwhile, and the permission answer is only
//! consulted once a URL exists. Early exits leave the lookup running and
//! ignore its answer. Every request produces exactly one audit record.

use crate::{
    errors::GatewayError,
    models::{
        audit::{AuditRecord, OUTCOME_SUCCEEDED},
        request_path::{Operation, PathParams, RequestPath, resource_key},
    },
    services::{
        audit_sink::AuditSink,
        credential_resolver::{CredentialError, CredentialResolver},
        permission_authorizer::{PermissionAuthorizer, PermissionStore},
        url_signer::UrlSigner,
    },
};
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Target bucket for each operation. Empty means not configured.
#[derive(Debug, Clone, Default)]
pub struct Buckets {
    pub upload: String,
    pub download: String,
}

impl Buckets {
    pub fn for_operation(&self, operation: Operation) -> &str {
        match operation {
            Operation::Upload => &self.upload,
            Operation::Download => &self.download,
        }
    }
}

/// A URL the caller is allowed to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Granted {
    pub operation: Operation,
    pub url: String,
}

impl IntoResponse for Granted {
    fn into_response(self) -> Response {
        let body = Json(json!({ "url": self.url }));
        match self.operation {
            Operation::Upload => (StatusCode::OK, body).into_response(),
            Operation::Download => {
                let mut response = (StatusCode::FOUND, body).into_response();
                if let Ok(location) = HeaderValue::from_str(&self.url) {
                    response.headers_mut().insert(header::LOCATION, location);
                }
                response
            }
        }
    }
}

/// Permission lookup running alongside the rest of the request.
///
/// Dropping this without calling [`PermissionCheck::join`] detaches the
/// task; it runs to completion and its answer is discarded.
struct PermissionCheck(JoinHandle<bool>);

impl PermissionCheck {
    fn spawn(authorizer: PermissionAuthorizer, path: &RequestPath) -> Self {
        let project_id = path.project_id.clone();
        let object_id = path.object_id.clone();
        let user_id = path.user_id.clone();
        let file_id = path.file_id.clone();
        Self(tokio::spawn(async move {
            authorizer
                .authorize(&project_id, &object_id, &user_id, &file_id)
                .await
        }))
    }

    /// Wait for the answer. A failed task denies.
    async fn join(self) -> bool {
        match self.0.await {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!("permission check task failed, denying: {}", err);
                false
            }
        }
    }
}

/// Shared handles for the request workflow. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    resolver: Arc<CredentialResolver>,
    authorizer: PermissionAuthorizer,
    signer: Arc<dyn UrlSigner>,
    audit: Arc<dyn AuditSink>,
    buckets: Arc<Buckets>,
}

impl Gateway {
    pub fn new(
        resolver: CredentialResolver,
        permissions: Arc<dyn PermissionStore>,
        signer: Arc<dyn UrlSigner>,
        audit: Arc<dyn AuditSink>,
        buckets: Buckets,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            authorizer: PermissionAuthorizer::new(permissions),
            signer,
            audit,
            buckets: Arc::new(buckets),
        }
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// Run the full workflow for one request.
    pub async fn handle(
        &self,
        params: PathParams,
        authorization: &str,
    ) -> Result<Granted, GatewayError> {
        let claimed_user = params.user_id.clone();
        let key = resource_key(&params.project_id, &params.object_id, &params.file_id);

        let path = match RequestPath::from_params(params) {
            Ok(path) => path,
            Err(err) => {
                warn!("rejecting {}: {}", key, err);
                let failure = GatewayError::UnsupportedOperation;
                self.audit(AuditRecord::new(claimed_user, key, "", failure.to_string()))
                    .await;
                return Err(failure);
            }
        };
        let bucket = self.buckets.for_operation(path.operation).to_string();

        let permission = PermissionCheck::spawn(self.authorizer.clone(), &path);

        let resolved = self.resolver.resolve(authorization);
        let identity = match &resolved {
            Ok(user_id) if *user_id == path.user_id => Ok(()),
            Ok(_) => Err(GatewayError::InvalidToken),
            Err(CredentialError::NoIdentityMapConfigured) => Err(GatewayError::SetupIncomplete),
            Err(CredentialError::InvalidCredential) => Err(GatewayError::InvalidToken),
            Err(CredentialError::MalformedIdentityMap(_)) => Err(GatewayError::Internal),
        };
        if let Err(failure) = identity {
            let resolved_user = resolved.as_deref().unwrap_or("");
            debug!(
                "identity rejected for {}: path user {}, credential user {:?}",
                key, path.user_id, resolved_user
            );
            let outcome = format!(
                "userIDInPath:{}/userIDFromAuthHeader:{} {}",
                path.user_id, resolved_user, failure
            );
            self.audit(AuditRecord::new(&path.user_id, &key, &bucket, outcome))
                .await;
            return Err(failure);
        }

        if bucket.is_empty() {
            warn!("no bucket configured for {} requests", path.operation);
            return self
                .refuse(&path, &key, &bucket, GatewayError::SetupIncomplete)
                .await;
        }

        let url = match self.signer.sign(path.operation, &key, &bucket).await {
            Ok(url) => url,
            Err(err) => {
                warn!("presigning {} in {} failed: {}", key, bucket, err);
                return self
                    .refuse(&path, &key, &bucket, GatewayError::SigningFailed)
                    .await;
            }
        };

        if !permission.join().await {
            return self
                .refuse(&path, &key, &bucket, GatewayError::PermissionDenied)
                .await;
        }

        self.audit(AuditRecord::new(
            &path.user_id,
            &key,
            &bucket,
            OUTCOME_SUCCEEDED,
        ))
        .await;
        Ok(Granted {
            operation: path.operation,
            url,
        })
    }

    async fn refuse(
        &self,
        path: &RequestPath,
        key: &str,
        bucket: &str,
        failure: GatewayError,
    ) -> Result<Granted, GatewayError> {
        self.audit(AuditRecord::new(
            &path.user_id,
            key,
            bucket,
            failure.to_string(),
        ))
        .await;
        Err(failure)
    }

    /// Audit failures are logged and otherwise ignored.
    async fn audit(&self, record: AuditRecord) {
        debug!("audit {}", record.to_line());
        if let Err(err) = self.audit.record(&record).await {
            warn!("audit write failed for {}: {}", record.resource_key, err);
        }
    }
}
