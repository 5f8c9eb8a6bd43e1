//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks DB connectivity and gateway setup

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Liveness probe. Always 200 OK with a small JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Runs a lightweight query against SQLite (`SELECT 1`).
/// 2. Confirms the identity map loaded.
/// 3. Confirms both buckets are named.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let sqlite_check = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*state.db)
        .await
    {
        Ok(1) => CheckStatus::ok(),
        Ok(v) => CheckStatus::failed(format!("unexpected result: {}", v)),
        Err(e) => CheckStatus::failed(format!("error: {}", e)),
    };

    let identity_check = match state.gateway.resolver().identity_count() {
        Ok(_) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(e.to_string()),
    };

    let buckets = state.gateway.buckets();
    let missing: Vec<&str> = [("upload", &buckets.upload), ("download", &buckets.download)]
        .into_iter()
        .filter(|(_, name)| name.is_empty())
        .map(|(label, _)| label)
        .collect();
    let bucket_check = if missing.is_empty() {
        CheckStatus::ok()
    } else {
        CheckStatus::failed(format!("no bucket configured for: {}", missing.join(", ")))
    };

    let mut checks = HashMap::new();
    checks.insert("sqlite", sqlite_check);
    checks.insert("identity_map", identity_check);
    checks.insert("buckets", bucket_check);

    let overall_ok = checks.values().all(|check| check.ok);
    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        db,
        routes::routes::routes,
        services::{
            credential_resolver::CredentialResolver,
            gateway::{Buckets, Gateway},
            testing::{FakeSigner, MapPermissionStore, RecordingAuditSink, X_DIGEST, identity_source},
        },
        state::AppState,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn state(identities: &str, buckets: Buckets) -> AppState {
        AppState {
            gateway: Gateway::new(
                CredentialResolver::from_source(identities),
                Arc::new(MapPermissionStore::default()),
                Arc::new(FakeSigner::default()),
                Arc::new(RecordingAuditSink::default()),
                buckets,
            ),
            db: Arc::new(db::memory_pool().await.unwrap()),
        }
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
        let response = routes()
            .with_state(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn healthz_is_always_ok() {
        let state = state("", Buckets::default()).await;
        let (status, body) = get(state, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn readyz_passes_when_configured() {
        let buckets = Buckets {
            upload: "ul".into(),
            download: "dl".into(),
        };
        let state = state(&identity_source(&[(X_DIGEST, "42")]), buckets).await;
        let (status, body) = get(state, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
    }

    #[tokio::test]
    async fn readyz_reports_missing_setup() {
        let state = state("", Buckets::default()).await;
        let (status, body) = get(state, "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"]["identity_map"]["ok"], false);
        assert_eq!(body["checks"]["buckets"]["ok"], false);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
    }
}
