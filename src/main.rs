use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::SqlitePoolOptions;
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use services::{
    audit_sink::SqliteAuditSink,
    credential_resolver::CredentialResolver,
    gateway::{Buckets, Gateway},
    permission_authorizer::SqlitePermissionStore,
    url_signer::{S3Presigner, SigningCredentials},
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting members-cdn-gateway with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    tracing::debug!("Interpreted SQLite path => {}", db_path);

    // Create parent directory if needed
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let connect_url = if db_url.contains('?') || db_url.contains(":memory:") {
        db_url.clone()
    } else {
        format!("{}?mode=rwc", db_url)
    };
    let db: Arc<sqlx::Pool<sqlx::Sqlite>> = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&connect_url)
            .await
            .with_context(|| format!("connecting to {}", db_url))?,
    );

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize collaborators ---
    let resolver = CredentialResolver::from_source(&cfg.identity_map_json);
    match resolver.identity_count() {
        Ok(count) => tracing::info!("Loaded {} credential digests", count),
        Err(err) => tracing::warn!("Identity map unavailable, every request will fail: {}", err),
    }

    let signer = S3Presigner::new(
        &cfg.s3_endpoint,
        cfg.region.clone(),
        SigningCredentials {
            access_key_id: cfg.access_key_id.clone(),
            secret_access_key: cfg.secret_access_key.clone(),
            session_token: cfg.session_token.clone(),
        },
    )
    .context("configuring presigner")?;

    let buckets = Buckets {
        upload: cfg.upload_bucket.clone(),
        download: cfg.download_bucket.clone(),
    };
    if buckets.upload.is_empty() || buckets.download.is_empty() {
        tracing::warn!("Bucket names incomplete: {:?}", buckets);
    }

    let gateway = Gateway::new(
        resolver,
        Arc::new(SqlitePermissionStore::new(db.clone())),
        Arc::new(signer),
        Arc::new(SqliteAuditSink::new(
            db.clone(),
            cfg.log_group_name.clone(),
            cfg.audit_setup,
        )),
        buckets,
    );

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(state::AppState { gateway, db });

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
