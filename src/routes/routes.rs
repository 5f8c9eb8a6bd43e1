//! Defines routes for presigned file URL requests.
//!
//! ## Structure
//! - `GET /v{version}/projects/{project_id}/objects/{object_id}/users/{user_id}/files/{file_id}`
//!   returns a presigned download URL, returned as a redirect
//! - `GET /v{version}/projects/{project_id}/objects/{object_id}/users/{user_id}/files/{file_id}/upload`
//!   returns a presigned upload URL in the body
//!
//! The handler answers 404 when the first segment is not `v{version}`.
//! Any other trailing segment after `{file_id}` is routed to the same
//! handler and rejected there.

use crate::{
    handlers::{
        file_handlers::request_file_url,
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{Router, routing::get};

const FILE_ROUTE: &str =
    "/{version}/projects/{project_id}/objects/{object_id}/users/{user_id}/files/{file_id}";

/// Build and return the router for the gateway.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(FILE_ROUTE, get(request_file_url))
        .route(&format!("{}/{{action}}", FILE_ROUTE), get(request_file_url))
}
