//! HTTP handler for presigned file URL requests.
//!
//! The route carries the file address; the `Authorization` header carries
//! the caller's bearer credential. Everything else is delegated to
//! `Gateway`.

use crate::{
    models::request_path::{PathParams, is_version_segment},
    state::AppState,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};

/// `GET /v{version}/projects/{project_id}/objects/{object_id}/users/{user_id}/files/{file_id}[/{action}]`
///
/// Download redirects to the presigned URL (302). Upload returns it in the
/// body (200). A first segment that is not `v{version}` is a 404.
pub async fn request_file_url(
    State(state): State<AppState>,
    Path(params): Path<PathParams>,
    headers: HeaderMap,
) -> Response {
    if !is_version_segment(&params.version) {
        tracing::debug!("no route for version segment {:?}", params.version);
        return StatusCode::NOT_FOUND.into_response();
    }

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    tracing::debug!(
        "{} request for project {} object {} file {}",
        params.version,
        params.project_id,
        params.object_id,
        params.file_id
    );

    state.gateway.handle(params, authorization).await.into_response()
}
