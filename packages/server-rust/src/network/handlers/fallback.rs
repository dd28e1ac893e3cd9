//! Catch-all for requests matching neither an API operation nor a route.

use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pantry_core::ErrorEnvelope;

/// Answers 404 with an error envelope naming the missing path.
pub async fn not_found_handler(uri: Uri) -> Response {
    let envelope = ErrorEnvelope::message(
        StatusCode::NOT_FOUND.as_u16(),
        format!("no route for {}", uri.path()),
    );
    tracing::debug!(path = uri.path(), "no route");
    (StatusCode::NOT_FOUND, Json(envelope)).into_response()
}
