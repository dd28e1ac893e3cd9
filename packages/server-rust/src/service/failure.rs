//! Error rendering: the stage that turns a dispatch failure into a response body.

use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use pantry_core::ErrorEnvelope;

/// Receives every dispatch failure exactly once.
///
/// `payload` is the stringified envelope. The router sets the status and
/// attaches the envelope to the returned response afterwards.
pub trait ErrorRenderer: Send + Sync {
    fn render(&self, envelope: &ErrorEnvelope, payload: String) -> Response;
}

/// Writes the payload as an `application/json` body.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorRenderer;

impl ErrorRenderer for JsonErrorRenderer {
    fn render(&self, _envelope: &ErrorEnvelope, payload: String) -> Response {
        ([(CONTENT_TYPE, "application/json")], payload).into_response()
    }
}
