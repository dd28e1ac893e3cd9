//! Controllers: per-resource handlers invoked by the dispatch router.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::Request;
use http_body_util::LengthLimitError;
use pantry_core::{HandlerError, OperationParams, PathParams};
use serde_json::{json, Value};

use super::next::Next;
use super::registry::ResourceService;

// ---------------------------------------------------------------------------
// Controller trait
// ---------------------------------------------------------------------------

/// Handles the operations of one API resource.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Run the operation named `operation_id`.
    ///
    /// The controller owns the response: the router does not run `next` for
    /// it. An `Err` is reported through the router's failure path.
    async fn invoke(
        &self,
        operation_id: &str,
        request: Request<Body>,
        next: Next,
    ) -> Result<Response, HandlerError>;
}

// ---------------------------------------------------------------------------
// ResourceOperation
// ---------------------------------------------------------------------------

/// Closed set of operations a resource supports, keyed by OpenAPI `operationId`.
pub trait ResourceOperation: Copy + Send + Sync + 'static {
    /// Resource name, e.g. `"Inventory"`.
    const RESOURCE: &'static str;
    /// Registry name of the resource's controller.
    const CONTROLLER: &'static str;
    /// Registry name of the resource's service.
    const SERVICE: &'static str;
    const ALL: &'static [Self];

    fn operation_id(self) -> &'static str;

    #[must_use]
    fn from_operation_id(operation_id: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.operation_id() == operation_id)
    }
}

// ---------------------------------------------------------------------------
// ResourceController
// ---------------------------------------------------------------------------

/// Controller that forwards each operation of `O` to the bound service.
///
/// Request parameters are collected into a JSON object: path parameters,
/// query parameters (path wins on clashes), and the JSON body under `"body"`.
/// A service rejection becomes a JSON `{"error": ...}` response with the
/// rejection's status; it does not go through the router's failure path.
pub struct ResourceController<O> {
    service: Option<Arc<dyn ResourceService>>,
    _operations: PhantomData<fn() -> O>,
}

impl<O: ResourceOperation> ResourceController<O> {
    #[must_use]
    pub fn new(service: Option<Arc<dyn ResourceService>>) -> Self {
        Self {
            service,
            _operations: PhantomData,
        }
    }
}

#[async_trait]
impl<O: ResourceOperation> Controller for ResourceController<O> {
    async fn invoke(
        &self,
        operation_id: &str,
        request: Request<Body>,
        _next: Next,
    ) -> Result<Response, HandlerError> {
        let operation = O::from_operation_id(operation_id)
            .ok_or_else(|| HandlerError::operation_not_found(O::CONTROLLER, operation_id))?;
        let params = collect_params(request).await?;

        let Some(service) = &self.service else {
            return Err(HandlerError::new(format!(
                "{} has no service bound for {operation_id}",
                O::CONTROLLER
            )));
        };

        tracing::debug!(
            resource = O::RESOURCE,
            controller = O::CONTROLLER,
            service = service.name(),
            operation = operation.operation_id(),
            "invoking service"
        );

        let response = match service.handle(operation.operation_id(), params).await {
            Ok(ok) => json_response(ok.code, &ok.payload),
            Err(rejection) => json_response(rejection.code, &json!({ "error": rejection.message })),
        };
        Ok(response)
    }
}

/// Gathers path params, query params and the JSON body of `request`.
///
/// # Errors
///
/// Returns a 400 [`HandlerError`] for a malformed query string, an unreadable
/// body, or a body that is not JSON, and a 413 when the body exceeds the
/// transport's size limit.
pub async fn collect_params(request: Request<Body>) -> Result<OperationParams, HandlerError> {
    let (parts, body) = request.into_parts();
    let mut params = OperationParams::new();

    if let Some(path) = parts.extensions.get::<PathParams>() {
        for (name, value) in path.iter() {
            params.insert(name.clone(), Value::String(value.clone()));
        }
    }

    if parts.uri.query().is_some() {
        let Query(query) = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|e| HandlerError::with_code(400, format!("invalid query string: {e}")))?;
        for (name, value) in query {
            params.entry(name).or_insert(Value::String(value));
        }
    }

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(body_read_error)?;
    if !bytes.is_empty() {
        let body: Value = serde_json::from_slice(&bytes)
            .map_err(|e| HandlerError::with_code(400, format!("request body is not valid JSON: {e}")))?;
        params.insert("body".to_string(), body);
    }

    Ok(params)
}

/// 413 when the body hit the transport's size limit, 400 otherwise.
fn body_read_error(err: axum::Error) -> HandlerError {
    let over_limit = std::iter::successors(
        Some(&err as &(dyn std::error::Error + 'static)),
        |e| e.source(),
    )
    .any(|e| e.is::<LengthLimitError>());

    if over_limit {
        HandlerError::with_code(413, "request body exceeds the size limit")
    } else {
        HandlerError::with_code(400, format!("failed to read request body: {err}"))
    }
}

fn json_response(code: u16, payload: &Value) -> Response {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(payload)).into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
