//! Schema dispatch: routes annotated requests to controllers by name.

use std::any::Any;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::Response;
use futures_util::FutureExt;
use http::Request;
use pantry_core::SchemaDescriptor;
use tower::{Layer, Service, ServiceExt};
use tracing::{info_span, Instrument};

use super::failure::{ErrorRenderer, JsonErrorRenderer};
use super::next::Next;
use super::operation::DispatchError;
use super::registry::{ControllerRegistry, ServiceRegistry};

type BoxedFuture = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

// ---------------------------------------------------------------------------
// DispatchLayer
// ---------------------------------------------------------------------------

/// Tower layer that dispatches requests carrying a [`SchemaDescriptor`] to
/// the named controller.
///
/// Requests without a descriptor go to the wrapped service untouched.
#[derive(Clone)]
pub struct DispatchLayer {
    controllers: Arc<ControllerRegistry>,
    services: Arc<ServiceRegistry>,
    renderer: Arc<dyn ErrorRenderer>,
}

impl DispatchLayer {
    /// Layer reporting failures through [`JsonErrorRenderer`].
    #[must_use]
    pub fn new(controllers: Arc<ControllerRegistry>, services: Arc<ServiceRegistry>) -> Self {
        Self {
            controllers,
            services,
            renderer: Arc::new(JsonErrorRenderer),
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn ErrorRenderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

impl<S> Layer<S> for DispatchLayer {
    type Service = DispatchService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        DispatchService {
            inner,
            controllers: Arc::clone(&self.controllers),
            services: Arc::clone(&self.services),
            renderer: Arc::clone(&self.renderer),
        }
    }
}

// ---------------------------------------------------------------------------
// DispatchService
// ---------------------------------------------------------------------------

/// Service produced by [`DispatchLayer`].
///
/// Per request, exactly one of: the inner service runs (no descriptor), one
/// controller operation runs once, or one failure is rendered.
#[derive(Clone)]
pub struct DispatchService<S> {
    inner: S,
    controllers: Arc<ControllerRegistry>,
    services: Arc<ServiceRegistry>,
    renderer: Arc<dyn ErrorRenderer>,
}

impl<S> Service<Request<Body>> for DispatchService<S>
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxedFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // The inner service is cloned per call and driven to readiness by `oneshot`.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, clone);

        let Some(descriptor) = request.extensions().get::<SchemaDescriptor>().cloned() else {
            return Box::pin(inner.oneshot(request));
        };

        let controllers = Arc::clone(&self.controllers);
        let services = Arc::clone(&self.services);
        let renderer = Arc::clone(&self.renderer);

        let span = info_span!(
            "dispatch",
            controller = %descriptor.controller_name,
            operation = descriptor.operation_label(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let start = Instant::now();
                let result = dispatch(
                    &controllers,
                    &services,
                    &descriptor,
                    request,
                    Next::new(inner),
                )
                .await;

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = start.elapsed().as_millis() as u64;
                let span = tracing::Span::current();
                span.record("duration_ms", duration_ms);

                match result {
                    Ok(response) => {
                        span.record("outcome", "ok");
                        tracing::debug!(
                            status = response.status().as_u16(),
                            duration_ms,
                            "dispatch complete"
                        );
                        Ok(response)
                    }
                    Err(err) => {
                        span.record("outcome", "error");
                        Ok(fail(renderer.as_ref(), &descriptor, &err))
                    }
                }
            }
            .instrument(span),
        )
    }
}

/// Resolves the controller and runs the operation once.
async fn dispatch(
    controllers: &ControllerRegistry,
    services: &ServiceRegistry,
    descriptor: &SchemaDescriptor,
    request: Request<Body>,
    next: Next,
) -> Result<Response, DispatchError> {
    let factory = controllers
        .get(&descriptor.controller_name)
        .ok_or_else(|| DispatchError::UnresolvedController {
            name: descriptor.controller_name.clone(),
        })?;
    let operation_id =
        descriptor
            .operation_id
            .as_deref()
            .ok_or_else(|| DispatchError::MissingOperation {
                controller: descriptor.controller_name.clone(),
            })?;

    // A missing or unknown service name binds no service.
    let service = descriptor
        .service_name
        .as_deref()
        .and_then(|name| services.get(name));

    let invocation = AssertUnwindSafe(async move {
        let controller = factory(service);
        controller.invoke(operation_id, request, next).await
    });

    match invocation.catch_unwind().await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(err)) => Err(DispatchError::Handler(err)),
        Err(panic) => Err(DispatchError::Panicked {
            message: panic_message(panic.as_ref()),
        }),
    }
}

/// Failure path: log, render once, set the status, attach the envelope.
fn fail(renderer: &dyn ErrorRenderer, descriptor: &SchemaDescriptor, err: &DispatchError) -> Response {
    let envelope = err.to_envelope();
    tracing::error!(
        code = envelope.code,
        controller = %descriptor.controller_name,
        operation = descriptor.operation_label(),
        error = %err,
        "dispatch failed"
    );

    let payload = envelope.to_payload();
    let mut response = renderer.render(&envelope, payload);
    *response.status_mut() =
        StatusCode::from_u16(envelope.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    response.extensions_mut().insert(envelope);
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use axum::response::IntoResponse;
    use pantry_core::{ErrorEnvelope, HandlerError, OperationParams, ServiceError, ServiceResponse};
    use proptest::prelude::*;

    use super::*;
    use crate::service::controller::Controller;
    use crate::service::registry::ResourceService;

    /// Fallthrough service counting how often the router continues.
    #[derive(Clone, Default)]
    struct CountingNext {
        calls: Arc<AtomicUsize>,
    }

    impl Service<Request<Body>> for CountingNext {
        type Response = Response;
        type Error = Infallible;
        type Future = std::future::Ready<Result<Response, Infallible>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request<Body>) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(StatusCode::NOT_FOUND.into_response()))
        }
    }

    /// Renderer recording every payload it receives.
    #[derive(Default)]
    struct RecordingRenderer {
        payloads: Mutex<Vec<String>>,
    }

    impl ErrorRenderer for RecordingRenderer {
        fn render(&self, envelope: &ErrorEnvelope, payload: String) -> Response {
            self.payloads.lock().unwrap().push(payload);
            JsonErrorRenderer.render(envelope, String::new())
        }
    }

    #[derive(Clone)]
    enum Behavior {
        Succeed,
        Fail(HandlerError),
        Panic,
        Forward,
    }

    struct WidgetsController {
        calls: Arc<AtomicUsize>,
        behavior: Behavior,
        service: Option<Arc<dyn ResourceService>>,
    }

    #[async_trait]
    impl Controller for WidgetsController {
        async fn invoke(
            &self,
            operation_id: &str,
            request: Request<Body>,
            next: Next,
        ) -> Result<Response, HandlerError> {
            if operation_id != "get" {
                return Err(HandlerError::operation_not_found("Widgets", operation_id));
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed => {
                    let service = self.service.as_ref().map_or("none", |s| s.name());
                    Ok((StatusCode::OK, service).into_response())
                }
                Behavior::Fail(err) => Err(err.clone()),
                Behavior::Panic => panic!("widget index out of range"),
                Behavior::Forward => Ok(next.run(request).await),
            }
        }
    }

    struct WidgetsSvc;

    #[async_trait]
    impl ResourceService for WidgetsSvc {
        fn name(&self) -> &'static str {
            "WidgetsSvc"
        }

        async fn handle(
            &self,
            _operation_id: &'static str,
            params: OperationParams,
        ) -> Result<ServiceResponse, ServiceError> {
            Ok(ServiceResponse::success(params.into()))
        }
    }

    struct Harness {
        service: DispatchService<CountingNext>,
        next_calls: Arc<AtomicUsize>,
        handler_calls: Arc<AtomicUsize>,
        renderer: Arc<RecordingRenderer>,
    }

    fn harness(behavior: Behavior) -> Harness {
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let mut controllers = ControllerRegistry::new();
        let calls = handler_calls.clone();
        controllers.register("Widgets", move |service| WidgetsController {
            calls: calls.clone(),
            behavior: behavior.clone(),
            service,
        });

        let mut services = ServiceRegistry::new();
        services.register(WidgetsSvc);

        let renderer = Arc::new(RecordingRenderer::default());
        let next = CountingNext::default();
        let next_calls = next.calls.clone();
        let service = DispatchLayer::new(Arc::new(controllers), Arc::new(services))
            .with_renderer(renderer.clone())
            .layer(next);

        Harness {
            service,
            next_calls,
            handler_calls,
            renderer,
        }
    }

    fn request(descriptor: Option<SchemaDescriptor>) -> Request<Body> {
        let mut request = Request::builder()
            .uri("/api/v1/widgets/1")
            .body(Body::empty())
            .unwrap();
        if let Some(descriptor) = descriptor {
            request.extensions_mut().insert(descriptor);
        }
        request
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn no_descriptor_falls_through_untouched() {
        let h = harness(Behavior::Succeed);
        let response = h.service.oneshot(request(None)).await.unwrap();

        assert_eq!(h.next_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
        assert!(h.renderer.payloads.lock().unwrap().is_empty());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.extensions().get::<ErrorEnvelope>().is_none());
    }

    #[tokio::test]
    async fn unresolved_controller_is_400() {
        let mut controllers = ControllerRegistry::new();
        controllers.register("Gadgets", |service| WidgetsController {
            calls: Arc::new(AtomicUsize::new(0)),
            behavior: Behavior::Succeed,
            service,
        });
        let renderer = Arc::new(RecordingRenderer::default());
        let svc = DispatchLayer::new(Arc::new(controllers), Arc::new(ServiceRegistry::new()))
            .with_renderer(renderer.clone())
            .layer(CountingNext::default());

        let descriptor = SchemaDescriptor::new("Widgets", "list");
        let response = svc.oneshot(request(Some(descriptor))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let payloads = renderer.payloads.lock().unwrap().clone();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].contains("400"));
        let envelope = ErrorEnvelope::from_payload(&payloads[0]).unwrap();
        assert_eq!(envelope.code, 400);
        assert!(envelope.error.as_str().unwrap().contains("Widgets"));
        assert_eq!(response.extensions().get::<ErrorEnvelope>(), Some(&envelope));
    }

    #[tokio::test]
    async fn empty_controller_name_is_400() {
        let h = harness(Behavior::Succeed);
        let descriptor = SchemaDescriptor::new("", "get");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_operation_id_is_400() {
        let h = harness(Behavior::Succeed);
        let descriptor = SchemaDescriptor {
            controller_name: "Widgets".to_string(),
            service_name: None,
            operation_id: None,
        };
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.next_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.renderer.payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn success_invokes_handler_once_without_continuing() {
        let h = harness(Behavior::Succeed);
        let descriptor = SchemaDescriptor::new("Widgets", "get").with_service("WidgetsSvc");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(h.handler_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.next_calls.load(Ordering::SeqCst), 0);
        assert!(h.renderer.payloads.lock().unwrap().is_empty());
        assert_eq!(body_string(response).await, "WidgetsSvc");
    }

    #[tokio::test]
    async fn omitted_or_unknown_service_binds_none() {
        let h = harness(Behavior::Succeed);
        let response = h
            .service
            .clone()
            .oneshot(request(Some(SchemaDescriptor::new("Widgets", "get"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "none");

        let descriptor = SchemaDescriptor::new("Widgets", "get").with_service("NoSuchSvc");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();
        assert_eq!(body_string(response).await, "none");
    }

    #[tokio::test]
    async fn handler_can_continue_explicitly() {
        let h = harness(Behavior::Forward);
        let descriptor = SchemaDescriptor::new("Widgets", "get");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(h.next_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_error_without_code_is_500_and_logged() {
        use tracing_subscriber::fmt::MakeWriter;

        #[derive(Clone, Default)]
        struct Capture(Arc<Mutex<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> MakeWriter<'a> for Capture {
            type Writer = Capture;

            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let h = harness(Behavior::Fail(HandlerError::new("boom")));
        let descriptor = SchemaDescriptor::new("Widgets", "get").with_service("WidgetsSvc");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.handler_calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.renderer.payloads.lock().unwrap().len(), 1);

        let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("dispatch failed"));
        assert!(logs.contains("boom"));
    }

    #[tokio::test]
    async fn handler_error_code_is_preserved() {
        let h = harness(Behavior::Fail(HandlerError::with_code(403, "not your kitchen")));
        let descriptor = SchemaDescriptor::new("Widgets", "get");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let envelope = response.extensions().get::<ErrorEnvelope>().unwrap();
        assert_eq!(envelope, &ErrorEnvelope::message(403, "not your kitchen"));
    }

    #[tokio::test]
    async fn status_envelope_and_payload_agree_for_non_error_codes() {
        for code in [0, 42, 101, 1000] {
            let h = harness(Behavior::Fail(HandlerError::with_code(code, "odd")));
            let descriptor = SchemaDescriptor::new("Widgets", "get");
            let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();

            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR, "code {code}");
            let envelope = response.extensions().get::<ErrorEnvelope>().unwrap();
            assert_eq!(envelope.code, 500, "code {code}");
            let payloads = h.renderer.payloads.lock().unwrap().clone();
            assert_eq!(ErrorEnvelope::from_payload(&payloads[0]).unwrap().code, 500);
        }
    }

    #[tokio::test]
    async fn unknown_operation_on_resolved_controller_is_500() {
        let h = harness(Behavior::Succeed);
        let descriptor = SchemaDescriptor::new("Widgets", "explode");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.handler_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_handler_is_500() {
        let h = harness(Behavior::Panic);
        let descriptor = SchemaDescriptor::new("Widgets", "get");
        let response = h.service.oneshot(request(Some(descriptor))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let payloads = h.renderer.payloads.lock().unwrap().clone();
        assert_eq!(payloads.len(), 1);
        assert!(payloads[0].contains("widget index out of range"));
    }

    #[tokio::test]
    async fn default_renderer_writes_json_body() {
        let svc = DispatchLayer::new(
            Arc::new(ControllerRegistry::new()),
            Arc::new(ServiceRegistry::new()),
        )
        .layer(CountingNext::default());
        let response = svc
            .oneshot(request(Some(SchemaDescriptor::new("Widgets", "list"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let envelope = ErrorEnvelope::from_payload(&body_string(response).await).unwrap();
        assert_eq!(envelope.code, 400);
    }

    /// Outcome of one dispatch, for comparing classifications.
    async fn classify(behavior: Behavior, descriptor: &SchemaDescriptor) -> (u16, usize, usize) {
        let h = harness(behavior);
        let response = h
            .service
            .oneshot(request(Some(descriptor.clone())))
            .await
            .unwrap();
        let failures = h.renderer.payloads.lock().unwrap().len();
        (
            response.status().as_u16(),
            h.handler_calls.load(Ordering::SeqCst),
            failures,
        )
    }

    #[tokio::test]
    async fn repeated_dispatch_classifies_identically() {
        let cases = [
            (Behavior::Succeed, SchemaDescriptor::new("Widgets", "get")),
            (Behavior::Succeed, SchemaDescriptor::new("Nope", "get")),
            (
                Behavior::Fail(HandlerError::with_code(409, "conflict")),
                SchemaDescriptor::new("Widgets", "get"),
            ),
        ];
        for (behavior, descriptor) in cases {
            let first = classify(behavior.clone(), &descriptor).await;
            let second = classify(behavior, &descriptor).await;
            assert_eq!(first, second);
        }
    }

    proptest! {
        #[test]
        fn unregistered_controllers_always_fail_with_400(
            name in "[A-Za-z]{1,16}",
            operation in "[a-z]{1,12}",
        ) {
            prop_assume!(name != "Widgets");
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let descriptor = SchemaDescriptor::new(name, operation);
            let (status, handler_calls, failures) =
                runtime.block_on(classify(Behavior::Succeed, &descriptor));
            prop_assert_eq!(status, 400);
            prop_assert_eq!(handler_calls, 0);
            prop_assert_eq!(failures, 1);
        }

        #[test]
        fn handler_codes_pass_through(code in 400u16..600) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let descriptor = SchemaDescriptor::new("Widgets", "get");
            let behavior = Behavior::Fail(HandlerError::with_code(code, "rejected"));
            let (status, handler_calls, failures) =
                runtime.block_on(classify(behavior, &descriptor));
            prop_assert_eq!(status, code);
            prop_assert_eq!(handler_calls, 1);
            prop_assert_eq!(failures, 1);
        }
    }
}
