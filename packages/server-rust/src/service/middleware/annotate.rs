//! OpenAPI annotation middleware.
//!
//! Matches each request against the route table and, on a match, attaches the
//! operation's [`SchemaDescriptor`] and [`PathParams`] as request extensions
//! for the dispatch router.

use std::sync::Arc;
use std::task::{Context, Poll};

use http::Request;
use pantry_core::{PathParams, RouteTable, SchemaDescriptor};
use tower::{Layer, Service};

// ---------------------------------------------------------------------------
// AnnotateLayer
// ---------------------------------------------------------------------------

/// Tower layer attaching schema descriptors to documented requests.
#[derive(Debug, Clone)]
pub struct AnnotateLayer {
    routes: Arc<RouteTable>,
}

impl AnnotateLayer {
    #[must_use]
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }
}

impl<S> Layer<S> for AnnotateLayer {
    type Service = AnnotateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AnnotateService {
            inner,
            routes: Arc::clone(&self.routes),
        }
    }
}

// ---------------------------------------------------------------------------
// AnnotateService
// ---------------------------------------------------------------------------

/// Service wrapper that annotates matched requests before forwarding them.
///
/// Unmatched requests are forwarded unchanged.
#[derive(Debug, Clone)]
pub struct AnnotateService<S> {
    inner: S,
    routes: Arc<RouteTable>,
}

impl<S, B> Service<Request<B>> for AnnotateService<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<B>) -> Self::Future {
        let matched = self
            .routes
            .lookup(request.method().as_str(), request.uri().path())
            .map(|m| (m.descriptor.clone(), m.params));

        if let Some((descriptor, params)) = matched {
            tracing::trace!(
                controller = %descriptor.controller_name,
                operation = descriptor.operation_label(),
                "request matched API operation"
            );
            request.extensions_mut().insert::<SchemaDescriptor>(descriptor);
            request.extensions_mut().insert::<PathParams>(params);
        }

        self.inner.call(request)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
