//! The continuation handed to controllers.

use std::convert::Infallible;

use axum::body::Body;
use axum::response::Response;
use http::Request;
use tower::util::BoxCloneService;
use tower::{Service, ServiceExt};

/// The rest of the middleware chain after the dispatch router.
///
/// A controller that decides not to answer a request itself can hand it on
/// with [`Next::run`]. The router never runs it on the controller's behalf.
pub struct Next {
    inner: BoxCloneService<Request<Body>, Response, Infallible>,
}

impl Next {
    pub fn new<S>(service: S) -> Self
    where
        S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        Self {
            inner: BoxCloneService::new(service),
        }
    }

    /// Passes the request to the remaining chain and returns its response.
    pub async fn run(self, request: Request<Body>) -> Response {
        match self.inner.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}
