//! Pipeline composition: OpenAPI annotation followed by controller dispatch.

use std::sync::Arc;

use pantry_core::{DocumentError, OpenApiDocument, RouteTable};
use tower::ServiceBuilder;

use super::annotate::{AnnotateLayer, AnnotateService};
use crate::service::domain;
use crate::service::failure::{ErrorRenderer, JsonErrorRenderer};
use crate::service::registry::{ControllerRegistry, ServiceRegistry};
use crate::service::router::{DispatchLayer, DispatchService};

/// The service stack returned by [`build_api_pipeline`].
pub type ApiPipeline<S> = AnnotateService<DispatchService<S>>;

/// Everything the API pipeline needs, built once at startup.
#[derive(Clone)]
pub struct ApiComponents {
    pub routes: Arc<RouteTable>,
    pub controllers: Arc<ControllerRegistry>,
    pub services: Arc<ServiceRegistry>,
    pub renderer: Arc<dyn ErrorRenderer>,
}

impl ApiComponents {
    #[must_use]
    pub fn new(routes: RouteTable, controllers: ControllerRegistry, services: ServiceRegistry) -> Self {
        Self {
            routes: Arc::new(routes),
            controllers: Arc::new(controllers),
            services: Arc::new(services),
            renderer: Arc::new(JsonErrorRenderer),
        }
    }

    /// Routes `doc` to the built-in pantry resources.
    ///
    /// # Errors
    ///
    /// Returns an error if a path template in `doc` is malformed.
    pub fn from_document(doc: &OpenApiDocument) -> Result<Self, DocumentError> {
        let routes = RouteTable::from_document(doc)?;
        let mut controllers = ControllerRegistry::new();
        let mut services = ServiceRegistry::new();
        domain::register_all(&mut controllers, &mut services);

        for entry in routes.entries() {
            tracing::debug!(
                method = entry.method(),
                template = entry.template(),
                controller = %entry.descriptor().controller_name,
                operation = entry.descriptor().operation_label(),
                "route"
            );
        }
        tracing::info!(
            operations = routes.len(),
            controllers = controllers.len(),
            services = services.len(),
            "API components ready"
        );
        Ok(Self::new(routes, controllers, services))
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn ErrorRenderer>) -> Self {
        self.renderer = renderer;
        self
    }
}

/// Wrap `fallthrough` with the API layers.
///
/// Layer order (outermost to innermost):
/// 1. `AnnotateLayer` -- match the request against the OpenAPI routes
/// 2. `DispatchLayer` -- hand annotated requests to their controller
///
/// Requests that match no documented operation reach `fallthrough`.
#[must_use]
pub fn build_api_pipeline<S>(components: &ApiComponents, fallthrough: S) -> ApiPipeline<S> {
    ServiceBuilder::new()
        .layer(AnnotateLayer::new(Arc::clone(&components.routes)))
        .layer(
            DispatchLayer::new(
                Arc::clone(&components.controllers),
                Arc::clone(&components.services),
            )
            .with_renderer(Arc::clone(&components.renderer)),
        )
        .service(fallthrough)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
