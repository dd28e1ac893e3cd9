use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pantry_core::{OperationParams, ServiceError, ServiceResponse};

use super::config::ServerConfig;
use super::controller::{Controller, ResourceController, ResourceOperation};

// ---------------------------------------------------------------------------
// ServiceContext
// ---------------------------------------------------------------------------

/// Context provided to services during initialization.
#[derive(Debug, Clone)]
pub struct ServiceContext {
    pub config: Arc<ServerConfig>,
}

// ---------------------------------------------------------------------------
// ResourceService trait
// ---------------------------------------------------------------------------

/// Business logic behind one API resource.
///
/// Services are registered with a [`ServiceRegistry`], initialized in
/// registration order, and shut down in reverse registration order.
#[async_trait]
pub trait ResourceService: Send + Sync {
    /// Registry name of this service (e.g., `"InventoryService"`).
    fn name(&self) -> &'static str;

    /// Initialize the service with the given context.
    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Shut down the service. If `terminate` is true, skip graceful cleanup.
    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        Ok(())
    }

    /// Run `operation_id` with the collected request parameters.
    async fn handle(
        &self,
        operation_id: &'static str,
        params: OperationParams,
    ) -> Result<ServiceResponse, ServiceError>;
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Name-indexed registry of resource services.
///
/// Populated at startup, then shared read-only behind an `Arc`.
#[derive(Default)]
pub struct ServiceRegistry {
    by_name: HashMap<&'static str, Arc<dyn ResourceService>>,
    /// Registration order for deterministic init/shutdown sequencing.
    init_order: Vec<&'static str>,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under its `name()`. Registering the same name again
    /// replaces the service but keeps its original position in the init order.
    pub fn register<T: ResourceService + 'static>(&mut self, service: T) {
        let name = service.name();
        if self.by_name.insert(name, Arc::new(service)).is_none() {
            self.init_order.push(name);
        }
    }

    /// Retrieve a service by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn ResourceService>> {
        self.by_name.get(name).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.init_order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.init_order.is_empty()
    }

    /// Initialize all registered services in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if any service's `init()` call fails.
    pub async fn init_all(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        for name in &self.init_order {
            if let Some(service) = self.get(name) {
                service.init(ctx).await?;
                tracing::debug!(service = *name, "service initialized");
            }
        }
        Ok(())
    }

    /// Shut down all registered services in reverse registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if any service's `shutdown()` call fails.
    pub async fn shutdown_all(&self, terminate: bool) -> anyhow::Result<()> {
        for name in self.init_order.iter().rev() {
            if let Some(service) = self.get(name) {
                service.shutdown(terminate).await?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ControllerRegistry
// ---------------------------------------------------------------------------

/// Builds a controller bound to the service resolved for the request.
pub type ControllerFactory =
    Arc<dyn Fn(Option<Arc<dyn ResourceService>>) -> Box<dyn Controller> + Send + Sync>;

/// Name-indexed registry of controller factories.
#[derive(Default)]
pub struct ControllerRegistry {
    factories: HashMap<String, ControllerFactory>,
}

impl ControllerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory producing a controller from an optional service.
    pub fn register<F, C>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<Arc<dyn ResourceService>>) -> C + Send + Sync + 'static,
        C: Controller + 'static,
    {
        self.factories.insert(
            name.into(),
            Arc::new(move |service| Box::new(factory(service)) as Box<dyn Controller>),
        );
    }

    /// Register the generic [`ResourceController`] for the operations `O`
    /// under `O::CONTROLLER`.
    pub fn register_resource<O: ResourceOperation>(&mut self) {
        self.register(O::CONTROLLER, ResourceController::<O>::new);
    }

    /// Look up a factory. Empty names never resolve.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ControllerFactory> {
        if name.is_empty() {
            return None;
        }
        self.factories.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
