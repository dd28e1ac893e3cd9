//! OpenAPI operation dispatch.
//!
//! This module implements the request pipeline in front of the HTTP fallback:
//!
//! 1. **Annotation** (`middleware::annotate`): request -> `SchemaDescriptor` + `PathParams`
//! 2. **Dispatch** (`router`): resolve the named controller and run its operation
//! 3. **Controllers** (`controller`): collect parameters, call the resource service
//! 4. **Domain services** (`domain`): Stub implementations per restaurant resource
//! 5. **Failure rendering** (`failure`): every dispatch error becomes one envelope

pub mod config;
pub mod controller;
pub mod domain;
pub mod failure;
pub mod middleware;
pub mod next;
pub mod operation;
pub mod registry;
pub mod router;

// Re-export key types for convenient access.
pub use config::ServerConfig;
pub use controller::{Controller, ResourceController, ResourceOperation};
pub use failure::{ErrorRenderer, JsonErrorRenderer};
pub use middleware::{build_api_pipeline, ApiComponents};
pub use next::Next;
pub use operation::DispatchError;
pub use registry::{ControllerRegistry, ResourceService, ServiceContext, ServiceRegistry};
pub use router::{DispatchLayer, DispatchService};
