//! Pantry core: schema descriptors, error envelopes, service envelopes and
//! the OpenAPI route table shared by the server.

pub mod envelope;
pub mod error;
pub mod openapi;
pub mod schema;
pub mod types;

pub use envelope::{ErrorEnvelope, DEFAULT_ERROR_CODE};
pub use error::{HandlerError, ServiceError};
pub use openapi::{DocumentError, OpenApiDocument, RouteMatch, RouteTable};
pub use schema::{PathParams, SchemaDescriptor};
pub use types::{OperationParams, ServiceResponse};
