//! OpenAPI document loading and request-to-operation matching.

pub mod document;
pub mod route;

pub use document::{DocumentError, OpenApiDocument, OperationObject, PathItem, ServerObject};
pub use route::{RouteEntry, RouteMatch, RouteTable};
