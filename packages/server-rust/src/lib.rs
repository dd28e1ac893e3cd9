//! Pantry server: OpenAPI-annotated requests dispatched to resource controllers over axum.

pub mod network;
pub mod service;

pub use network::{NetworkConfig, NetworkModule};
pub use service::{ApiComponents, ServerConfig};
