//! HTTP handlers for requests that no API operation claims.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports the handler functions used to build the
//! fallthrough router.

pub mod fallback;
pub mod health;

pub use fallback::not_found_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;

/// Shared application state passed to handlers via `State` extraction.
#[derive(Clone)]
pub struct AppState {
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
    /// Number of documented API operations being routed.
    pub operations: usize,
}
