//! Network module with deferred startup lifecycle.
//!
//! `new()` assembles shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context as _;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, liveness_handler, not_found_handler, readiness_handler, AppState,
};
use super::middleware::{build_http_layers, track_in_flight};
use super::shutdown::ShutdownController;
use crate::service::middleware::{build_api_pipeline, ApiComponents};

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- allocates the shutdown controller
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- serves until the shutdown future resolves, then drains
pub struct NetworkModule {
    config: NetworkConfig,
    api: ApiComponents,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    start_time: Instant,
}

impl NetworkModule {
    /// Creates a network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, api: ApiComponents) -> Self {
        Self {
            config,
            api,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        }
    }

    /// Shared shutdown controller, for health checks or triggering shutdown.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router.
    ///
    /// Every request passes the HTTP layers and the in-flight tracker, then
    /// the API pipeline. Requests that match no documented operation fall
    /// through to:
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    /// - anything else -- 404 error envelope
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            operations: self.api.routes.len(),
        };

        let fallthrough = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .fallback(not_found_handler)
            .with_state(state);

        Router::new()
            .fallback_service(build_api_pipeline(&self.api, fallthrough))
            .layer(axum::middleware::from_fn_with_state(
                Arc::clone(&self.shutdown),
                track_in_flight,
            ))
            .layer(build_http_layers(&self.config))
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the bound port, which differs from the configured one when
    /// port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until `shutdown` resolves.
    ///
    /// Calling [`ShutdownController::trigger_shutdown`] on the shared
    /// controller stops the server as well.
    ///
    /// After the signal the health state moves to Draining, open connections
    /// finish, and in-flight requests get up to `drain_timeout` before the
    /// state moves to Stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called, or if the server hits a
    /// fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let router = self.build_router();
        let Some(listener) = self.listener else {
            anyhow::bail!("start() must be called before serve()");
        };
        let controller = self.shutdown;

        // Stops on the caller's future or on `trigger_shutdown()` from any holder.
        let signal = {
            let controller = Arc::clone(&controller);
            async move {
                tokio::select! {
                    () = shutdown => {
                        info!("shutdown signal received, draining");
                        controller.trigger_shutdown();
                    }
                    () = controller.triggered() => {
                        info!("shutdown triggered, draining");
                    }
                }
            }
        };

        controller.set_ready();
        info!(operations = self.api.routes.len(), "serving HTTP");

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await?;

        controller.trigger_shutdown();
        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("all requests drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "drain timeout expired with requests remaining"
            );
        }
        Ok(())
    }
}
