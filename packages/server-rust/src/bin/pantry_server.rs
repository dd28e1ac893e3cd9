//! `pantry-server` binary: parses flags, installs logging, and serves the API.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use pantry_server::network::{NetworkConfig, NetworkModule, DEFAULT_MAX_BODY_BYTES};
use pantry_server::service::{ApiComponents, ServerConfig, ServiceContext};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "pantry-server", version, about = "Restaurant inventory API server")]
struct Args {
    /// Address to bind.
    #[arg(long, env = "PANTRY_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "PANTRY_PORT", default_value_t = 8080)]
    port: u16,

    /// OpenAPI document (JSON or YAML). The bundled document is used when absent.
    #[arg(long, env = "PANTRY_OPENAPI")]
    openapi: Option<PathBuf>,

    /// Allowed CORS origins, comma separated. `*` allows any.
    #[arg(
        long = "cors-origin",
        env = "PANTRY_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    cors_origins: Vec<String>,

    #[arg(long, env = "PANTRY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    #[arg(long, env = "PANTRY_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,

    /// Emit logs as JSON lines.
    #[arg(long, env = "PANTRY_LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_body_bytes: self.max_body_bytes,
            ..NetworkConfig::default()
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            openapi_path: self.openapi.clone(),
            ..ServerConfig::default()
        }
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().with_target(true).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_json);

    let server_config = Arc::new(args.server_config());
    let document = server_config
        .load_document()
        .context("failed to load OpenAPI document")?;
    let api = ApiComponents::from_document(&document).context("invalid OpenAPI document")?;

    let ctx = ServiceContext {
        config: Arc::clone(&server_config),
    };
    api.services.init_all(&ctx).await?;

    let mut network = NetworkModule::new(args.network_config(), api.clone());
    let port = network.start().await?;
    info!(
        instance = %server_config.instance_name,
        host = %args.host,
        port,
        "pantry-server listening"
    );

    let served = network.serve(shutdown_signal()).await;

    if let Err(e) = api.services.shutdown_all(false).await {
        error!(error = %e, "service shutdown failed");
    }
    served
}
