//! Code Sandbox Server
//!
//! MCP server that copies local project directories into running
//! containers and optionally runs a command in the copied tree.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;
mod domain;
mod error;
mod infra;
mod service;

use config::Config;
use service::copy::CopyService;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub copy_service: Arc<CopyService>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            copy_service: Arc::new(CopyService::new(config.clone())),
            config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first to pick the log writer
    dotenvy::dotenv().ok();
    let config = Arc::new(Config::load()?);

    // Initialize tracing - use stderr for MCP stdio mode to avoid polluting stdout
    if config.mcp_mode == "stdio" {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(
                EnvFilter::builder()
                    .with_default_directive(Level::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(
                EnvFilter::builder()
                    .with_default_directive(Level::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    }

    info!("Starting Code Sandbox Server");
    info!(
        "Default destination {}, exec poll interval {:?}",
        config.default_dest_dir,
        config.exec_poll_interval()
    );

    let state = AppState::new(config.clone());

    match config.mcp_mode.as_str() {
        "stdio" => api::mcp::serve_stdio(state).await,
        "http" => serve_http(state).await,
        other => anyhow::bail!("Unknown MCP mode '{}', expected 'stdio' or 'http'", other),
    }
}

async fn serve_http(state: AppState) -> anyhow::Result<()> {
    let config = state.config.clone();
    let http_addr: SocketAddr = format!("{}:{}", config.http_host, config.http_port).parse()?;

    info!("HTTP listening on {}", http_addr);
    info!("MCP endpoint at {}", config.mcp_path);

    let app = api::http::create_router(state);

    axum::serve(
        tokio::net::TcpListener::bind(http_addr).await?,
        app.into_make_service(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
