//! MCP (Model Context Protocol) API layer
//!
//! This module provides MCP server functionality, allowing AI assistants
//! to copy projects into containers through a standard tool call.

mod handler;
mod types;

pub use handler::SandboxMcpHandler;

use rmcp::transport::stdio;
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use rmcp::ServiceExt;
use tracing::info;

use crate::AppState;

/// Start MCP server in stdio mode
///
/// This runs the MCP server using stdin/stdout for communication,
/// suitable for local CLI usage with AI assistants.
pub async fn serve_stdio(state: AppState) -> anyhow::Result<()> {
    info!("Starting MCP server in stdio mode");

    let handler = SandboxMcpHandler::new(state);
    let service = handler.serve(stdio()).await?;

    info!("MCP server ready, waiting for requests...");
    service.waiting().await?;

    info!("MCP server shutdown");
    Ok(())
}

/// Streamable HTTP MCP service, one handler per session
pub fn create_mcp_service(
    state: AppState,
) -> StreamableHttpService<SandboxMcpHandler, LocalSessionManager> {
    StreamableHttpService::new(
        move || Ok(SandboxMcpHandler::new(state.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    )
}
