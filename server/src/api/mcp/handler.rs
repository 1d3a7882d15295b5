//! MCP Server Handler implementation
//!
//! Exposes the `copy_project` tool. Every outcome, including failures, is
//! returned as plain text so callers never see a protocol-level error.

use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ServerHandler,
};
use tracing::{error, info};

use super::types::CopyProjectParams;
use crate::service::copy::CopyService;
use crate::AppState;

/// MCP Handler for code sandbox operations
#[derive(Clone)]
pub struct SandboxMcpHandler {
    copy_service: Arc<CopyService>,
    tool_router: ToolRouter<Self>,
}

impl SandboxMcpHandler {
    pub fn new(state: AppState) -> Self {
        Self {
            copy_service: state.copy_service,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl SandboxMcpHandler {
    #[tool(
        description = "Copy a local directory into a running container, optionally running a command in the copied directory afterwards."
    )]
    async fn copy_project(&self, Parameters(params): Parameters<CopyProjectParams>) -> String {
        info!(
            "MCP: copy_project {} -> {}:{}",
            params.local_src_dir,
            params.container_id,
            params.dest_dir.as_deref().unwrap_or("<default>")
        );

        match self.copy_service.copy_project(params.into()).await {
            Ok(outcome) => {
                info!(
                    "MCP: copy_project placed {} entries in {}",
                    outcome.entries, outcome.plan.destination
                );
                outcome.message()
            }
            Err(e) => {
                error!("MCP: copy_project failed ({}): {}", e.code(), e);
                e.to_tool_message()
            }
        }
    }
}

#[tool_handler]
impl ServerHandler for SandboxMcpHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Code Sandbox - Copy local projects into running containers. \
                Use copy_project with a container ID and a local directory; \
                optionally give a destination and a command to run afterwards."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
