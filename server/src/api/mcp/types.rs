//! MCP Tool Parameter Types

use rmcp::schemars;
use serde::Deserialize;

use crate::domain::copy::CopyRequest;

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CopyProjectParams {
    /// ID or name of the running container (required)
    #[serde(default)]
    #[schemars(description = "ID or name of the running container to copy into (required)")]
    pub container_id: String,

    /// Local directory whose contents are copied (required)
    #[serde(default)]
    #[schemars(description = "Path of the local directory to copy (required)")]
    pub local_src_dir: String,

    /// Destination inside the container
    #[schemars(
        description = "Destination directory in the container. Relative paths are placed under /app; when omitted the directory's contents are copied directly into /app"
    )]
    pub dest_dir: Option<String>,

    /// Command to run in the destination after copying
    #[schemars(description = "Shell command to run in the destination directory after the copy")]
    pub command: Option<String>,

    /// Timeout in seconds for in-container commands
    #[schemars(description = "Timeout in seconds for in-container commands (0 = no timeout)")]
    pub timeout: Option<u64>,
}

impl From<CopyProjectParams> for CopyRequest {
    fn from(params: CopyProjectParams) -> Self {
        CopyRequest {
            container_id: params.container_id,
            local_src_dir: params.local_src_dir,
            dest_dir: params.dest_dir,
            command: params.command,
            timeout: params.timeout,
        }
    }
}
