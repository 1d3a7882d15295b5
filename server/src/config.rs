//! Server configuration

use std::time::Duration;

use serde::Deserialize;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// MCP transport: "stdio" or "http"
    #[serde(default = "default_mcp_mode")]
    pub mcp_mode: String,

    /// HTTP server host (http mode only)
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP server port (http mode only)
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Path the streamable HTTP MCP endpoint is mounted at
    #[serde(default = "default_mcp_path")]
    pub mcp_path: String,

    /// Docker socket path.
    /// When unset, the ambient Docker environment (DOCKER_HOST or the
    /// platform default socket) is used.
    #[serde(default)]
    pub docker_socket: Option<String>,

    /// Docker request timeout in seconds
    #[serde(default = "default_docker_timeout")]
    pub docker_timeout: u64,

    /// Base directory inside the container for copied projects
    #[serde(default = "default_dest_dir")]
    pub default_dest_dir: String,

    /// Interval between exec status polls, in milliseconds
    #[serde(default = "default_exec_poll_interval_ms")]
    pub exec_poll_interval_ms: u64,

    /// Default deadline for in-container commands in seconds (0 = no deadline)
    #[serde(default)]
    pub exec_timeout: u64,
}

fn default_mcp_mode() -> String {
    "stdio".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_mcp_path() -> String {
    "/mcp".to_string()
}

fn default_docker_timeout() -> u64 {
    120
}

fn default_dest_dir() -> String {
    "/app".to_string()
}

fn default_exec_poll_interval_ms() -> u64 {
    100
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Config::default();

        if let Ok(val) = std::env::var("CODE_SANDBOX_MCP_MODE") {
            config.mcp_mode = val;
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_HTTP_HOST") {
            config.http_host = val;
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_HTTP_PORT") {
            if let Ok(port) = val.parse() {
                config.http_port = port;
            }
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_MCP_PATH") {
            config.mcp_path = val;
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_DOCKER_SOCKET") {
            if !val.trim().is_empty() {
                config.docker_socket = Some(val);
            }
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_DOCKER_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                config.docker_timeout = timeout;
            }
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_DEFAULT_DEST_DIR") {
            config.default_dest_dir = val;
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_EXEC_POLL_INTERVAL_MS") {
            if let Ok(interval) = val.parse() {
                config.exec_poll_interval_ms = interval;
            }
        }
        if let Ok(val) = std::env::var("CODE_SANDBOX_EXEC_TIMEOUT") {
            if let Ok(timeout) = val.parse() {
                config.exec_timeout = timeout;
            }
        }

        Ok(config)
    }

    /// Poll interval for exec sessions
    pub fn exec_poll_interval(&self) -> Duration {
        Duration::from_millis(self.exec_poll_interval_ms.max(1))
    }

    /// Deadline for an in-container command.
    /// A per-call override in seconds wins over the configured default;
    /// zero in either place means no deadline.
    pub fn exec_deadline(&self, override_secs: Option<u64>) -> Option<Duration> {
        match override_secs.unwrap_or(self.exec_timeout) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mcp_mode: default_mcp_mode(),
            http_host: default_http_host(),
            http_port: default_http_port(),
            mcp_path: default_mcp_path(),
            docker_socket: None,
            docker_timeout: default_docker_timeout(),
            default_dest_dir: default_dest_dir(),
            exec_poll_interval_ms: default_exec_poll_interval_ms(),
            exec_timeout: 0,
        }
    }
}
