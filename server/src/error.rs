//! Error types for the code sandbox server

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the code sandbox server
#[derive(Debug, Error)]
pub enum Error {
    // Argument errors (1000-1999)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Source directory not found: {0}")]
    SourceNotFound(String),

    // Archive errors (2000-2999)
    #[error("I/O error: {0}")]
    Io(String),

    // Runtime errors (3000-3999)
    #[error("Cannot connect to container runtime: {0}")]
    RuntimeConnection(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    // Copy errors (4000-4999)
    #[error("Copy failed: {0}")]
    CopyFailed(String),

    // Command errors (5000-5999)
    #[error("Command exited with code {exit_code}: {output}")]
    CommandFailed { exit_code: i64, output: String },

    #[error("Command did not finish within {0:?}")]
    CommandTimeout(std::time::Duration),

    // General errors (9000-9999)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the error code
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidArgument(_) => 1001,
            Error::SourceNotFound(_) => 1002,

            Error::Io(_) => 2001,

            Error::RuntimeConnection(_) => 3001,
            Error::ContainerNotFound(_) => 3002,
            Error::Runtime(_) => 3003,

            Error::CopyFailed(_) => 4001,

            Error::CommandFailed { .. } => 5001,
            Error::CommandTimeout(_) => 5002,

            Error::Internal(_) => 9001,
        }
    }

    /// Pipeline stage the error belongs to, as shown to tool callers
    pub fn stage(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "validating arguments",
            Error::SourceNotFound(_) => "accessing source directory",
            Error::Io(_) => "creating tar archive",
            Error::RuntimeConnection(_) => "connecting to container runtime",
            Error::ContainerNotFound(_) => "inspecting container",
            Error::CopyFailed(_) => "copying to container",
            Error::Runtime(_) | Error::CommandFailed { .. } | Error::CommandTimeout(_) => {
                "running command"
            }
            Error::Internal(_) => "processing request",
        }
    }

    /// In-band text reported to the caller instead of a protocol fault
    pub fn to_tool_message(&self) -> String {
        format!("Error {}: {}", self.stage(), self)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(err.to_string())
    }
}
