//! Docker management layer

use std::time::Duration;

use async_trait::async_trait;
use bollard::{
    container::{InspectContainerOptions, LogOutput, UploadToContainerOptions},
    exec::{CreateExecOptions, StartExecResults},
    Docker,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::types::{ExecOutput, ExecSpec, ExecStatus};
use crate::error::{Error, Result};
use crate::infra::archive::ArchiveStream;

/// Demultiplexed output of an attached exec session
pub type OutputStream = BoxStream<'static, Result<ExecOutput>>;

/// Operations the copy pipeline needs from a container engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Fail with `ContainerNotFound` unless the container exists
    async fn inspect_container(&self, container_id: &str) -> Result<()>;

    /// Create an exec session attached to stdout/stderr, returning its ID
    async fn create_exec(&self, container_id: &str, spec: ExecSpec) -> Result<String>;

    /// Start the session and attach to its output
    async fn start_exec(&self, exec_id: &str) -> Result<OutputStream>;

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecStatus>;

    /// Extract a tar stream into `target_dir` inside the container
    async fn upload_archive(
        &self,
        container_id: &str,
        target_dir: &str,
        archive: ArchiveStream,
    ) -> Result<()>;
}

/// Docker-backed container runtime
pub struct DockerRuntime {
    client: Docker,
}

impl DockerRuntime {
    /// Connect to the Docker daemon and negotiate the API version
    pub async fn connect(config: &Config) -> Result<Self> {
        let client = match config.docker_socket.as_deref() {
            Some(path) => Docker::connect_with_socket(
                path,
                config.docker_timeout,
                bollard::API_DEFAULT_VERSION,
            )
            .map_err(|e| Error::RuntimeConnection(e.to_string()))?,
            None => Docker::connect_with_local_defaults()
                .map_err(|e| Error::RuntimeConnection(e.to_string()))?
                .with_timeout(Duration::from_secs(config.docker_timeout)),
        };

        let client = client
            .negotiate_version()
            .await
            .map_err(|e| Error::RuntimeConnection(e.to_string()))?;

        debug!("Connected to Docker daemon");
        Ok(Self { client })
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect_container(&self, container_id: &str) -> Result<()> {
        self.client
            .inspect_container(container_id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => Error::ContainerNotFound(container_id.to_string()),
                other => runtime_error(other),
            })?;
        Ok(())
    }

    async fn create_exec(&self, container_id: &str, spec: ExecSpec) -> Result<String> {
        let options = CreateExecOptions {
            cmd: Some(spec.cmd),
            working_dir: spec.working_dir,
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let exec = self
            .client
            .create_exec(container_id, options)
            .await
            .map_err(|e| match e {
                bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                } => Error::ContainerNotFound(container_id.to_string()),
                other => runtime_error(other),
            })?;

        debug!("Created exec {} in container {}", exec.id, container_id);
        Ok(exec.id)
    }

    async fn start_exec(&self, exec_id: &str) -> Result<OutputStream> {
        match self
            .client
            .start_exec(exec_id, None)
            .await
            .map_err(runtime_error)?
        {
            StartExecResults::Attached { output, .. } => Ok(output
                .filter_map(|item| {
                    futures::future::ready(match item {
                        Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message }) => {
                            Some(Ok(ExecOutput::Stdout(message)))
                        }
                        Ok(LogOutput::StdErr { message }) => Some(Ok(ExecOutput::Stderr(message))),
                        Ok(LogOutput::StdIn { .. }) => None,
                        Err(e) => Some(Err(runtime_error(e))),
                    })
                })
                .boxed()),
            StartExecResults::Detached => Err(Error::Runtime(format!(
                "exec {} started detached, no output attached",
                exec_id
            ))),
        }
    }

    async fn inspect_exec(&self, exec_id: &str) -> Result<ExecStatus> {
        let inspect = self
            .client
            .inspect_exec(exec_id)
            .await
            .map_err(runtime_error)?;

        Ok(ExecStatus {
            running: inspect.running.unwrap_or(false),
            exit_code: inspect.exit_code,
        })
    }

    async fn upload_archive(
        &self,
        container_id: &str,
        target_dir: &str,
        archive: ArchiveStream,
    ) -> Result<()> {
        let options = UploadToContainerOptions {
            path: target_dir.to_string(),
            ..Default::default()
        };

        self.client
            .upload_to_container_streaming(container_id, Some(options), archive)
            .await
            .map_err(|e| Error::CopyFailed(e.to_string()))?;

        info!("Uploaded archive to {}:{}", container_id, target_dir);
        Ok(())
    }
}

/// Classify a Docker API failure.
///
/// A response from the daemon means the engine is reachable; anything
/// else (socket, transport, timeout) is a connection problem.
fn runtime_error(err: bollard::errors::Error) -> Error {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => Error::Runtime(format!("{} (status {})", message, status_code)),
        other => Error::RuntimeConnection(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_classification() {
        let err = runtime_error(bollard::errors::Error::DockerResponseServerError {
            status_code: 409,
            message: "container is paused".to_string(),
        });
        assert!(matches!(err, Error::Runtime(ref m) if m.contains("paused")));

        let err = runtime_error(bollard::errors::Error::RequestTimeoutError);
        assert!(matches!(err, Error::RuntimeConnection(_)));
    }

    #[tokio::test]
    async fn test_connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            docker_socket: Some(dir.path().join("nope.sock").to_string_lossy().to_string()),
            docker_timeout: 1,
            ..Default::default()
        };
        let result = DockerRuntime::connect(&config).await;
        assert!(matches!(result, Err(Error::RuntimeConnection(_))));
    }
}
