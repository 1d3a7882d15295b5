//! Copy service
//!
//! Copies a host directory into a running container and optionally runs a
//! command in the copied tree afterwards.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::Config;
use crate::domain::copy::{CopyPlan, CopyRequest};
use crate::domain::types::{ExecResult, ExecSpec};
use crate::error::{Error, Result};
use crate::infra::archive::stream_archive;
use crate::infra::docker::{ContainerRuntime, DockerRuntime};
use crate::service::exec::CommandRunner;

/// Outcome of a completed copy
#[derive(Debug, Clone)]
pub struct CopyOutcome {
    pub plan: CopyPlan,
    pub entries: usize,
    pub command: Option<ExecResult>,
}

impl CopyOutcome {
    /// Human-readable success text returned to tool callers
    pub fn message(&self) -> String {
        let mut message = format!(
            "Successfully copied {} to {} in container {}",
            self.plan.source.display(),
            self.plan.destination,
            self.plan.container_id
        );

        if let (Some(command), Some(result)) = (&self.plan.command, &self.command) {
            message.push_str(&format!(
                "\nCommand `{}` exited with code {}",
                command, result.exit_code
            ));
            let stdout = result.stdout_lossy();
            if !stdout.trim().is_empty() {
                message.push('\n');
                message.push_str(stdout.trim_end());
            }
        }

        message
    }
}

/// Copy service
pub struct CopyService {
    config: Arc<Config>,
}

impl CopyService {
    /// Create a new copy service
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Copy a project directory into a container.
    ///
    /// Arguments are resolved before anything else, so invalid input never
    /// opens a runtime connection. The connection lives for this call only.
    pub async fn copy_project(&self, request: CopyRequest) -> Result<CopyOutcome> {
        let plan = request.resolve(&self.config.default_dest_dir)?;

        info!(
            "Copying {} to {} in container {}",
            plan.source.display(),
            plan.destination,
            plan.container_id
        );

        let runtime = DockerRuntime::connect(&self.config).await?;
        self.copy_with(&runtime, plan).await
    }

    /// Run a resolved plan against `runtime`
    pub async fn copy_with<R: ContainerRuntime + ?Sized>(
        &self,
        runtime: &R,
        plan: CopyPlan,
    ) -> Result<CopyOutcome> {
        runtime.inspect_container(&plan.container_id).await?;

        let deadline = self.config.exec_deadline(plan.timeout);
        let runner = CommandRunner::new(runtime)
            .poll_interval(self.config.exec_poll_interval())
            .deadline(deadline);

        runner
            .run(
                &plan.container_id,
                ExecSpec::new(["mkdir", "-p", plan.destination.as_str()]),
            )
            .await
            .map_err(|e| Error::CopyFailed(format!("creating {}: {}", plan.destination, e)))?;

        let (archive, producer) = stream_archive(plan.source.clone(), plan.layout.clone());
        let uploaded = runtime
            .upload_archive(&plan.container_id, &plan.upload_dir, archive)
            .await;

        // A walk failure truncates the stream, so it wins over whatever the
        // runtime made of the partial archive. A producer that only failed
        // because the runtime hung up defers to the runtime's own error.
        let summary = match (producer.await?, uploaded) {
            (Ok(summary), Ok(())) => summary,
            (Err(Error::CopyFailed(_)), Err(upload_err)) => return Err(upload_err),
            (Err(walk_err), _) => return Err(walk_err),
            (Ok(_), Err(upload_err)) => return Err(upload_err),
        };

        info!(
            "Copied {} entries ({} bytes) into {}:{}",
            summary.entries, summary.file_bytes, plan.container_id, plan.destination
        );

        let command = match plan.command.as_deref() {
            Some(command) => {
                let spec =
                    ExecSpec::new(["sh", "-c", command]).working_dir(plan.destination.as_str());
                let result = runner.run(&plan.container_id, spec).await.map_err(|e| {
                    error!("Post-copy command failed in {}: {}", plan.container_id, e);
                    e
                })?;
                Some(result)
            }
            None => None,
        };

        Ok(CopyOutcome {
            plan,
            entries: summary.entries,
            command,
        })
    }
}
