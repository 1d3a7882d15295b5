//! Command execution inside containers
//!
//! A command runs as a one-shot exec session: create it, attach to its
//! output, then poll its status until the runtime reports it stopped.
//! Output is drained by a spawned task that is joined before the exit
//! code is judged, so the returned result always carries the complete
//! output.

use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::domain::types::{ExecOutput, ExecResult, ExecSpec};
use crate::error::{Error, Result};
use crate::infra::docker::{ContainerRuntime, OutputStream};

/// Default interval between exec status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs commands in containers through a [`ContainerRuntime`]
pub struct CommandRunner<'a, R: ContainerRuntime + ?Sized> {
    runtime: &'a R,
    poll_interval: Duration,
    deadline: Option<Duration>,
}

impl<'a, R: ContainerRuntime + ?Sized> CommandRunner<'a, R> {
    pub fn new(runtime: &'a R) -> Self {
        Self {
            runtime,
            poll_interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound the time spent waiting for the command to finish
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Run `spec` in `container_id` and wait for it to finish.
    ///
    /// Fails with `CommandFailed` on a non-zero exit, carrying stderr (or
    /// stdout when stderr is empty).
    pub async fn run(&self, container_id: &str, spec: ExecSpec) -> Result<ExecResult> {
        info!("Running {:?} in container {}", spec.cmd, container_id);

        let exec_id = self.runtime.create_exec(container_id, spec).await?;
        let output = self.runtime.start_exec(&exec_id).await?;
        let mut drain = tokio::spawn(drain_output(output));

        // The deadline covers the drain too: a backgrounded child can keep
        // the output open after the session itself has stopped.
        let finished = async {
            let exit_code = self.wait_for_exit(&exec_id).await?;
            let (stdout, stderr) = (&mut drain).await??;
            Ok::<_, Error>(ExecResult {
                exit_code,
                stdout,
                stderr,
            })
        };

        let finished = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, finished)
                .await
                .map_err(|_| limit),
            None => Ok(finished.await),
        };

        let result = match finished {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                drain.abort();
                return Err(e);
            }
            Err(limit) => {
                warn!("Exec {} exceeded its deadline of {:?}", exec_id, limit);
                drain.abort();
                return Err(Error::CommandTimeout(limit));
            }
        };
        let exit_code = result.exit_code;

        debug!(
            "Exec {} finished with code {} ({} bytes stdout, {} bytes stderr)",
            exec_id,
            exit_code,
            result.stdout.len(),
            result.stderr.len()
        );

        if exit_code != 0 {
            return Err(Error::CommandFailed {
                exit_code,
                output: result.diagnostic_output(),
            });
        }

        Ok(result)
    }

    async fn wait_for_exit(&self, exec_id: &str) -> Result<i64> {
        loop {
            let status = self.runtime.inspect_exec(exec_id).await?;
            if !status.running {
                return status.exit_code.ok_or_else(|| {
                    Error::Runtime(format!("exec {} stopped without an exit code", exec_id))
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

async fn drain_output(mut output: OutputStream) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    while let Some(chunk) = output.next().await {
        match chunk? {
            ExecOutput::Stdout(data) => stdout.extend_from_slice(&data),
            ExecOutput::Stderr(data) => stderr.extend_from_slice(&data),
        }
    }
    Ok((stdout, stderr))
}
