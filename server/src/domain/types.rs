//! Common domain types

use bytes::Bytes;
/// How archive entry names relate to the upload directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveLayout {
    /// Entries are rooted directly at the upload directory
    ContentsOnly,
    /// Entries are nested one level under `root`, the destination's own
    /// name, so the tree lands exactly at the destination
    Nested { root: String },
}

/// A one-shot command to run inside a container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecSpec {
    pub cmd: Vec<String>,
    pub working_dir: Option<String>,
}

impl ExecSpec {
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            working_dir: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

/// Status of an exec session as reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecStatus {
    pub running: bool,
    pub exit_code: Option<i64>,
}

/// A chunk of demultiplexed exec output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutput {
    Stdout(Bytes),
    Stderr(Bytes),
}

/// Completed command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub exit_code: i64,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ExecResult {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// stderr when it has content, stdout otherwise
    pub fn diagnostic_output(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout_lossy()
        } else {
            self.stderr_lossy()
        }
    }
}
