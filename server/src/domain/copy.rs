//! Copy request resolution
//!
//! Turns raw tool arguments into a [`CopyPlan`]: a validated source
//! directory, the absolute destination inside the container, and the
//! archive layout/upload directory pair that makes the content land there.

use std::path::PathBuf;

use crate::domain::types::ArchiveLayout;
use crate::error::{Error, Result};

/// Raw copy arguments as received from the caller
#[derive(Debug, Clone, Default)]
pub struct CopyRequest {
    pub container_id: String,
    pub local_src_dir: String,
    pub dest_dir: Option<String>,
    /// Shell command to run in the destination after the copy
    pub command: Option<String>,
    /// Per-call command deadline in seconds
    pub timeout: Option<u64>,
}

/// Fully resolved copy operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyPlan {
    pub container_id: String,
    /// Canonical source directory on the host
    pub source: PathBuf,
    /// Absolute directory in the container that receives the content
    pub destination: String,
    pub layout: ArchiveLayout,
    /// Directory the archive is extracted into
    pub upload_dir: String,
    pub command: Option<String>,
    pub timeout: Option<u64>,
}

impl CopyRequest {
    /// Validate the request and decide where the content goes.
    ///
    /// An absent, empty or `.` destination copies the directory's contents
    /// straight into `base_dir`. Anything else is cleaned (relative paths are
    /// joined under `base_dir`) and copied in nested mode: the archive root
    /// carries the destination's final segment and is extracted into its
    /// parent.
    pub fn resolve(self, base_dir: &str) -> Result<CopyPlan> {
        let container_id = self.container_id.trim();
        if container_id.is_empty() {
            return Err(Error::InvalidArgument("container_id is required".to_string()));
        }
        if self.local_src_dir.trim().is_empty() {
            return Err(Error::InvalidArgument("local_src_dir is required".to_string()));
        }

        let source = resolve_source(&self.local_src_dir)?;

        let requested = self
            .dest_dir
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty() && *d != ".");

        let (destination, layout, upload_dir) = match requested {
            None => {
                let base = clean_container_path(base_dir);
                (base.clone(), ArchiveLayout::ContentsOnly, base)
            }
            Some(dest) => {
                let destination = if dest.starts_with('/') {
                    clean_container_path(dest)
                } else {
                    clean_container_path(&format!("{}/{}", base_dir, dest))
                };
                match split_parent(&destination) {
                    Some((parent, name)) => {
                        let layout = ArchiveLayout::Nested {
                            root: name.to_string(),
                        };
                        let parent = parent.to_string();
                        (destination, layout, parent)
                    }
                    None => (destination.clone(), ArchiveLayout::ContentsOnly, destination),
                }
            }
        };

        Ok(CopyPlan {
            container_id: container_id.to_string(),
            source,
            destination,
            layout,
            upload_dir,
            command: self.command.filter(|c| !c.trim().is_empty()),
            timeout: self.timeout,
        })
    }
}

fn resolve_source(local_src_dir: &str) -> Result<PathBuf> {
    let path = PathBuf::from(local_src_dir);
    let metadata = std::fs::metadata(&path)
        .map_err(|e| Error::SourceNotFound(format!("{}: {}", local_src_dir, e)))?;
    if !metadata.is_dir() {
        return Err(Error::SourceNotFound(format!(
            "{} is not a directory",
            local_src_dir
        )));
    }

    path.canonicalize()
        .map_err(|e| Error::SourceNotFound(format!("{}: {}", local_src_dir, e)))
}

/// Lexically clean an absolute container path.
///
/// Container paths are always POSIX, whatever the host platform, so this
/// works on strings rather than `std::path`. `..` never climbs above `/`.
pub fn clean_container_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Split a clean absolute path into parent and final segment; `None` for `/`
fn split_parent(path: &str) -> Option<(&str, &str)> {
    let idx = path.rfind('/')?;
    let name = &path[idx + 1..];
    if name.is_empty() {
        return None;
    }
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Some((parent, name))
}
