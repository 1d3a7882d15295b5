//! Tar archive creation for directory trees
//!
//! The archiver walks a source directory depth-first and writes one tar
//! entry per file, directory and symlink below it. The source root itself
//! is never emitted; entry names are relative to it, optionally nested
//! under a single root segment (see [`ArchiveLayout`]).
//!
//! [`write_archive`] writes into any `Write` sink (a `Vec<u8>` buffers the
//! whole archive). [`stream_archive`] produces the archive on a blocking thread and hands
//! it out as a stream of [`Bytes`] chunks, so uploads start before the walk
//! finishes and memory stays bounded by the channel.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use tar::{Builder, EntryType, Header};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::domain::types::ArchiveLayout;
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Size of the chunks handed to the upload stream.
const CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the archiver thread and the upload.
const CHANNEL_DEPTH: usize = 16;

/// Archive byte stream consumed by the container runtime.
pub type ArchiveStream = BoxStream<'static, Bytes>;

/// What went into an archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub entries: usize,
    pub file_bytes: u64,
}

// ============================================================================
// Archive building
// ============================================================================

/// Write a tar archive of `src` into `out` and return the finished writer.
pub fn write_archive<W: Write>(
    src: &Path,
    layout: &ArchiveLayout,
    out: W,
) -> Result<(W, ArchiveSummary)> {
    let mut builder = Builder::new(out);
    builder.follow_symlinks(false);

    let mut summary = ArchiveSummary::default();

    for entry in WalkDir::new(src)
        .follow_links(false)
        .sort_by_file_name()
    {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| Error::Io(format!("{}: {}", entry.path().display(), e)))?;
        if rel.as_os_str().is_empty() {
            continue;
        }

        let name = entry_name(layout, rel);
        let metadata = entry.metadata()?;
        let file_type = entry.file_type();

        let mut header = Header::new_gnu();
        header.set_metadata(&metadata);

        if file_type.is_dir() {
            header.set_entry_type(EntryType::Directory);
            header.set_size(0);
            builder.append_data(&mut header, &name, io::empty())?;
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            header.set_entry_type(EntryType::Symlink);
            header.set_size(0);
            builder.append_link(&mut header, &name, &target)?;
        } else if file_type.is_file() {
            let file = File::open(entry.path())?;
            summary.file_bytes += metadata.len();
            builder.append_data(&mut header, &name, file)?;
        } else {
            warn!("Skipping special file {}", entry.path().display());
            continue;
        }

        debug!("Archived {}", name);
        summary.entries += 1;
    }

    let out = builder.into_inner()?;
    Ok((out, summary))
}

/// Archive `src` on a blocking thread, exposing the bytes as a stream.
///
/// The stream ends when the archive is complete or the walk fails; the
/// returned handle reports which of the two happened and must be awaited
/// after the stream has been consumed. If the consumer drops the stream
/// early the handle resolves to `CopyFailed`.
pub fn stream_archive(
    src: PathBuf,
    layout: ArchiveLayout,
) -> (ArchiveStream, JoinHandle<Result<ArchiveSummary>>) {
    let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);

    let handle = tokio::task::spawn_blocking(move || {
        let probe = tx.clone();
        let result = write_archive(&src, &layout, ChannelWriter::new(tx)).and_then(
            |(mut writer, summary)| {
                writer.flush()?;
                Ok(summary)
            },
        );
        match result {
            Err(_) if probe.is_closed() => Err(Error::CopyFailed(
                "runtime stopped reading the archive".to_string(),
            )),
            other => other,
        }
    });

    (ReceiverStream::new(rx).boxed(), handle)
}

/// Archive entry name for a path relative to the walked root.
///
/// Names always use `/` separators regardless of the host platform.
fn entry_name(layout: &ArchiveLayout, rel: &Path) -> String {
    let rel = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    match layout {
        ArchiveLayout::ContentsOnly => rel,
        ArchiveLayout::Nested { root } => format!("{}/{}", root, rel),
    }
}

// ============================================================================
// ChannelWriter
// ============================================================================

/// `Write` adapter that forwards fixed-size chunks into an mpsc channel.
///
/// Must only be used off the async runtime: sends block when the channel
/// is full.
struct ChannelWriter {
    tx: mpsc::Sender<Bytes>,
    buf: BytesMut,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            tx,
            buf: BytesMut::with_capacity(CHUNK_SIZE),
        }
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = self.buf.split().freeze();
        self.tx
            .blocking_send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "archive consumer went away"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let room = CHUNK_SIZE - self.buf.len();
        let n = room.min(data.len());
        self.buf.extend_from_slice(&data[..n]);
        if self.buf.len() >= CHUNK_SIZE {
            self.send_buffered()?;
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use std::io::Read;

    fn build_archive(src: &Path, layout: &ArchiveLayout) -> Result<Vec<u8>> {
        write_archive(src, layout, Vec::new()).map(|(buf, _)| buf)
    }

    /// proj/{a.txt, sub/b.txt}
    fn sample_tree() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let proj = dir.path().join("proj");
        std::fs::create_dir_all(proj.join("sub")).unwrap();
        std::fs::write(proj.join("a.txt"), "alpha\n").unwrap();
        std::fs::write(proj.join("sub").join("b.txt"), "bravo\n").unwrap();
        (dir, proj)
    }

    /// Entry name (without trailing slash) -> (type, content)
    fn read_entries(data: &[u8]) -> BTreeMap<String, (EntryType, Vec<u8>)> {
        let mut archive = tar::Archive::new(data);
        let mut entries = BTreeMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry
                .path()
                .unwrap()
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();
            let kind = entry.header().entry_type();
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            entries.insert(name, (kind, content));
        }
        entries
    }

    #[test]
    fn test_contents_only_layout() {
        let (_dir, proj) = sample_tree();
        let data = build_archive(&proj, &ArchiveLayout::ContentsOnly).unwrap();
        let entries = read_entries(&data);

        let names: Vec<_> = entries.keys().cloned().collect();
        assert_eq!(names, vec!["a.txt", "sub", "sub/b.txt"]);
        assert_eq!(entries["a.txt"].1, b"alpha\n");
        assert_eq!(entries["sub"].0, EntryType::Directory);
        assert!(entries["sub"].1.is_empty());
        assert_eq!(entries["sub/b.txt"].1, b"bravo\n");
    }

    #[test]
    fn test_nested_layout() {
        let (_dir, proj) = sample_tree();
        let layout = ArchiveLayout::Nested {
            root: "proj".to_string(),
        };
        let data = build_archive(&proj, &layout).unwrap();
        let names: Vec<_> = read_entries(&data).keys().cloned().collect();
        assert_eq!(names, vec!["proj/a.txt", "proj/sub", "proj/sub/b.txt"]);
    }

    #[test]
    fn test_root_never_emitted() {
        let dir = tempfile::tempdir().unwrap();
        let data = build_archive(dir.path(), &ArchiveLayout::ContentsOnly).unwrap();
        assert!(read_entries(&data).is_empty());

        let layout = ArchiveLayout::Nested {
            root: "proj".to_string(),
        };
        let data = build_archive(dir.path(), &layout).unwrap();
        assert!(read_entries(&data).is_empty());
    }

    #[test]
    fn test_paths_and_contents_match_source_tree() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let deep = format!("deep/{}/file", "n".repeat(120));
        let files = [
            ("README.md", b"# readme\n".to_vec()),
            ("src/main.rs", b"fn main() {}\n".to_vec()),
            ("src/bin/tool.rs", vec![0u8, 159, 146, 150, 255]),
            ("empty.txt", Vec::new()),
            (deep.as_str(), b"long".to_vec()),
        ];
        for (path, content) in &files {
            let full = root.join(path);
            std::fs::create_dir_all(full.parent().unwrap()).unwrap();
            std::fs::write(full, content).unwrap();
        }
        std::fs::create_dir_all(root.join("empty_dir")).unwrap();

        let mut expected = BTreeSet::new();
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry.unwrap();
            let rel = entry.path().strip_prefix(root).unwrap();
            expected.insert(entry_name(&ArchiveLayout::ContentsOnly, rel));
        }

        let data = build_archive(root, &ArchiveLayout::ContentsOnly).unwrap();
        let entries = read_entries(&data);
        let actual: BTreeSet<_> = entries.keys().cloned().collect();
        assert_eq!(actual, expected);

        for (path, content) in &files {
            assert_eq!(&entries[*path].1, content, "content mismatch for {}", path);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_modes_and_symlinks_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let script = root.join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("run.sh", root.join("link")).unwrap();

        let data = build_archive(root, &ArchiveLayout::ContentsOnly).unwrap();
        let mut archive = tar::Archive::new(&data[..]);
        let mut seen = 0;
        for entry in archive.entries().unwrap() {
            let entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().to_string();
            match name.as_str() {
                "run.sh" => {
                    assert_eq!(entry.header().mode().unwrap() & 0o777, 0o755);
                    seen += 1;
                }
                "link" => {
                    assert_eq!(entry.header().entry_type(), EntryType::Symlink);
                    assert_eq!(entry.header().size().unwrap(), 0);
                    assert_eq!(
                        entry.link_name().unwrap().unwrap().to_string_lossy(),
                        "run.sh"
                    );
                    seen += 1;
                }
                other => panic!("unexpected entry {}", other),
            }
        }
        assert_eq!(seen, 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_aborts() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let secret = dir.path().join("secret");
        std::fs::write(&secret, "x").unwrap();
        std::fs::set_permissions(&secret, std::fs::Permissions::from_mode(0o000)).unwrap();

        // root ignores permission bits
        if File::open(&secret).is_ok() {
            return;
        }

        let result = build_archive(dir.path(), &ArchiveLayout::ContentsOnly);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_stream_matches_buffered_archive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // larger than one chunk
        std::fs::write(root.join("big.bin"), vec![7u8; CHUNK_SIZE * 3 + 17]).unwrap();
        std::fs::write(root.join("small.txt"), "small").unwrap();

        let layout = ArchiveLayout::Nested {
            root: "dest".to_string(),
        };
        let expected = build_archive(root, &layout).unwrap();

        let (stream, handle) = stream_archive(root.to_path_buf(), layout);
        let chunks: Vec<Bytes> = stream.collect().await;
        let summary = handle.await.unwrap().unwrap();

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_SIZE));
        assert_eq!(chunks.concat(), expected);
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.file_bytes, (CHUNK_SIZE * 3 + 17 + 5) as u64);
    }

    #[tokio::test]
    async fn test_stream_reports_walk_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        let (stream, handle) = stream_archive(missing, ArchiveLayout::ContentsOnly);
        let _: Vec<Bytes> = stream.collect().await;
        assert!(matches!(handle.await.unwrap(), Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_stream_dropped_by_consumer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), "data").unwrap();

        let (stream, handle) =
            stream_archive(dir.path().to_path_buf(), ArchiveLayout::ContentsOnly);
        drop(stream);
        assert!(matches!(handle.await.unwrap(), Err(Error::CopyFailed(_))));
    }
}
