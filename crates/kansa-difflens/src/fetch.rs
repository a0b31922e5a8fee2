//! Per-file diff retrieval with full-content fallback.

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use kansa_core::{FileRecord, KansaError};

/// Diffs larger than this are treated as a failed diff.
pub const MAX_DIFF_BYTES: usize = 1024 * 1024;

/// Fetches `git diff <base>...HEAD` for one file at a time.
///
/// Whenever the diff is unusable (empty, failed, or oversized) the file's
/// current content is returned instead.
///
/// # Examples
///
/// ```
/// use kansa_difflens::fetch::DiffFetcher;
///
/// let dir = tempfile::tempdir().unwrap();
/// std::fs::write(dir.path().join("notes.txt"), "hello\n").unwrap();
///
/// // Not a git repository, so the diff fails and the content is used.
/// let fetcher = DiffFetcher::new(dir.path(), "origin/main");
/// let record = fetcher.fetch("notes.txt").unwrap();
/// assert_eq!(record.content, "hello\n");
/// ```
pub struct DiffFetcher {
    root: PathBuf,
    base: String,
}

impl DiffFetcher {
    /// Create a fetcher for the repository at `root`, diffing against `base`.
    pub fn new(root: impl Into<PathBuf>, base: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base: base.into(),
        }
    }

    /// Diff text for `path`, or its full content when no diff is available.
    ///
    /// # Errors
    ///
    /// Returns [`KansaError::Io`] only when the fallback read fails.
    pub fn fetch(&self, path: &str) -> Result<FileRecord, KansaError> {
        let content = match self.diff(path) {
            Some(diff) => diff,
            None => read_lossy(&self.root.join(path))?,
        };
        Ok(FileRecord {
            path: path.to_string(),
            content,
        })
    }

    /// Fetch every path in order. Files whose content cannot be read are
    /// dropped with a warning.
    pub fn fetch_all(&self, paths: &[String]) -> Vec<FileRecord> {
        let mut records = Vec::with_capacity(paths.len());
        for path in paths {
            match self.fetch(path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(%path, error = %e, "dropping unreadable file"),
            }
        }
        records
    }

    fn diff(&self, path: &str) -> Option<String> {
        let range = format!("{}...HEAD", self.base);
        let child = Command::new("git")
            .arg("-C")
            .arg(&self.root)
            .args(["diff", range.as_str(), "--", path])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match child {
            Ok(c) => c,
            Err(e) => {
                tracing::debug!(%path, error = %e, "failed to run git diff, using file content");
                return None;
            }
        };

        let stdout = match read_capped(&mut child) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(%path, error = %e, "failed to read git diff, using file content");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        };

        if stdout.len() > MAX_DIFF_BYTES {
            tracing::debug!(%path, "diff larger than {MAX_DIFF_BYTES} bytes, using file content");
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }

        let mut stderr = Vec::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_end(&mut stderr);
        }
        let status = match child.wait() {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(%path, error = %e, "failed to wait for git diff, using file content");
                return None;
            }
        };

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            tracing::debug!(%path, stderr = %stderr.trim(), "git diff failed, using file content");
            return None;
        }

        if stdout.is_empty() {
            tracing::debug!(%path, "empty diff, using file content");
            return None;
        }

        Some(String::from_utf8_lossy(&stdout).into_owned())
    }
}

/// Reads at most `MAX_DIFF_BYTES + 1` bytes of the child's stdout, so an
/// oversized diff is detected without buffering all of it.
fn read_capped(child: &mut Child) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        stdout
            .take(MAX_DIFF_BYTES as u64 + 1)
            .read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn read_lossy(path: &std::path::Path) -> Result<String, KansaError> {
    let bytes = std::fs::read(path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
