use std::path::Path;

use kansa_core::KansaError;

/// Write the review report to `path`, replacing any previous report.
///
/// Missing parent directories are created.
///
/// # Errors
///
/// Returns [`KansaError::Io`] if the directory or file cannot be written.
///
/// # Examples
///
/// ```
/// use kansa_review::report::write_report;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("ai-review/result.md");
/// write_report(&path, "").unwrap();
/// assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
/// ```
pub fn write_report(path: &Path, content: &str) -> Result<(), KansaError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "report written");
    Ok(())
}
