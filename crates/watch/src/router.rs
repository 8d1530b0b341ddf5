use std::io;
use std::path::{Path, PathBuf};

/// `YYYYMMDD_HHMMSS` in local time, prefixed to every routed file.
pub fn timestamp_tag() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Where a failed file and its error log ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureArtifacts {
    pub moved_to: PathBuf,
    pub error_log: PathBuf,
}

/// Moves source files into their terminal directory. The router is the only
/// writer to both destinations.
#[derive(Debug, Clone)]
pub struct Router {
    processed_dir: PathBuf,
    failed_dir: PathBuf,
}

impl Router {
    pub fn new(processed_dir: impl Into<PathBuf>, failed_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            failed_dir: failed_dir.into(),
        }
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    pub fn failed_dir(&self) -> &Path {
        &self.failed_dir
    }

    pub async fn route_success(&self, source: &Path, timestamp: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.processed_dir).await?;
        let dest = self.processed_dir.join(tagged_name(source, timestamp));
        move_file(source, &dest).await?;
        Ok(dest)
    }

    /// Move `source` into the failed directory and write the error log next
    /// to it. The log is written even if the move fails.
    pub async fn route_failure(
        &self,
        source: &Path,
        timestamp: &str,
        message: &str,
    ) -> io::Result<FailureArtifacts> {
        tokio::fs::create_dir_all(&self.failed_dir).await?;
        let moved_to = self.failed_dir.join(tagged_name(source, timestamp));
        let moved = move_file(source, &moved_to).await;

        let error_log = self.failed_dir.join(error_log_name(source, timestamp));
        tokio::fs::write(&error_log, error_report(source, timestamp, message)).await?;

        moved?;
        Ok(FailureArtifacts {
            moved_to,
            error_log,
        })
    }
}

fn file_name(source: &Path) -> String {
    source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn tagged_name(source: &Path, timestamp: &str) -> String {
    format!("{timestamp}_{}", file_name(source))
}

fn error_log_name(source: &Path, timestamp: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{timestamp}_{stem}_ERROR.txt")
}

fn error_report(source: &Path, timestamp: &str, message: &str) -> String {
    format!(
        "Error at: {timestamp}\nFile: {}\nError: {message}\n",
        file_name(source)
    )
}

/// Rename, falling back to copy + remove when the destination is on another
/// filesystem.
async fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(e),
        Err(e) => {
            tracing::debug!(error = %e, "rename failed, copying instead");
            tokio::fs::copy(from, to).await?;
            tokio::fs::remove_file(from).await
        }
    }
}
