// dbdump/src/utils/job_log.rs
use chrono::Local;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append-only, timestamped log owned by a single job.
///
/// Write failures after the file is open are reported on the process-wide
/// diagnostic stream; they never fail the job itself.
pub struct JobLog {
    file: File,
    path: PathBuf,
}

impl JobLog {
    pub async fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(JobLog {
            file,
            path: path.to_path_buf(),
        })
    }

    pub async fn line(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::debug!(log = %self.path.display(), "{}", message);

        let entry = format!("{} {}\n", Local::now().format("%Y/%m/%d %H:%M:%S"), message);
        let written = match self.file.write_all(entry.as_bytes()).await {
            Ok(()) => self.file.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            tracing::warn!(log = %self.path.display(), error = %e, "failed to write job log entry");
        }
    }
}
