// dbdump/src/restore/logic.rs
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::config::RestoreSource;
use crate::engine::DatabaseEngine;
use crate::orchestrator::JobOutcome;
use crate::storage::ObjectStore;
use crate::utils::job_log::JobLog;
use crate::utils::{file_timestamp, restore_log_name};

#[derive(Debug, Clone)]
pub struct RestoreJob {
    pub target: String,
    pub source: RestoreSource,
    pub work_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// Local file name a remote dump is downloaded to: the last segment of its URI.
pub fn local_name_for(remote_uri: &str) -> Option<String> {
    let trimmed = remote_uri.trim_end_matches('/');
    let name = Path::new(trimmed).file_name()?.to_str()?;
    if name.is_empty() || trimmed.ends_with(':') {
        return None;
    }
    Some(name.to_string())
}

/// Restore pipeline for a single database. A downloaded dump is left on disk.
pub async fn perform_restore(
    job: RestoreJob,
    engine: &dyn DatabaseEngine,
    store: &dyn ObjectStore,
) -> JobOutcome {
    let stamp = file_timestamp(job.started_at);
    let log_path = job.work_dir.join(restore_log_name(&job.target, &stamp));

    let mut log = match JobLog::open(&log_path).await {
        Ok(log) => log,
        Err(e) => {
            tracing::error!(
                database = %job.target,
                "Fatal: Could not open log file '{}': {}",
                log_path.display(),
                e
            );
            return JobOutcome::LogUnavailable;
        }
    };

    let artifact = match &job.source {
        RestoreSource::Local(path) => {
            log.line(format!(
                "Starting restore process for '{}' using '{}' dump...",
                job.target,
                path.display()
            ))
            .await;
            path.clone()
        }
        RestoreSource::Remote(uri) => {
            log.line(format!(
                "Starting restore process for '{}' using '{}' dump...",
                job.target, uri
            ))
            .await;
            log.line("Downloading dump from remote storage...").await;

            let Some(name) = local_name_for(uri) else {
                log.line(format!(
                    "Error downloading dump: cannot derive a local file name from '{}'",
                    uri
                ))
                .await;
                return JobOutcome::DownloadFailed;
            };
            match store.download(uri, &job.work_dir.join(name)).await {
                Ok(local) => {
                    log.line("Download successful.").await;
                    log.line(format!("File downloaded to: {}", local.display()))
                        .await;
                    local
                }
                Err(e) => {
                    log.line(format!("Error downloading dump: {}", e)).await;
                    return JobOutcome::DownloadFailed;
                }
            }
        }
    };

    log.line("Restoring database...").await;
    if let Err(e) = engine.restore(&job.target, &artifact).await {
        log.line(format!(
            "Error during restoring the DB '{}': {}",
            job.target, e
        ))
        .await;
        return JobOutcome::RestoreFailed;
    }
    log.line("DB restored successfully.").await;
    JobOutcome::Restored
}
