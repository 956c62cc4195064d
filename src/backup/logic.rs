// dbdump/src/backup/logic.rs
use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::engine::DatabaseEngine;
use crate::orchestrator::JobOutcome;
use crate::storage::ObjectStore;
use crate::utils::job_log::JobLog;
use crate::utils::{backup_log_name, dump_artifact_name, file_timestamp};

/// Everything one dump job needs to know about its target.
#[derive(Debug, Clone)]
pub struct DumpJob {
    pub target: String,
    pub env_tag: String,
    pub work_dir: PathBuf,
    pub local_only: bool,
    pub started_at: DateTime<Utc>,
}

/// Dump pipeline for a single database: dump, then upload and clean up unless
/// the dump is meant to stay local.
pub async fn perform_dump(
    job: DumpJob,
    engine: &dyn DatabaseEngine,
    store: &dyn ObjectStore,
) -> JobOutcome {
    let stamp = file_timestamp(job.started_at);
    let log_path = job
        .work_dir
        .join(backup_log_name(&job.env_tag, &job.target, &stamp));

    let mut log = match JobLog::open(&log_path).await {
        Ok(log) => log,
        Err(e) => {
            tracing::error!(
                database = %job.target,
                "Fatal: Could not open log file {}: {}",
                log_path.display(),
                e
            );
            return JobOutcome::LogUnavailable;
        }
    };
    log.line(format!("Starting dump process for '{}'...", job.target))
        .await;

    let artifact_name = dump_artifact_name(&job.env_tag, &job.target, &stamp);
    let artifact = job.work_dir.join(&artifact_name);

    log.line("1. Dumping database...").await;
    if let Err(e) = engine.dump(&job.target, &artifact).await {
        log.line(format!("Error during dump: {}", e)).await;
        return JobOutcome::DumpFailed;
    }
    log.line("Dump successful.").await;

    if job.local_only {
        log.line("Skipping upload as requested.").await;
        log.line(format!(
            "Process finished successfully. Your dump file is: {}",
            artifact.display()
        ))
        .await;
        return JobOutcome::KeptLocal { artifact };
    }

    log.line("2. Uploading to remote storage...").await;
    let remote_uri = match store.upload(&artifact, &artifact_name).await {
        Ok(uri) => uri,
        Err(e) => {
            log.line(format!("Error during upload: {}", e)).await;
            log.line(format!(
                "The local file '{}' has been kept for manual inspection.",
                artifact.display()
            ))
            .await;
            return JobOutcome::UploadFailed { artifact };
        }
    };
    log.line("Upload successful.").await;

    let local_removed = match tokio::fs::remove_file(&artifact).await {
        Ok(()) => {
            log.line(format!(
                "Local file '{}' has been deleted.",
                artifact.display()
            ))
            .await;
            true
        }
        Err(e) => {
            log.line(format!(
                "Warning: Could not delete local file '{}'. Error: {}",
                artifact.display(),
                e
            ))
            .await;
            false
        }
    };
    log.line(format!(
        "3. Dump complete. File uploaded to: {}",
        remote_uri
    ))
    .await;
    log.line("Process finished successfully.").await;

    JobOutcome::Uploaded {
        remote_uri,
        local_removed,
    }
}
