pub(crate) mod logic;

use chrono::Utc;
use std::sync::Arc;

use crate::config::RestoreConfig;
use crate::engine::DatabaseEngine;
use crate::orchestrator::{JobReport, run_jobs};
use crate::storage::ObjectStore;
use logic::{RestoreJob, perform_restore};

/// Public entry point for the restore process. Runs the restore job in the
/// background and returns once it has finished.
pub async fn run_restore_flow(
    config: &RestoreConfig,
    engine: Arc<dyn DatabaseEngine>,
    store: Arc<dyn ObjectStore>,
) -> Vec<JobReport> {
    println!("\nInitializing restore process in background...");
    let reports = run_jobs(vec![config.database.clone()], None, "restore", |target| {
        let job = RestoreJob {
            target,
            source: config.source.clone(),
            work_dir: config.work_dir.clone(),
            started_at: Utc::now(),
        };
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        async move { perform_restore(job, engine.as_ref(), store.as_ref()).await }
    })
    .await;

    for report in &reports {
        tracing::debug!(
            database = %report.target,
            succeeded = report.outcome.is_success(),
            outcome = ?report.outcome,
            "restore job finished"
        );
    }
    reports
}
