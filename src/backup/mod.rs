pub(crate) mod logic;

use chrono::Utc;
use std::sync::Arc;

use crate::config::{DumpConfig, TargetSelection};
use crate::engine::DatabaseEngine;
use crate::errors::Result;
use crate::orchestrator::{JobReport, run_jobs};
use crate::storage::ObjectStore;
use logic::{DumpJob, perform_dump};

/// Resolves the databases to dump. Errors here happen before any job starts.
pub async fn resolve_targets(
    selection: &TargetSelection,
    engine: &dyn DatabaseEngine,
) -> Result<Vec<String>> {
    match selection {
        TargetSelection::All => engine.list_targets().await,
        TargetSelection::Named(names) => Ok(names.clone()),
    }
}

/// Public entry point for the dump process: one concurrent job per database,
/// returning once every job has finished.
pub async fn run_backup_flow(
    config: &DumpConfig,
    engine: Arc<dyn DatabaseEngine>,
    store: Arc<dyn ObjectStore>,
) -> Result<Vec<JobReport>> {
    let targets = resolve_targets(&config.targets, engine.as_ref()).await?;
    tracing::info!(count = targets.len(), "databases selected for dump");

    println!("\nInitializing backup process in background...");
    let reports = run_jobs(targets, config.max_parallel, "backup", |target| {
        let job = DumpJob {
            target,
            env_tag: config.env_tag.clone(),
            work_dir: config.work_dir.clone(),
            local_only: config.local_only,
            started_at: Utc::now(),
        };
        let engine = Arc::clone(&engine);
        let store = Arc::clone(&store);
        async move { perform_dump(job, engine.as_ref(), store.as_ref()).await }
    })
    .await;

    for report in &reports {
        tracing::debug!(
            database = %report.target,
            succeeded = report.outcome.is_success(),
            outcome = ?report.outcome,
            "dump job finished"
        );
    }
    Ok(reports)
}
