// dbdump/src/orchestrator.rs
use std::future::Future;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Terminal state of one job. The job's log file carries the details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job log could not be opened; nothing was attempted.
    LogUnavailable,
    DumpFailed,
    /// Local-only dump; the artifact stays on disk.
    KeptLocal { artifact: PathBuf },
    /// Upload failed; the artifact is kept for manual inspection.
    UploadFailed { artifact: PathBuf },
    Uploaded {
        remote_uri: String,
        local_removed: bool,
    },
    DownloadFailed,
    RestoreFailed,
    Restored,
    /// The job task panicked or was aborted.
    Panicked,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            JobOutcome::KeptLocal { .. } | JobOutcome::Uploaded { .. } | JobOutcome::Restored
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub target: String,
    pub outcome: JobOutcome,
}

/// Launches one task per target right away and waits for every one of them.
///
/// With `limit` set, at most that many jobs run their pipeline at once; the
/// rest wait on a semaphore. A failing or panicking job never affects its
/// siblings. Reports come back in launch order.
pub async fn run_jobs<F, Fut>(
    targets: Vec<String>,
    limit: Option<NonZeroUsize>,
    label: &str,
    job: F,
) -> Vec<JobReport>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = JobOutcome> + Send + 'static,
{
    let permits = limit.map(|n| Arc::new(Semaphore::new(n.get())));
    let mut set = JoinSet::new();

    for (index, target) in targets.iter().enumerate() {
        println!("-> Spawning {} task for '{}'.", label, target);
        let fut = job(target.clone());
        let permits = permits.clone();
        set.spawn(async move {
            let _permit = match permits {
                Some(sem) => sem.acquire_owned().await.ok(),
                None => None,
            };
            (index, fut.await)
        });
    }
    println!(
        "\nAll {} processes have been started. Waiting for them to complete....",
        label
    );

    let mut outcomes: Vec<Option<JobOutcome>> = vec![None; targets.len()];
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((index, outcome)) => outcomes[index] = Some(outcome),
            Err(e) => tracing::error!(error = %e, "{} task did not run to completion", label),
        }
    }

    targets
        .into_iter()
        .zip(outcomes)
        .map(|(target, outcome)| JobReport {
            target,
            outcome: outcome.unwrap_or(JobOutcome::Panicked),
        })
        .collect()
}
