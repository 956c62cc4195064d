pub mod job_log;

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use which::which;

use crate::errors::{AppError, Result};

/// Finds a client executable (pg_dump, pg_restore, ...) in the system PATH.
pub fn find_executable(name: &str) -> Result<PathBuf> {
    which(name).map_err(|e| {
        AppError::config(format!(
            "{} executable not found in PATH ({}). Please ensure the database client tools are installed and in your PATH.",
            name, e
        ))
    })
}

/// UTC timestamp at second granularity, as embedded in log and dump file names.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

pub fn backup_log_name(env_tag: &str, target: &str, stamp: &str) -> String {
    format!("backup_log_{}_{}_{}.log", env_tag, target, stamp)
}

pub fn restore_log_name(target: &str, stamp: &str) -> String {
    format!("restore_log_{}_{}.log", target, stamp)
}

pub fn dump_artifact_name(env_tag: &str, target: &str, stamp: &str) -> String {
    format!("{}_{}_{}.dump", env_tag, target, stamp)
}
