// dbdump/src/engine/postgres.rs
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;

use super::{DatabaseEngine, Operation, filter_user_databases};
use crate::config::ConnectionConfig;
use crate::errors::{AppError, Result};
use crate::utils::find_executable;

/// Postgres adapter driving `pg_dump` / `pg_restore`.
///
/// The password is given to each child process through its own environment;
/// the parent process environment is never touched, so concurrent jobs
/// cannot observe each other's credential.
#[derive(Debug)]
pub struct PostgresEngine {
    connection: ConnectionConfig,
    restore_jobs: u32,
    pg_dump: Option<PathBuf>,
    pg_restore: Option<PathBuf>,
}

impl PostgresEngine {
    pub fn new(connection: ConnectionConfig, operation: Operation) -> Result<Self> {
        Self::locate(connection, operation, find_executable)
    }

    /// Resolves only the client tool `operation` runs; a missing one is a
    /// configuration error.
    pub fn locate<F>(connection: ConnectionConfig, operation: Operation, find: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<PathBuf>,
    {
        Ok(match operation {
            Operation::Dump => Self::with_tools(connection, 1, Some(find("pg_dump")?), None),
            Operation::Restore { jobs } => {
                Self::with_tools(connection, jobs, None, Some(find("pg_restore")?))
            }
        })
    }

    pub fn with_tools(
        connection: ConnectionConfig,
        restore_jobs: u32,
        pg_dump: Option<PathBuf>,
        pg_restore: Option<PathBuf>,
    ) -> Self {
        PostgresEngine {
            connection,
            restore_jobs: restore_jobs.max(1),
            pg_dump,
            pg_restore,
        }
    }

    fn tool<'a>(path: &'a Option<PathBuf>, name: &str) -> Result<&'a Path> {
        path.as_deref().ok_or_else(|| {
            AppError::engine(format!("{} was not located for this run", name))
        })
    }

    fn connection_args(&self, target: &str) -> Vec<OsString> {
        vec![
            "-h".into(),
            self.connection.host.clone().into(),
            "-p".into(),
            self.connection.port.to_string().into(),
            "-U".into(),
            self.connection.user.clone().into(),
            // Never prompt; a missing or wrong password must fail the call.
            "-w".into(),
            "-d".into(),
            target.into(),
        ]
    }

    fn dump_args(&self, target: &str, artifact: &Path) -> Vec<OsString> {
        let mut args = self.connection_args(target);
        args.extend(["-F", "c", "-c", "-f"].map(OsString::from));
        args.push(artifact.as_os_str().to_os_string());
        args
    }

    fn restore_args(&self, target: &str, artifact: &Path) -> Vec<OsString> {
        let mut args = self.connection_args(target);
        args.push("-j".into());
        args.push(self.restore_jobs.to_string().into());
        args.extend(["--clean", "--if-exists"].map(OsString::from));
        args.push(artifact.as_os_str().to_os_string());
        args
    }

    async fn run_tool(&self, program: &Path, args: Vec<OsString>) -> std::io::Result<Output> {
        Command::new(program)
            .args(args)
            .env("PGPASSWORD", self.connection.credential.expose())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
    }
}

#[async_trait]
impl DatabaseEngine for PostgresEngine {
    async fn dump(&self, target: &str, artifact: &Path) -> Result<()> {
        let pg_dump = Self::tool(&self.pg_dump, "pg_dump")?;
        let result = self.run_tool(pg_dump, self.dump_args(target, artifact)).await;
        let failure = match result {
            Ok(output) if output.status.success() => return Ok(()),
            Ok(output) => format!(
                "failed to dump '{}' ({}): {}",
                target,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => format!("failed to execute {} for '{}': {}", pg_dump.display(), target, e),
        };

        match tokio::fs::remove_file(artifact).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::engine(format!(
                    "{}; additionally the partial dump '{}' could not be removed: {}",
                    failure,
                    artifact.display(),
                    e
                )));
            }
        }
        Err(AppError::engine(failure))
    }

    async fn list_targets(&self) -> Result<Vec<String>> {
        let options = PgConnectOptions::new()
            .host(&self.connection.host)
            .port(self.connection.port)
            .username(&self.connection.user)
            .password(self.connection.credential.expose())
            .database("postgres");

        let mut conn = PgConnection::connect_with(&options).await.map_err(|e| {
            AppError::engine(format!(
                "could not list databases: failed to connect to {}:{}: {}",
                self.connection.host, self.connection.port, e
            ))
        })?;

        let names: Vec<String> =
            sqlx::query_scalar("SELECT datname FROM pg_database ORDER BY datname")
                .fetch_all(&mut conn)
                .await
                .map_err(|e| AppError::engine(format!("could not list databases: {}", e)))?;

        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "failed to close listing connection");
        }

        Ok(filter_user_databases(names))
    }

    async fn restore(&self, target: &str, artifact: &Path) -> Result<()> {
        let pg_restore = Self::tool(&self.pg_restore, "pg_restore")?;
        let output = self
            .run_tool(pg_restore, self.restore_args(target, artifact))
            .await
            .map_err(|e| {
                AppError::engine(format!(
                    "failed to execute {} for '{}': {}",
                    pg_restore.display(),
                    target,
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(AppError::engine(format!(
                "failed to restore '{}' ({}): {}",
                target,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Credential, EngineKind};

    fn connection() -> ConnectionConfig {
        ConnectionConfig {
            host: "db.internal".to_string(),
            port: 6432,
            user: "backup".to_string(),
            credential: Credential::new("s3cr3t"),
            engine: EngineKind::Postgres,
        }
    }

    fn engine_with(pg_dump: PathBuf, pg_restore: PathBuf) -> PostgresEngine {
        PostgresEngine::with_tools(connection(), 4, Some(pg_dump), Some(pg_restore))
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_dump_args_use_custom_format() {
        let engine = engine_with(PathBuf::from("pg_dump"), PathBuf::from("pg_restore"));
        let args = strings(engine.dump_args("app", Path::new("prod_app_20240101_000000.dump")));
        assert_eq!(
            args,
            vec![
                "-h", "db.internal", "-p", "6432", "-U", "backup", "-w", "-d", "app", "-F", "c",
                "-c", "-f", "prod_app_20240101_000000.dump"
            ]
        );
        assert!(!args.iter().any(|a| a.contains("s3cr3t")));
    }

    #[test]
    fn test_restore_args_are_parallel_and_clean() {
        let engine = engine_with(PathBuf::from("pg_dump"), PathBuf::from("pg_restore"));
        let args = strings(engine.restore_args("orders", Path::new("orders.dump")));
        let jobs = args.iter().position(|a| a == "-j").unwrap();
        assert_eq!(args[jobs + 1], "4");
        assert!(args.contains(&"--clean".to_string()));
        assert!(args.contains(&"--if-exists".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("orders.dump"));
        assert!(!args.iter().any(|a| a.contains("s3cr3t")));
    }

    #[test]
    fn test_restore_jobs_never_zero() {
        let engine = PostgresEngine::with_tools(connection(), 0, None, None);
        assert_eq!(engine.restore_jobs, 1);
    }

    fn only_pg_dump(name: &str) -> Result<PathBuf> {
        match name {
            "pg_dump" => Ok(PathBuf::from("/usr/bin/pg_dump")),
            other => Err(AppError::config(format!("{} executable not found in PATH", other))),
        }
    }

    #[tokio::test]
    async fn test_dump_host_does_not_need_restore_tool() -> anyhow::Result<()> {
        let engine = PostgresEngine::locate(connection(), Operation::Dump, only_pg_dump)?;
        assert_eq!(engine.pg_dump.as_deref(), Some(Path::new("/usr/bin/pg_dump")));

        let err = engine
            .restore("orders", Path::new("orders.dump"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Engine(_)));
        assert!(err.to_string().contains("pg_restore"));
        Ok(())
    }

    #[test]
    fn test_restore_requires_restore_tool() {
        let err = PostgresEngine::locate(connection(), Operation::Restore { jobs: 2 }, only_pg_dump)
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("pg_restore"));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) -> anyhow::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_dump_removes_partial_artifact() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let pg_dump = write_script(
            dir.path(),
            "fake_pg_dump",
            r#"while [ $# -gt 0 ]; do
  if [ "$1" = "-f" ]; then echo partial > "$2"; fi
  shift
done
echo "connection to server failed" >&2
exit 1"#,
        )?;
        let engine = engine_with(pg_dump, PathBuf::from("pg_restore"));
        let artifact = dir.path().join("prod_app_20240101_000000.dump");

        let err = engine.dump("app", &artifact).await.unwrap_err();

        assert!(matches!(err, AppError::Engine(_)));
        assert!(err.to_string().contains("connection to server failed"));
        assert!(!artifact.exists());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_password_reaches_child_only() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let pg_dump = write_script(
            dir.path(),
            "fake_pg_dump",
            r#"[ "$PGPASSWORD" = "s3cr3t" ] || { echo "no password" >&2; exit 2; }
while [ $# -gt 0 ]; do
  if [ "$1" = "-f" ]; then echo archive > "$2"; fi
  shift
done"#,
        )?;
        let engine = engine_with(pg_dump, PathBuf::from("pg_restore"));
        let artifact = dir.path().join("prod_app_20240101_000000.dump");

        engine.dump("app", &artifact).await?;

        assert!(artifact.exists());
        assert!(std::env::var("PGPASSWORD").map_or(true, |v| v != "s3cr3t"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_restore_tool_is_engine_failure() {
        let engine = engine_with(
            PathBuf::from("pg_dump"),
            PathBuf::from("/nonexistent/dbdump-test/pg_restore"),
        );
        let err = engine
            .restore("orders", Path::new("orders.dump"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Engine(_)));
    }
}
