pub mod postgres;

use async_trait::async_trait;
use std::path::Path;

use crate::config::{ConnectionConfig, EngineKind};
use crate::errors::Result;
use self::postgres::PostgresEngine;

/// Databases that are never picked up when discovering all targets.
pub const EXCLUDED_DATABASES: &[&str] = &["template0", "template1", "postgres", "rdsadmin"];

/// Operations the jobs need from a database engine.
#[async_trait]
pub trait DatabaseEngine: Send + Sync {
    /// Writes a restorable archive of `target` to `artifact`. On failure no
    /// file is left at `artifact`.
    async fn dump(&self, target: &str, artifact: &Path) -> Result<()>;

    /// User databases, in server order, with system databases removed.
    async fn list_targets(&self) -> Result<Vec<String>>;

    /// Loads `artifact` into `target`, replacing conflicting objects.
    async fn restore(&self, target: &str, artifact: &Path) -> Result<()>;
}

/// What a run is going to ask of the engine. Only the client tools that
/// operation needs are located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Dump,
    Restore { jobs: u32 },
}

/// Supported engines. Selected once at startup.
#[derive(Debug)]
pub enum Engine {
    Postgres(PostgresEngine),
}

impl Engine {
    pub fn connect(connection: &ConnectionConfig, operation: Operation) -> Result<Self> {
        match connection.engine {
            EngineKind::Postgres => Ok(Engine::Postgres(PostgresEngine::new(
                connection.clone(),
                operation,
            )?)),
        }
    }
}

#[async_trait]
impl DatabaseEngine for Engine {
    async fn dump(&self, target: &str, artifact: &Path) -> Result<()> {
        match self {
            Engine::Postgres(pg) => pg.dump(target, artifact).await,
        }
    }

    async fn list_targets(&self) -> Result<Vec<String>> {
        match self {
            Engine::Postgres(pg) => pg.list_targets().await,
        }
    }

    async fn restore(&self, target: &str, artifact: &Path) -> Result<()> {
        match self {
            Engine::Postgres(pg) => pg.restore(target, artifact).await,
        }
    }
}

pub fn filter_user_databases<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty() && !EXCLUDED_DATABASES.contains(&name.as_str()))
        .collect()
}
