// dbdump/src/config/mod.rs
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cli::{ConnectionArgs, DumpArgs, RestoreArgs};
use crate::errors::{AppError, Result};

pub const DEFAULT_REGION: &str = "eu-south-1";

const BUCKET_VAR: &str = "AWS_BUCKET";
const REGION_VAR: &str = "AWS_REGION";
const ENDPOINT_VAR: &str = "AWS_ENDPOINT_URL";
const FOLDER_PREFIX_VAR: &str = "AWS_FOLDER_PREFIX";

/// Database password. Only handed to the single adapter call that needs it.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Postgres,
}

impl FromStr for EngineKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(EngineKind::Postgres),
            other => Err(AppError::config(format!("Unsupported database type: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: Credential,
    pub engine: EngineKind,
}

impl ConnectionConfig {
    pub fn from_args(args: &ConnectionArgs) -> Result<Self> {
        if args.password.is_empty() {
            return Err(AppError::config("-W flag is required."));
        }
        Ok(ConnectionConfig {
            host: args.host.clone(),
            port: args.port,
            user: args.user.clone(),
            credential: Credential::new(args.password.clone()),
            engine: args.engine.parse()?,
        })
    }
}

/// How the set of databases for a dump run is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelection {
    /// Every database the engine can enumerate, minus system databases.
    All,
    Named(Vec<String>),
}

impl TargetSelection {
    pub fn from_flags(all: bool, names: &[String]) -> Result<Self> {
        if all {
            return Ok(TargetSelection::All);
        }
        if names.is_empty() {
            return Err(AppError::config("No databases specified. Use '-d' or '-a'."));
        }

        let mut unique: Vec<String> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                return Err(AppError::config("Database names passed with '-d' cannot be empty."));
            }
            if unique.iter().any(|seen| seen == name) {
                tracing::warn!(database = name, "database listed more than once, dumping it once");
                continue;
            }
            unique.push(name.to_string());
        }
        Ok(TargetSelection::Named(unique))
    }
}

#[derive(Debug, Clone)]
pub struct DumpConfig {
    pub connection: ConnectionConfig,
    pub targets: TargetSelection,
    pub env_tag: String,
    pub local_only: bool,
    pub max_parallel: Option<NonZeroUsize>,
    pub work_dir: PathBuf,
}

impl DumpConfig {
    pub fn from_args(args: &DumpArgs) -> Result<Self> {
        let env_tag = args.env_tag.trim();
        if env_tag.is_empty() {
            return Err(AppError::config("The environment tag passed with '-e' cannot be empty."));
        }
        Ok(DumpConfig {
            connection: ConnectionConfig::from_args(&args.connection)?,
            targets: TargetSelection::from_flags(args.all, &args.databases)?,
            env_tag: env_tag.to_string(),
            local_only: args.local,
            max_parallel: args.max_parallel,
            work_dir: PathBuf::from("."),
        })
    }
}

/// Where a restore job reads its dump from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreSource {
    /// Remote object URI, downloaded into the working directory first.
    Remote(String),
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct RestoreConfig {
    pub connection: ConnectionConfig,
    pub database: String,
    pub source: RestoreSource,
    pub jobs: u32,
    pub work_dir: PathBuf,
}

impl RestoreConfig {
    pub fn from_args(args: &RestoreArgs) -> Result<Self> {
        let database = args.database.trim();
        let source = args.source.trim();
        if database.is_empty() || source.is_empty() {
            return Err(AppError::config("-W, -d, -f flags are required for restore."));
        }
        let source = if args.remote {
            RestoreSource::Remote(source.to_string())
        } else {
            RestoreSource::Local(PathBuf::from(source))
        };
        Ok(RestoreConfig {
            connection: ConnectionConfig::from_args(&args.connection)?,
            database: database.to_string(),
            source,
            jobs: args.jobs.max(1),
            work_dir: PathBuf::from("."),
        })
    }
}

/// Remote storage location, read from the environment only when transfer is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub bucket: Option<String>,
    pub region: String,
    pub endpoint_url: Option<String>,
    pub folder_prefix: Option<String>,
}

impl RemoteSettings {
    /// Settings for uploading: the bucket is mandatory.
    pub fn for_upload_from<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = non_empty(lookup(BUCKET_VAR)).ok_or_else(|| {
            AppError::config(format!("environment variable '{}' is not set", BUCKET_VAR))
        })?;
        let mut settings = Self::for_download_from(lookup)?;
        settings.bucket = Some(bucket);
        Ok(settings)
    }

    /// Settings for downloading: the bucket comes from each object URI.
    pub fn for_download_from<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = non_empty(lookup(REGION_VAR)).unwrap_or_else(|| {
            tracing::warn!(
                "environment variable '{}' is not set, defaulting to '{}'",
                REGION_VAR,
                DEFAULT_REGION
            );
            DEFAULT_REGION.to_string()
        });

        let endpoint_url = non_empty(lookup(ENDPOINT_VAR));
        if let Some(endpoint) = &endpoint_url {
            url::Url::parse(endpoint).map_err(|e| {
                AppError::config(format!("'{}' is not a valid URL ({}): {}", ENDPOINT_VAR, endpoint, e))
            })?;
        }

        Ok(RemoteSettings {
            bucket: None,
            region,
            endpoint_url,
            folder_prefix: non_empty(lookup(FOLDER_PREFIX_VAR))
                .map(|p| p.trim_matches('/').to_string())
                .filter(|p| !p.is_empty()),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn connection_args() -> ConnectionArgs {
        ConnectionArgs {
            host: "127.0.0.1".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: "secret".to_string(),
            engine: "postgres".to_string(),
        }
    }

    #[test]
    fn test_target_selection_all_wins() -> anyhow::Result<()> {
        let selection = TargetSelection::from_flags(true, &[])?;
        assert_eq!(selection, TargetSelection::All);
        Ok(())
    }

    #[test]
    fn test_target_selection_named_dedups_in_order() -> anyhow::Result<()> {
        let names = vec!["app".to_string(), "billing".to_string(), "app".to_string()];
        let selection = TargetSelection::from_flags(false, &names)?;
        assert_eq!(
            selection,
            TargetSelection::Named(vec!["app".to_string(), "billing".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_target_selection_requires_something() {
        let err = TargetSelection::from_flags(false, &[]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = TargetSelection::from_flags(false, &["  ".to_string()]).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_engine_kind_parsing() -> anyhow::Result<()> {
        assert_eq!("postgres".parse::<EngineKind>()?, EngineKind::Postgres);
        assert!(matches!("mysql".parse::<EngineKind>(), Err(AppError::Config(_))));
        Ok(())
    }

    #[test]
    fn test_credential_is_redacted_in_debug() {
        let conn = ConnectionConfig::from_args(&connection_args()).unwrap();
        let rendered = format!("{:?}", conn);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("Credential(***)"));
        assert_eq!(conn.credential.expose(), "secret");
    }

    #[test]
    fn test_empty_password_is_rejected() {
        let mut args = connection_args();
        args.password.clear();
        assert!(matches!(ConnectionConfig::from_args(&args), Err(AppError::Config(_))));
    }

    #[test]
    fn test_restore_source_follows_remote_flag() -> anyhow::Result<()> {
        let mut args = RestoreArgs {
            connection: connection_args(),
            database: "orders".to_string(),
            source: "s3://bucket/orders_20240101_000000.dump".to_string(),
            jobs: 4,
            remote: true,
            help: None,
        };
        let config = RestoreConfig::from_args(&args)?;
        assert_eq!(
            config.source,
            RestoreSource::Remote("s3://bucket/orders_20240101_000000.dump".to_string())
        );
        assert_eq!(config.jobs, 4);

        args.remote = false;
        args.source = "/var/backups/orders.dump".to_string();
        let config = RestoreConfig::from_args(&args)?;
        assert_eq!(
            config.source,
            RestoreSource::Local(PathBuf::from("/var/backups/orders.dump"))
        );
        Ok(())
    }

    #[test]
    fn test_upload_settings_require_bucket() {
        let err = RemoteSettings::for_upload_from(lookup_from(&[("AWS_REGION", "us-east-1")]))
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("AWS_BUCKET"));
    }

    #[test]
    fn test_upload_settings_default_region() -> anyhow::Result<()> {
        let settings = RemoteSettings::for_upload_from(lookup_from(&[("AWS_BUCKET", "backups")]))?;
        assert_eq!(settings.bucket.as_deref(), Some("backups"));
        assert_eq!(settings.region, DEFAULT_REGION);
        assert_eq!(settings.endpoint_url, None);
        assert_eq!(settings.folder_prefix, None);
        Ok(())
    }

    #[test]
    fn test_download_settings_ignore_bucket_and_trim_prefix() -> anyhow::Result<()> {
        let settings = RemoteSettings::for_download_from(lookup_from(&[
            ("AWS_REGION", "eu-west-1"),
            ("AWS_FOLDER_PREFIX", "/nightly/"),
            ("AWS_ENDPOINT_URL", "https://fra1.digitaloceanspaces.com"),
        ]))?;
        assert_eq!(settings.bucket, None);
        assert_eq!(settings.region, "eu-west-1");
        assert_eq!(settings.folder_prefix.as_deref(), Some("nightly"));
        assert_eq!(
            settings.endpoint_url.as_deref(),
            Some("https://fra1.digitaloceanspaces.com")
        );
        Ok(())
    }

    #[test]
    fn test_malformed_endpoint_is_rejected() {
        let err = RemoteSettings::for_upload_from(lookup_from(&[
            ("AWS_BUCKET", "backups"),
            ("AWS_ENDPOINT_URL", "fra1 spaces"),
        ]))
        .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("AWS_ENDPOINT_URL"));
    }
}
