pub mod s3;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use self::s3::S3Store;
use crate::config::{RemoteSettings, RestoreSource};
use crate::errors::{AppError, Result};

/// Remote object storage used to ship dumps off the host.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copies `local` to remote storage under `key`, overwriting, and returns
    /// the fully qualified remote URI.
    async fn upload(&self, local: &Path, key: &str) -> Result<String>;

    /// Copies the object at `remote_uri` to `local`, overwriting, and returns
    /// the path actually written.
    async fn download(&self, remote_uri: &str, local: &Path) -> Result<PathBuf>;
}

/// Stand-in used when transfer is disabled. The jobs never call it.
#[derive(Debug, Default)]
pub struct NoopStore;

#[async_trait]
impl ObjectStore for NoopStore {
    async fn upload(&self, local: &Path, _key: &str) -> Result<String> {
        Err(AppError::transfer(format!(
            "remote transfer is disabled, refusing to upload {}",
            local.display()
        )))
    }

    async fn download(&self, remote_uri: &str, _local: &Path) -> Result<PathBuf> {
        Err(AppError::transfer(format!(
            "remote transfer is disabled, refusing to download {}",
            remote_uri
        )))
    }
}

/// Store for a dump run. Local-only runs never read the remote settings.
pub async fn for_dump<F>(local_only: bool, lookup: F) -> Result<Arc<dyn ObjectStore>>
where
    F: Fn(&str) -> Option<String>,
{
    if local_only {
        return Ok(Arc::new(NoopStore));
    }
    let settings = RemoteSettings::for_upload_from(lookup)?;
    Ok(Arc::new(S3Store::connect(settings).await))
}

/// Store for a restore run. Only a remote source needs one.
pub async fn for_restore<F>(source: &RestoreSource, lookup: F) -> Result<Arc<dyn ObjectStore>>
where
    F: Fn(&str) -> Option<String>,
{
    match source {
        RestoreSource::Local(_) => Ok(Arc::new(NoopStore)),
        RestoreSource::Remote(_) => {
            let settings = RemoteSettings::for_download_from(lookup)?;
            Ok(Arc::new(S3Store::connect(settings).await))
        }
    }
}

/// Object key for `file_name`, below `prefix` when one is configured.
pub fn object_key(prefix: Option<&str>, file_name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), file_name),
        None => file_name.to_string(),
    }
}
