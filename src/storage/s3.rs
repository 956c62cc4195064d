// dbdump/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::{ObjectStore, object_key};
use crate::config::RemoteSettings;
use crate::errors::{AppError, Result};

/// S3 (or S3-compatible) storage. Credentials come from the standard AWS
/// provider chain.
pub struct S3Store {
    client: s3::Client,
    bucket: Option<String>,
    folder_prefix: Option<String>,
}

impl S3Store {
    pub async fn connect(settings: RemoteSettings) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()));
        if let Some(endpoint) = &settings.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        S3Store {
            client: s3::Client::new(&sdk_config),
            bucket: settings.bucket,
            folder_prefix: settings.folder_prefix,
        }
    }
}

/// Parses an S3 URI (s3://bucket/key) into bucket and key. The key is taken
/// verbatim, so spaces, `#` and `?` stay part of it.
pub fn parse_s3_uri(s3_uri: &str) -> Result<(String, String)> {
    let rest = s3_uri.strip_prefix("s3://").ok_or_else(|| {
        AppError::transfer(format!("S3 URI must start with s3://, got '{}'", s3_uri))
    })?;
    let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
    if bucket.is_empty() {
        return Err(AppError::transfer(format!(
            "S3 URI '{}' is missing the bucket name",
            s3_uri
        )));
    }
    if key.is_empty() {
        return Err(AppError::transfer(format!(
            "S3 URI '{}' is missing the object key",
            s3_uri
        )));
    }
    Ok((bucket.to_string(), key.to_string()))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn upload(&self, local: &Path, key: &str) -> Result<String> {
        let bucket = self
            .bucket
            .as_deref()
            .ok_or_else(|| AppError::transfer("no bucket configured for upload"))?;
        let key = object_key(self.folder_prefix.as_deref(), key);

        let body = ByteStream::from_path(local).await.map_err(|e| {
            AppError::transfer(format!("failed to read {}: {}", local.display(), e))
        })?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(&key)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                AppError::transfer(format!(
                    "failed to upload {} to s3://{}/{}: {}",
                    local.display(),
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(format!("s3://{}/{}", bucket, key))
    }

    async fn download(&self, remote_uri: &str, local: &Path) -> Result<PathBuf> {
        let (bucket, key) = parse_s3_uri(remote_uri)?;

        let object = self
            .client
            .get_object()
            .bucket(&bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                AppError::transfer(format!(
                    "failed to download '{}': {}",
                    remote_uri,
                    DisplayErrorContext(&e)
                ))
            })?;

        match write_body(object.body, local).await {
            Ok(bytes) => {
                tracing::debug!(uri = remote_uri, path = %local.display(), bytes, "download complete");
                Ok(local.to_path_buf())
            }
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(local).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %local.display(), error = %rm, "could not remove partial download");
                    }
                }
                Err(AppError::transfer(format!(
                    "failed to download '{}' to {}: {}",
                    remote_uri,
                    local.display(),
                    e
                )))
            }
        }
    }
}

async fn write_body(mut body: ByteStream, local: &Path) -> std::result::Result<u64, String> {
    let mut file = File::create(local).await.map_err(|e| e.to_string())?;
    let mut total: u64 = 0;
    while let Some(chunk) = body.try_next().await.map_err(|e| e.to_string())? {
        file.write_all(&chunk).await.map_err(|e| e.to_string())?;
        total += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| e.to_string())?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_s3_uri() -> anyhow::Result<()> {
        let (bucket, key) = parse_s3_uri("s3://backups/nightly/orders_20240101_000000.dump")?;
        assert_eq!(bucket, "backups");
        assert_eq!(key, "nightly/orders_20240101_000000.dump");
        Ok(())
    }

    #[test]
    fn test_parse_s3_uri_rejects_bad_input() {
        assert!(matches!(
            parse_s3_uri("https://backups/orders.dump"),
            Err(AppError::Transfer(_))
        ));
        assert!(matches!(parse_s3_uri("s3://backups/"), Err(AppError::Transfer(_))));
        assert!(matches!(parse_s3_uri("orders.dump"), Err(AppError::Transfer(_))));
        assert!(matches!(parse_s3_uri("s3:///orders.dump"), Err(AppError::Transfer(_))));
        assert!(matches!(parse_s3_uri("s3://backups"), Err(AppError::Transfer(_))));
    }

    #[tokio::test]
    async fn test_write_body_reports_bytes_written() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let local = dir.path().join("orders_20240101_000000.dump");

        let bytes = write_body(ByteStream::from_static(b"PGDMP archive"), &local)
            .await
            .map_err(anyhow::Error::msg)?;

        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read(&local)?, b"PGDMP archive");
        Ok(())
    }

    #[test]
    fn test_parse_s3_uri_keeps_key_verbatim() -> anyhow::Result<()> {
        for (uri, expected) in [
            (
                "s3://backups/nightly/prod_my orders_20240101_000000.dump",
                "nightly/prod_my orders_20240101_000000.dump",
            ),
            (
                "s3://backups/prod_orders#1_20240101_000000.dump",
                "prod_orders#1_20240101_000000.dump",
            ),
            ("s3://backups/prod_orders?v=1.dump", "prod_orders?v=1.dump"),
        ] {
            let (bucket, key) = parse_s3_uri(uri)?;
            assert_eq!(bucket, "backups");
            assert_eq!(key, expected);
        }
        Ok(())
    }
}
