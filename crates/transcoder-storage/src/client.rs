//! Blob store client: a thin wrapper over the S3-compatible object store SDK.
//!
//! Used by the HTTP surface's upload/download endpoints and by the Worker
//! Runner's download/upload steps. Exposes exactly the operations the core
//! needs — upload, download, presign, existence check, delete, and a
//! connectivity probe for the readiness endpoint — and nothing about how
//! those keys are organized, which is a caller concern.

use std::path::Path;
use std::time::Duration;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Configuration for the blob store client, read from the environment
/// variables enumerated by the source spec (`S3_*`).
#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    pub endpoint_url: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Region passed to the SDK; most S3-compatible stores accept "auto".
    pub region: String,
}

impl BlobStoreConfig {
    pub fn from_env() -> StorageResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL")
                .map_err(|_| StorageError::config_error("S3_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("S3_ACCESS_KEY_ID")
                .map_err(|_| StorageError::config_error("S3_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("S3_SECRET_ACCESS_KEY")
                .map_err(|_| StorageError::config_error("S3_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("S3_BUCKET_NAME")
                .map_err(|_| StorageError::config_error("S3_BUCKET_NAME not set"))?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "auto".to_string()),
        })
    }
}

/// Blob store client used by the Dispatcher's upload/download endpoints and
/// the Worker Runner's input/output steps.
#[derive(Clone)]
pub struct BlobStoreClient {
    client: Client,
    bucket: String,
}

impl BlobStoreClient {
    pub async fn new(config: BlobStoreConfig) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "transcoder-orchestrator",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
        })
    }

    pub async fn from_env() -> StorageResult<Self> {
        Self::new(BlobStoreConfig::from_env()?).await
    }

    /// Upload a local file to `remote_key`.
    pub async fn upload(
        &self,
        local_path: impl AsRef<Path>,
        remote_key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let local_path = local_path.as_ref();
        debug!("uploading {} to {}", local_path.display(), remote_key);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(remote_key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("uploaded {} to {}", local_path.display(), remote_key);
        Ok(())
    }

    /// Upload in-memory bytes to `remote_key` (used by the multipart upload
    /// endpoint, which buffers the request body before storing it).
    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        remote_key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(remote_key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;
        Ok(())
    }

    /// Download `remote_key` to a local path, creating parent directories
    /// as needed. Used by the Worker Runner's scratch-directory download.
    pub async fn download(&self, remote_key: &str, local_path: impl AsRef<Path>) -> StorageResult<()> {
        let local_path = local_path.as_ref();
        debug!("downloading {} to {}", remote_key, local_path.display());

        let bytes = self.download_bytes(remote_key).await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::DownloadFailed(format!("creating directory: {e}")))?;
        }
        tokio::fs::write(local_path, bytes)
            .await
            .map_err(|e| StorageError::DownloadFailed(format!("writing file: {e}")))?;

        info!("downloaded {} to {}", remote_key, local_path.display());
        Ok(())
    }

    pub async fn download_bytes(&self, remote_key: &str) -> StorageResult<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(remote_key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(remote_key)
                } else {
                    StorageError::DownloadFailed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }

    /// A time-limited signed URL for `GET`, used by `/download/:key/signed`.
    pub async fn presign(&self, remote_key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(remote_key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    pub async fn exists(&self, remote_key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(remote_key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                if e.to_string().contains("NotFound") || e.to_string().contains("NoSuchKey") {
                    Ok(false)
                } else {
                    Err(StorageError::AwsSdk(e.to_string()))
                }
            }
        }
    }

    pub async fn delete(&self, remote_key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(remote_key)
            .send()
            .await
            .map_err(|e| StorageError::delete_failed(e.to_string()))?;
        Ok(())
    }

    /// Used by the readiness probe: a bucket-level head request that fails
    /// fast if credentials or connectivity are bad.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::AwsSdk(format!("blob store connectivity check failed: {e}")))?;
        Ok(())
    }
}
