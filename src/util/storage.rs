use crate::config::MinioConfig;
use async_trait::async_trait;
use minio::s3::args::{BucketExistsArgs, MakeBucketArgs, PutObjectArgs, StatObjectArgs};
use minio::s3::client::{Client, ClientBuilder};
use minio::s3::creds::StaticProvider;
use minio::s3::http::BaseUrl;
use std::io::Cursor;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Operation error: {0}")]
    OperationError(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),
}

/// Seam over the photo bucket. The intake service depends on this trait so
/// tests can substitute an in-memory store.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload raw bytes under `key`. Refuses to overwrite an existing object.
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError>;

    /// Public download URL for an object, when the bucket exposes one.
    fn public_url(&self, key: &str) -> Option<String>;
}

/// MinIO-backed implementation of [`ObjectStorage`].
#[derive(Debug, Clone)]
pub struct MinioStorage {
    client: Client,
    pub config: MinioConfig,
}

impl MinioStorage {
    /// Create a new MinIO storage service, ensuring the bucket exists.
    #[instrument(skip(config), fields(endpoint = %config.endpoint, bucket = %config.bucket_name))]
    pub async fn new(config: MinioConfig) -> Result<Self, StorageError> {
        info!("Initializing MinIO storage service");

        config.validate().map_err(|e| {
            error!("MinIO configuration validation failed: {}", e);
            StorageError::ConfigError(e.to_string())
        })?;

        let base_url = config.get_endpoint_url().parse::<BaseUrl>().map_err(|e| {
            error!("Failed to parse MinIO endpoint URL: {}", e);
            StorageError::ConnectionError(format!("Invalid endpoint URL: {}", e))
        })?;

        let static_provider = StaticProvider::new(&config.access_key, &config.secret_key, None);

        let client = ClientBuilder::new(base_url)
            .provider(Some(Box::new(static_provider)))
            .build()
            .map_err(|e| {
                error!("Failed to create MinIO client: {}", e);
                StorageError::ConnectionError(format!("Client creation failed: {}", e))
            })?;

        let service = Self { client, config };
        service.ensure_bucket_exists().await?;

        info!("MinIO storage service initialized successfully");
        Ok(service)
    }

    /// Ensure the configured bucket exists, create if it doesn't
    #[instrument(skip(self))]
    async fn ensure_bucket_exists(&self) -> Result<(), StorageError> {
        let bucket_exists_args = BucketExistsArgs::new(&self.config.bucket_name)
            .map_err(|e| StorageError::InvalidArguments(e.to_string()))?;

        let exists = self
            .client
            .bucket_exists(&bucket_exists_args)
            .await
            .map_err(|e| {
                error!("Failed to check if bucket exists: {}", e);
                StorageError::OperationError(format!("Bucket exists check failed: {}", e))
            })?;

        if exists {
            debug!("Bucket '{}' already exists", self.config.bucket_name);
            return Ok(());
        }

        warn!("Bucket '{}' does not exist, creating it", self.config.bucket_name);

        let make_bucket_args = MakeBucketArgs::new(&self.config.bucket_name)
            .map_err(|e| StorageError::InvalidArguments(e.to_string()))?;

        self.client.make_bucket(&make_bucket_args).await.map_err(|e| {
            error!("Failed to create bucket '{}': {}", self.config.bucket_name, e);
            StorageError::OperationError(format!("Bucket creation failed: {}", e))
        })?;

        info!("Created bucket '{}'", self.config.bucket_name);
        Ok(())
    }

    async fn stat_exists(&self, key: &str) -> Result<bool, StorageError> {
        let args = StatObjectArgs::new(&self.config.bucket_name, key)
            .map_err(|e| StorageError::InvalidArguments(e.to_string()))?;

        match self.client.stat_object(&args).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

#[async_trait]
impl ObjectStorage for MinioStorage {
    #[instrument(skip(self, data), fields(key = %key, size = data.len()))]
    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        // Photo keys are never reused; a collision means something is wrong
        // upstream, so fail instead of silently replacing.
        if self.stat_exists(key).await? {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }

        info!("Uploading object '{}' to bucket '{}'", key, self.config.bucket_name);

        let bucket_name = self.config.bucket_name.clone();
        let key_owned = key.to_string();
        let client = self.client.clone();
        let content_type_owned = content_type.map(|ct| ct.to_string());

        tokio::task::spawn_blocking(move || {
            let mut reader = Cursor::new(data);
            let data_len = reader.get_ref().len();

            // Keep the content_type String alive for the duration of args
            let ct_holder = content_type_owned;

            let mut args = PutObjectArgs::new(
                &bucket_name,
                &key_owned,
                &mut reader,
                Some(data_len),
                None,
            )
            .map_err(|e| StorageError::InvalidArguments(e.to_string()))?;

            if let Some(ref ct) = ct_holder {
                args.content_type = ct;
            }

            futures::executor::block_on(client.put_object(&mut args))
                .map_err(|e| StorageError::OperationError(format!("Upload failed: {}", e)))?;

            debug!("Uploaded object '{}'", &key_owned);
            Ok(())
        })
        .await
        .map_err(|e| {
            error!("Failed to join blocking task for put_object: {}", e);
            StorageError::OperationError(format!("Join error: {}", e))
        })??;
        Ok(())
    }

    fn public_url(&self, key: &str) -> Option<String> {
        Some(format!(
            "{}/{}/{}",
            self.config.links_prefix.trim_end_matches('/'),
            self.config.bucket_name,
            key
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_url_joins_prefix_bucket_and_key() {
        let storage = MinioStorage {
            client: ClientBuilder::new("http://localhost:9000".parse().expect("base url"))
                .build()
                .expect("client"),
            config: MinioConfig {
                links_prefix: "https://cdn.example.com/".to_string(),
                bucket_name: "devis-photos".to_string(),
                ..MinioConfig::default()
            },
        };
        assert_eq!(
            storage.public_url("abc/def.jpg").as_deref(),
            Some("https://cdn.example.com/devis-photos/abc/def.jpg")
        );
    }
}
