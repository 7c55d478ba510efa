use async_trait::async_trait;
use aws_sdk_s3::{primitives::ByteStream, Client};
use slog::{debug, error, info, Logger};

use super::{PartitionStorage, StorageError};

const CONTENT_TYPE: &str = "text/csv; charset=shift_jis";

/// Partition files as objects in one bucket. Appends are read-modify-write,
/// so two writers on the same key must not run at the same time.
pub struct S3Storage {
    client: Client,
    bucket: String,
    logger: Logger,
}

impl S3Storage {
    pub async fn new(
        bucket: String,
        endpoint: Option<String>,
        logger: Logger,
    ) -> Result<Self, anyhow::Error> {
        let mut config_loader = aws_config::from_env();

        if let Some(endpoint_url) = endpoint {
            info!(logger, "Using custom S3 endpoint: {}", endpoint_url);
            config_loader = config_loader.endpoint_url(endpoint_url);
        }

        let config = config_loader.load().await;
        let client = Client::new(&config);

        info!(logger, "S3 storage initialized for bucket: {}", bucket);

        Ok(Self {
            client,
            bucket,
            logger,
        })
    }

    fn store_error(&self, key: &str, err: impl std::fmt::Display) -> StorageError {
        error!(self.logger, "S3 request failed for {}: {}", self.describe(key), err);
        StorageError::ObjectStore {
            key: key.to_string(),
            message: err.to_string(),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StorageError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(CONTENT_TYPE)
            .send()
            .await
            .map_err(|err| self.store_error(key, err))?;

        debug!(self.logger, "uploaded {} bytes to {}", size, self.describe(key));
        Ok(())
    }
}

#[async_trait]
impl PartitionStorage for S3Storage {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(self.store_error(path, err)),
        }
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => {
                return Ok(None)
            }
            Err(err) => return Err(self.store_error(path, err)),
        };

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| self.store_error(path, err))?;
        Ok(Some(body.into_bytes().to_vec()))
    }

    async fn write(&self, path: &str, bytes: &[u8], create: bool) -> Result<(), StorageError> {
        if create {
            return self.put(path, bytes.to_vec()).await;
        }

        let mut combined = self.read(path).await?.unwrap_or_default();
        combined.extend_from_slice(bytes);
        self.put(path, combined).await
    }

    fn describe(&self, path: &str) -> String {
        format!("s3://{}/{}", self.bucket, path)
    }
}
