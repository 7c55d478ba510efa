mod local_storage;
#[cfg(feature = "s3")]
mod s3_storage;

pub use local_storage::*;
#[cfg(feature = "s3")]
pub use s3_storage::*;

use async_trait::async_trait;
use slog::{debug, warn, Logger};
use thiserror::Error;

use crate::{decode_shift_jis, existing_keys_from_csv, ExistingKeyScheme, KnownKeys};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("object store error on {key}: {message}")]
    ObjectStore { key: String, message: String },
}

/// Where partition files live. Paths are relative, e.g.
/// `weather-data/tokyo/2024/03/wbfc_20240301.csv`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PartitionStorage: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Full contents, or `None` when the file does not exist.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Create the file with `bytes` when `create` is set, otherwise append
    /// `bytes` to what is already there.
    async fn write(&self, path: &str, bytes: &[u8], create: bool) -> Result<(), StorageError>;

    /// Human readable location for log lines.
    fn describe(&self, path: &str) -> String;
}

/// Keys already present in the partition at `path`. A missing file, or one
/// that cannot be decoded or parsed, yields an empty set.
pub async fn read_existing_keys(
    storage: &dyn PartitionStorage,
    path: &str,
    scheme: ExistingKeyScheme,
    logger: &Logger,
) -> Result<KnownKeys, StorageError> {
    let Some(bytes) = storage.read(path).await? else {
        debug!(logger, "no existing file at {}", storage.describe(path));
        return Ok(KnownKeys::new());
    };

    let Some(text) = decode_shift_jis(&bytes) else {
        warn!(
            logger,
            "existing file {} is not valid shift_jis, treating as empty",
            storage.describe(path)
        );
        return Ok(KnownKeys::new());
    };

    match existing_keys_from_csv(&text, scheme) {
        Ok(keys) => {
            debug!(
                logger,
                "loaded {} existing keys from {}",
                keys.len(),
                storage.describe(path)
            );
            Ok(keys)
        }
        Err(err) => {
            warn!(
                logger,
                "failed to read existing keys from {}: {}",
                storage.describe(path),
                err
            );
            Ok(KnownKeys::new())
        }
    }
}
