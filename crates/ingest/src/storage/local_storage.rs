use async_trait::async_trait;
use slog::{debug, Logger};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use weatherbit_ingest_core::{append_bytes, path_exists, write_bytes};

use super::{PartitionStorage, StorageError};

/// Partition files under a directory on the local filesystem.
pub struct LocalStorage {
    root: PathBuf,
    logger: Logger,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, logger: Logger) -> Self {
        Self {
            root: root.into(),
            logger,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl PartitionStorage for LocalStorage {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(path_exists(&self.resolve(path)))
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let full_path = self.resolve(path);
        match tokio::fs::read(&full_path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(self.io_error(&full_path, err)),
        }
    }

    async fn write(&self, path: &str, bytes: &[u8], create: bool) -> Result<(), StorageError> {
        let full_path = self.resolve(path);
        let result = if create {
            write_bytes(&full_path, bytes)
        } else {
            append_bytes(&full_path, bytes)
        };
        result.map_err(|err| self.io_error(&full_path, err))?;
        debug!(
            self.logger,
            "wrote {} bytes to {} (create: {})",
            bytes.len(),
            full_path.display(),
            create
        );
        Ok(())
    }

    fn describe(&self, path: &str) -> String {
        self.resolve(path).display().to_string()
    }
}
