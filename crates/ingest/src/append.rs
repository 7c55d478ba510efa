use slog::{info, Logger};
use std::sync::Arc;

use crate::{header_bytes, PartitionStorage, Schema, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// File did not exist; written as header + rows
    Created,
    /// Rows appended after the existing content
    Appended,
    /// Nothing to write
    Skipped,
}

/// Decides whether a batch needs the header and hands it to storage, so
/// every partition file carries exactly one header line at its start.
pub struct AppendPlanner {
    storage: Arc<dyn PartitionStorage>,
    header: Vec<u8>,
    logger: Logger,
}

impl AppendPlanner {
    pub fn new(storage: Arc<dyn PartitionStorage>, schema: Schema, logger: Logger) -> Self {
        Self {
            storage,
            header: header_bytes(schema),
            logger,
        }
    }

    pub async fn plan_and_write(
        &self,
        path: &str,
        rows: &[u8],
    ) -> Result<WriteOutcome, StorageError> {
        if rows.is_empty() {
            return Ok(WriteOutcome::Skipped);
        }

        if self.storage.exists(path).await? {
            self.storage.write(path, rows, false).await?;
            info!(self.logger, "appended data to {}", self.storage.describe(path));
            return Ok(WriteOutcome::Appended);
        }

        let mut content = Vec::with_capacity(self.header.len() + rows.len());
        content.extend_from_slice(&self.header);
        content.extend_from_slice(rows);
        self.storage.write(path, &content, true).await?;
        info!(self.logger, "created new file {}", self.storage.describe(path));
        Ok(WriteOutcome::Created)
    }
}
