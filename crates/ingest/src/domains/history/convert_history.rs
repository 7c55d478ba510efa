use slog::{debug, info, warn, Logger};

use crate::{
    encode_rows, history_key, record_instant, ApiResponse, EncodingError, Flattener,
    HistoryWindow, KnownKeys, Location, PartitionBatch, PartitionKey, RawRecord, Schema,
    SourceMetadata, TimestampKind, TimestampNormalizer,
};

/// Turns a history response into the batch for one monthly partition.
pub struct HistoryConverter {
    normalizer: TimestampNormalizer,
    flattener: Flattener,
    logger: Logger,
}

impl HistoryConverter {
    pub fn new(normalizer: TimestampNormalizer, logger: Logger) -> Self {
        Self {
            flattener: Flattener::new(Schema::History, normalizer.clone()),
            normalizer,
            logger,
        }
    }

    /// Records whose instant falls inside `window`, in chronological order.
    /// Records without a usable instant are dropped.
    pub fn window_records<'r>(
        &self,
        response: &'r ApiResponse,
        window: &HistoryWindow,
    ) -> Vec<&'r RawRecord> {
        let mut retained: Vec<_> = response
            .records()
            .iter()
            .filter_map(|record| {
                let instant = record_instant(&self.normalizer, record)?;
                window.contains(instant).then_some((instant, record))
            })
            .collect();
        retained.sort_by_key(|(instant, _)| *instant);

        debug!(
            self.logger,
            "{} of {} records fall within {} .. {}",
            retained.len(),
            response.records().len(),
            window.start,
            window.end
        );
        retained.into_iter().map(|(_, record)| record).collect()
    }

    /// Month of the first record's `timestamp_utc` as written, or the
    /// current month when that cannot be read.
    pub fn partition_month(&self, first: Option<&RawRecord>) -> PartitionKey {
        let written = first
            .and_then(RawRecord::timestamp_utc)
            .and_then(|raw| self.normalizer.parse_as_written(raw, TimestampKind::Utc).ok());

        let instant = match written {
            Some(instant) => instant,
            None => {
                warn!(
                    self.logger,
                    "could not read month from first record, using current month"
                );
                self.normalizer.now()
            }
        };
        PartitionKey::Month {
            year: instant.year(),
            month: u8::from(instant.month()),
        }
    }

    /// Deduplicate, flatten and encode `records` (already windowed and
    /// sorted). Accepted keys are added to `known`. `None` when nothing is
    /// new.
    pub fn convert(
        &self,
        key: PartitionKey,
        records: &[&RawRecord],
        metadata: &SourceMetadata,
        location: &Location,
        known: &mut KnownKeys,
    ) -> Result<Option<PartitionBatch>, EncodingError> {
        let mut rows = Vec::with_capacity(records.len());
        let mut duplicates = 0;

        for record in records {
            let record_key = history_key(&self.normalizer, record, location.lat, location.lon);
            if known.contains(&record_key) {
                duplicates += 1;
                continue;
            }
            rows.push(self.flattener.flatten(record, metadata, None));
            known.insert(record_key);
        }

        if duplicates > 0 {
            info!(self.logger, "skipped {} duplicate records for {}", duplicates, key);
        }
        if rows.is_empty() {
            return Ok(None);
        }

        Ok(Some(PartitionBatch {
            key,
            bytes: encode_rows(&rows)?,
            rows: rows.len(),
            duplicates,
        }))
    }
}
