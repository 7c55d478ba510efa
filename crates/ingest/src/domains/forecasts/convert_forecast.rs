use slog::{debug, info, warn, Logger};
use std::collections::BTreeMap;
use time::Date;

use crate::{
    encode_rows, forecast_keys, sort_chronologically, ApiResponse, EncodingError, Flattener,
    KnownKeys, Location, PartitionBatch, PartitionKey, RawRecord, Schema, SourceMetadata,
    TimestampKind, TimestampNormalizer,
};

/// Group records by the local calendar date of `timestamp_local`. Records
/// without a usable local timestamp are dropped with a warning.
pub fn partition_by_day<'r>(
    normalizer: &TimestampNormalizer,
    records: &'r [RawRecord],
    logger: &Logger,
) -> BTreeMap<Date, Vec<&'r RawRecord>> {
    let mut days: BTreeMap<Date, Vec<&'r RawRecord>> = BTreeMap::new();
    for record in records {
        let Some(raw) = record.timestamp_local() else {
            warn!(logger, "record has no timestamp_local, skipping: {:?}", record.ts);
            continue;
        };
        let Some(day) = normalizer.calendar_date(raw) else {
            continue;
        };
        days.entry(day).or_default().push(record);
    }
    days
}

/// Turns a forecast response into one encoded batch per local day.
pub struct ForecastConverter {
    normalizer: TimestampNormalizer,
    flattener: Flattener,
    logger: Logger,
}

impl ForecastConverter {
    pub fn new(normalizer: TimestampNormalizer, logger: Logger) -> Self {
        Self {
            flattener: Flattener::new(Schema::Forecast, normalizer.clone()),
            normalizer,
            logger,
        }
    }

    pub fn partition<'r>(&self, response: &'r ApiResponse) -> BTreeMap<Date, Vec<&'r RawRecord>> {
        partition_by_day(&self.normalizer, response.records(), &self.logger)
    }

    /// Sort, deduplicate against `known`, flatten and encode the records of
    /// one day. Accepted keys are added to `known`. `None` when every record
    /// was already present.
    pub fn convert_day(
        &self,
        day: Date,
        records: Vec<&RawRecord>,
        metadata: &SourceMetadata,
        location: &Location,
        ingestion_id: &str,
        known: &mut KnownKeys,
    ) -> Result<Option<PartitionBatch>, EncodingError> {
        let sorted = sort_chronologically(records, |record| {
            self.normalizer
                .sort_instant(record.timestamp_local(), TimestampKind::Local)
        });

        let mut rows = Vec::with_capacity(sorted.len());
        let mut duplicates = 0;
        for record in sorted {
            let keys = forecast_keys(
                &self.normalizer,
                record,
                location.lat,
                location.lon,
                ingestion_id,
            );
            if known.contains_any(&keys) {
                duplicates += 1;
                continue;
            }
            rows.push(self.flattener.flatten(record, metadata, Some(ingestion_id)));
            known.extend(keys);
        }

        let key = PartitionKey::Day(day);
        if duplicates > 0 {
            info!(self.logger, "skipped {} duplicate records for {}", duplicates, key);
        }
        if rows.is_empty() {
            debug!(self.logger, "no new records for {}", key);
            return Ok(None);
        }

        Ok(Some(PartitionBatch {
            key,
            bytes: encode_rows(&rows)?,
            rows: rows.len(),
            duplicates,
        }))
    }

    /// Convert a whole response with `existing` holding the known keys of
    /// each day's partition. Days missing from `existing` start empty.
    pub fn convert(
        &self,
        response: &ApiResponse,
        location: &Location,
        ingestion_id: &str,
        existing: &mut BTreeMap<Date, KnownKeys>,
    ) -> Result<Vec<PartitionBatch>, EncodingError> {
        if response.records().is_empty() {
            warn!(self.logger, "no data found in forecast response");
            return Ok(Vec::new());
        }

        let metadata = response.metadata();
        let mut batches = Vec::new();
        for (day, records) in self.partition(response) {
            let known = existing.entry(day).or_default();
            if let Some(batch) =
                self.convert_day(day, records, &metadata, location, ingestion_id, known)?
            {
                batches.push(batch);
            }
        }
        Ok(batches)
    }
}
