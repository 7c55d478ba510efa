use anyhow::{anyhow, Error};
use slog::{info, warn, Logger};
use std::sync::Arc;
use std::time::Duration;
use time::Date;

use crate::{
    log_response, query_range, read_existing_keys, run_locations, AppendPlanner,
    ExistingKeyScheme, HistoryConverter, HistoryWindow, Location, PartitionLayout,
    PartitionStorage, RunEvent, RunSummary, Schema, TimestampNormalizer, WeatherSource,
    WriteOutcome,
};

pub struct HistoryService {
    pub source: Arc<dyn WeatherSource>,
    pub storage: Arc<dyn PartitionStorage>,
    pub logger: Logger,
    layout: PartitionLayout,
    normalizer: TimestampNormalizer,
    converter: HistoryConverter,
    planner: AppendPlanner,
}

impl HistoryService {
    pub fn new(
        logger: Logger,
        source: Arc<dyn WeatherSource>,
        storage: Arc<dyn PartitionStorage>,
        layout: PartitionLayout,
        normalizer: TimestampNormalizer,
    ) -> Self {
        HistoryService {
            converter: HistoryConverter::new(normalizer.clone(), logger.clone()),
            planner: AppendPlanner::new(storage.clone(), Schema::History, logger.clone()),
            source,
            storage,
            logger,
            layout,
            normalizer,
        }
    }

    /// Ingest the day before `event.date` for every location.
    pub async fn run(&self, event: &RunEvent, delay: Duration) -> RunSummary {
        info!(
            self.logger,
            "starting history run for target date {} ({} locations)",
            event.date,
            event.locations.len()
        );
        run_locations(&event.locations, delay, &self.logger, |location| {
            self.process_location(location, event.date)
        })
        .await
    }

    /// Fetch the query range, keep the previous day and append new rows to
    /// the monthly partition. Returns the number of rows written.
    pub async fn process_location(&self, location: &Location, target: Date) -> Result<usize, Error> {
        let window = HistoryWindow::for_target(target, self.normalizer.offset())
            .ok_or_else(|| anyhow!("no history window before {}", target))?;
        let (start, end) =
            query_range(target).ok_or_else(|| anyhow!("no query range before {}", target))?;

        info!(
            self.logger,
            "requesting history {} .. {} for point={}, keeping {}",
            start,
            end,
            location.point,
            window.day()
        );
        let response = self
            .source
            .hourly_history(location.lat, location.lon, start, end)
            .await?;
        log_response(&self.logger, location, &response);
        if response.records().is_empty() {
            return Ok(0);
        }

        let records = self.converter.window_records(&response, &window);
        if records.is_empty() {
            warn!(
                self.logger,
                "no records for point={} within {}",
                location.point,
                window.day()
            );
            return Ok(0);
        }

        let key = self.converter.partition_month(records.first().copied());
        let path = self.layout.path(&location.point, &key);
        let scheme = ExistingKeyScheme::History {
            lat: location.lat,
            lon: location.lon,
        };
        let mut known =
            read_existing_keys(self.storage.as_ref(), &path, scheme, &self.logger).await?;

        let Some(batch) = self.converter.convert(
            key,
            &records,
            &response.metadata(),
            location,
            &mut known,
        )?
        else {
            info!(self.logger, "no new records for {}", self.storage.describe(&path));
            return Ok(0);
        };

        let outcome = self.planner.plan_and_write(&path, &batch.bytes).await?;
        info!(
            self.logger,
            "wrote {} rows for {} ({} duplicates skipped)",
            batch.rows,
            batch.key,
            batch.duplicates
        );
        Ok(match outcome {
            WriteOutcome::Skipped => 0,
            WriteOutcome::Created | WriteOutcome::Appended => batch.rows,
        })
    }
}
