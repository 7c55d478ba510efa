use anyhow::Error;
use slog::{info, Logger};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    log_response, read_existing_keys, run_locations, AppendPlanner, ExistingKeyScheme,
    ForecastConverter, Location, PartitionKey, PartitionLayout, PartitionStorage, RunEvent,
    RunSummary, Schema, TimestampNormalizer, WeatherSource, WriteOutcome,
};

pub struct ForecastService {
    pub source: Arc<dyn WeatherSource>,
    pub storage: Arc<dyn PartitionStorage>,
    pub logger: Logger,
    layout: PartitionLayout,
    normalizer: TimestampNormalizer,
    converter: ForecastConverter,
    planner: AppendPlanner,
    hours: u16,
}

impl ForecastService {
    pub fn new(
        logger: Logger,
        source: Arc<dyn WeatherSource>,
        storage: Arc<dyn PartitionStorage>,
        layout: PartitionLayout,
        normalizer: TimestampNormalizer,
        hours: u16,
    ) -> Self {
        ForecastService {
            converter: ForecastConverter::new(normalizer.clone(), logger.clone()),
            planner: AppendPlanner::new(storage.clone(), Schema::Forecast, logger.clone()),
            source,
            storage,
            logger,
            layout,
            normalizer,
            hours,
        }
    }

    /// Ingest every location of `event` under one acquisition timestamp.
    pub async fn run(&self, event: &RunEvent, delay: Duration) -> RunSummary {
        let ingestion_id = self.normalizer.ingestion_id(self.normalizer.now());
        info!(
            self.logger,
            "starting forecast run {} for {} locations",
            ingestion_id,
            event.locations.len()
        );
        run_locations(&event.locations, delay, &self.logger, |location| {
            self.process_location(location, &ingestion_id)
        })
        .await
    }

    /// Fetch, split per day and append new rows for one location. Returns
    /// the number of rows written.
    pub async fn process_location(
        &self,
        location: &Location,
        ingestion_id: &str,
    ) -> Result<usize, Error> {
        let response = self
            .source
            .hourly_forecast(location.lat, location.lon, self.hours)
            .await?;
        log_response(&self.logger, location, &response);
        if response.records().is_empty() {
            return Ok(0);
        }

        let metadata = response.metadata();
        let mut written = 0;
        for (day, records) in self.converter.partition(&response) {
            let path = self.layout.path(&location.point, &PartitionKey::Day(day));
            let mut known = read_existing_keys(
                self.storage.as_ref(),
                &path,
                ExistingKeyScheme::Forecast,
                &self.logger,
            )
            .await?;

            let Some(batch) = self.converter.convert_day(
                day,
                records,
                &metadata,
                location,
                ingestion_id,
                &mut known,
            )?
            else {
                info!(self.logger, "no new records for {}", self.storage.describe(&path));
                continue;
            };

            if self.planner.plan_and_write(&path, &batch.bytes).await? != WriteOutcome::Skipped {
                written += batch.rows;
            }
            info!(
                self.logger,
                "wrote {} rows for {} ({} duplicates skipped)",
                batch.rows,
                batch.key,
                batch.duplicates
            );
        }
        Ok(written)
    }
}
