use serde::Serialize;
use slog::{debug, error, info, warn, Logger};
use std::future::Future;
use std::time::Duration;

use crate::{ApiResponse, Location};

/// Printed as JSON on stdout when a run finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub locations_processed: usize,
    pub locations_failed: usize,
    pub rows_written: usize,
}

/// Run `handler` for each location in order. A failing location is logged
/// and counted, then the run moves on. `delay` is slept between locations.
pub async fn run_locations<'a, F, Fut>(
    locations: &'a [Location],
    delay: Duration,
    logger: &Logger,
    mut handler: F,
) -> RunSummary
where
    F: FnMut(&'a Location) -> Fut,
    Fut: Future<Output = Result<usize, anyhow::Error>>,
{
    let mut summary = RunSummary::default();

    for (index, location) in locations.iter().enumerate() {
        info!(
            logger,
            "processing location {}/{}: point={} lat={} lon={}",
            index + 1,
            locations.len(),
            location.point,
            location.lat,
            location.lon
        );

        match handler(location).await {
            Ok(rows) => {
                summary.locations_processed += 1;
                summary.rows_written += rows;
            }
            Err(err) => {
                error!(
                    logger,
                    "error processing location point={} lat={} lon={}: {:#}",
                    location.point,
                    location.lat,
                    location.lon,
                    err
                );
                summary.locations_failed += 1;
            }
        }

        if index + 1 < locations.len() && !delay.is_zero() {
            debug!(logger, "waiting {:?} before next location", delay);
            tokio::time::sleep(delay).await;
        }
    }

    summary
}

/// Log how many records came back and the range they cover.
pub fn log_response(logger: &Logger, location: &Location, response: &ApiResponse) {
    match response.span() {
        Some((first, last)) => info!(
            logger,
            "retrieved {} records for point={} ({} .. {})",
            response.records().len(),
            location.point,
            first,
            last
        ),
        None => warn!(logger, "no data found for point={}", location.point),
    }
}
