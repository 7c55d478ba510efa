use anyhow::Context;
use ingest::{
    build_storage, get_config_info, parse_event, setup_logger, ForecastService, HistoryService,
    PartitionLayout, Pipeline, TimestampNormalizer, WeatherbitClient,
};
use slog::{error, info};
use std::{fs, sync::Arc};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let cli = get_config_info()?;
    let logger = setup_logger(&cli);

    info!(logger, "Weatherbit ingest starting...");
    info!(logger, "  Pipeline: {:?}", cli.pipeline());
    info!(logger, "  Storage: {:?}", cli.storage());
    info!(logger, "  Prefix: {}", cli.prefix());
    info!(logger, "  Event: {}", cli.event());

    let result = run(&cli, &logger).await;
    if let Err(err) = &result {
        error!(logger, "run failed: {:#}", err);
    }
    // flush the async drain before exiting
    drop(logger);
    result
}

async fn run(cli: &ingest::Cli, logger: &slog::Logger) -> Result<(), anyhow::Error> {
    let normalizer = TimestampNormalizer::new(cli.reference_offset()?, logger.clone());

    let event_path = cli.event();
    let content = fs::read_to_string(&event_path)
        .with_context(|| format!("failed to read event file {}", event_path))?;
    let mut event = parse_event(&content, &normalizer)?;
    if let Some(date) = cli.date()? {
        event.date = date;
    }

    let source = Arc::new(WeatherbitClient::new(cli.client_settings()?, logger.clone())?);
    let storage = build_storage(cli, logger).await?;
    let layout = PartitionLayout::new(&cli.prefix());

    let summary = match cli.pipeline() {
        Pipeline::Forecast => {
            ForecastService::new(
                logger.clone(),
                source,
                storage,
                layout,
                normalizer,
                cli.forecast_hours(),
            )
            .run(&event, cli.request_delay())
            .await
        }
        Pipeline::History => {
            HistoryService::new(logger.clone(), source, storage, layout, normalizer)
                .run(&event, cli.request_delay())
                .await
        }
    };

    info!(
        logger,
        "run finished: {} processed, {} failed, {} rows written",
        summary.locations_processed,
        summary.locations_failed,
        summary.rows_written
    );
    println!("{}", serde_json::to_string(&summary)?);
    Ok(())
}
