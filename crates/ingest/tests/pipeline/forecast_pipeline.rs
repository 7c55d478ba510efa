use crate::helpers::{
    data_lines, hours_from, location, normalizer, response, test_logger, MockSource, TestStorage,
    PREFIX,
};
use ingest::{
    ClientError, ForecastService, PartitionLayout, RunEvent, RunSummary, FORECAST_COLUMNS,
};
use std::{sync::Arc, time::Duration};
use time::macros::{date, datetime};

const RUN: &str = "2024-03-01T06:00:00+09:00";
const DAY_ONE: &str = "weather-data/tokyo/2024/03/wbfc_20240301.csv";
const DAY_TWO: &str = "weather-data/tokyo/2024/03/wbfc_20240302.csv";

fn service(source: MockSource, storage: &TestStorage) -> ForecastService {
    ForecastService::new(
        test_logger(),
        Arc::new(source),
        storage.storage.clone(),
        PartitionLayout::new(PREFIX),
        normalizer(),
        72,
    )
}

/// 22:00 on 2024-03-01 through 01:00 on 2024-03-02, local time.
fn four_hours() -> ingest::ApiResponse {
    response("Tokyo", hours_from(datetime!(2024-03-01 22:00), 4))
}

#[tokio::test]
async fn writes_one_file_per_local_day() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_forecast()
        .withf(|lat, lon, hours| *lat == 35.6895 && *lon == 139.6917 && *hours == 72)
        .times(1)
        .returning(|_, _, _| Ok(four_hours()));

    let rows = service(source, &storage)
        .process_location(&location("tokyo", 35.6895, 139.6917), RUN)
        .await
        .unwrap();
    assert_eq!(rows, 4);

    let first = storage.read_text(DAY_ONE);
    assert!(first.starts_with(&format!("{}\n", FORECAST_COLUMNS.join(","))));
    assert_eq!(data_lines(&first).len(), 2);

    let second = storage.read_text(DAY_TWO);
    let lines = data_lines(&second);
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(&format!("{},Tokyo,JP,", RUN)));
    assert!(lines[0].contains(",2024-03-02T00:00:00+09:00,"));
    assert!(lines[1].contains(",2024-03-02T01:00:00+09:00,"));
}

#[tokio::test]
async fn replaying_the_same_run_adds_nothing() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_forecast()
        .times(2)
        .returning(|_, _, _| Ok(four_hours()));
    let service = service(source, &storage);
    let tokyo = location("tokyo", 35.6895, 139.6917);

    assert_eq!(service.process_location(&tokyo, RUN).await.unwrap(), 4);
    let before = storage.read_bytes(DAY_ONE);

    assert_eq!(service.process_location(&tokyo, RUN).await.unwrap(), 0);
    assert_eq!(storage.read_bytes(DAY_ONE), before);
}

#[tokio::test]
async fn header_is_written_once_across_runs() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_forecast()
        .times(3)
        .returning(|_, _, _| Ok(four_hours()));
    let service = service(source, &storage);
    let tokyo = location("tokyo", 35.6895, 139.6917);

    for run in [
        "2024-03-01T06:00:00+09:00",
        "2024-03-01T12:00:00+09:00",
        "2024-03-01T18:00:00+09:00",
    ] {
        assert_eq!(service.process_location(&tokyo, run).await.unwrap(), 4);
    }

    let text = storage.read_text(DAY_ONE);
    let header = FORECAST_COLUMNS.join(",");
    assert_eq!(text.matches(header.as_str()).count(), 1);
    assert!(text.starts_with(header.as_str()));
    assert_eq!(data_lines(&text).len(), 6);
}

#[tokio::test]
async fn stored_run_suppresses_other_coordinates() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_forecast()
        .times(2)
        .returning(|_, _, _| Ok(four_hours()));
    let service = service(source, &storage);

    let written = service
        .process_location(&location("tokyo", 35.6895, 139.6917), RUN)
        .await
        .unwrap();
    assert_eq!(written, 4);

    // same point directory, coordinates written differently
    let written = service
        .process_location(&location("tokyo", 35.69, 139.69), RUN)
        .await
        .unwrap();
    assert_eq!(written, 0);
}

#[tokio::test]
async fn shift_jis_text_is_stored_and_read_back() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_forecast()
        .times(2)
        .returning(|_, _, _| Ok(response("東京", hours_from(datetime!(2024-03-01 10:00), 2))));
    let service = service(source, &storage);
    let tokyo = location("tokyo", 35.6895, 139.6917);

    assert_eq!(service.process_location(&tokyo, RUN).await.unwrap(), 2);
    assert!(storage.read_text(DAY_ONE).contains(",東京,JP,"));
    assert_eq!(service.process_location(&tokyo, RUN).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_response_writes_nothing() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_forecast()
        .returning(|_, _, _| Ok(response("Tokyo", Vec::new())));

    let rows = service(source, &storage)
        .process_location(&location("tokyo", 35.6895, 139.6917), RUN)
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert!(!storage.exists(DAY_ONE));
}

#[tokio::test]
async fn failed_location_is_counted_and_skipped() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_forecast()
        .withf(|lat, _, _| *lat == 0.0)
        .returning(|_, _, _| {
            Err(ClientError::Request {
                url: "http://localhost/forecast/hourly".to_string(),
                message: "connection refused".to_string(),
            })
        });
    source
        .expect_hourly_forecast()
        .withf(|lat, _, _| *lat != 0.0)
        .returning(|_, _, _| Ok(four_hours()));

    let event = RunEvent {
        locations: vec![
            location("nowhere", 0.0, 0.0),
            location("tokyo", 35.6895, 139.6917),
        ],
        date: date!(2024 - 03 - 02),
    };
    let summary = service(source, &storage)
        .run(&event, Duration::ZERO)
        .await;

    assert_eq!(
        summary,
        RunSummary {
            locations_processed: 1,
            locations_failed: 1,
            rows_written: 4,
        }
    );
    assert!(!storage.exists("weather-data/nowhere/2024/03/wbfc_20240301.csv"));
}
