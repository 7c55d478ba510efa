use crate::helpers::{
    data_lines, hours_from, location, normalizer, response, test_logger, MockSource, TestStorage,
    PREFIX,
};
use ingest::{HistoryService, PartitionLayout, RunEvent, HISTORY_COLUMNS};
use std::{sync::Arc, time::Duration};
use time::macros::{date, datetime};

fn service(source: MockSource, storage: &TestStorage) -> HistoryService {
    HistoryService::new(
        test_logger(),
        Arc::new(source),
        storage.storage.clone(),
        PartitionLayout::new(PREFIX),
        normalizer(),
    )
}

/// Every hour from 2024-02-29 00:00 to 2024-03-02 23:00 local time.
fn three_days() -> ingest::ApiResponse {
    response("Tokyo", hours_from(datetime!(2024-02-29 00:00), 72))
}

#[tokio::test]
async fn keeps_only_the_day_before_the_target() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_history()
        .withf(|_, _, start, end| *start == date!(2024 - 02 - 29) && *end == date!(2024 - 03 - 02))
        .times(1)
        .returning(|_, _, _, _| Ok(three_days()));

    let rows = service(source, &storage)
        .process_location(&location("p1", 35.0, 139.0), date!(2024 - 03 - 02))
        .await
        .unwrap();
    assert_eq!(rows, 24);

    // first retained record is 2024-03-01T00:00 local, 2024-02-29T15:00 UTC as
    // written, so the monthly file is February's
    let path = "weather-data/p1/2024/wb_2024_02.csv";
    let text = storage.read_text(path);
    assert!(text.starts_with(&format!("{}\n", HISTORY_COLUMNS.join(","))));

    let lines = data_lines(&text);
    assert_eq!(lines.len(), 24);
    assert!(lines[0].starts_with("Tokyo,JP,,2024-03-01T00:00:00+09:00,2024-03-01T00:00:00+09:00,"));
    assert!(lines[23].contains(",2024-03-01T23:00:00+09:00,"));
    assert!(!text.contains("2024-03-02T00:00:00+09:00"));
}

#[tokio::test]
async fn rerun_for_the_same_day_adds_nothing() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_history()
        .times(2)
        .returning(|_, _, _, _| Ok(three_days()));
    let service = service(source, &storage);
    let p1 = location("p1", 35.0, 139.0);

    assert_eq!(service.process_location(&p1, date!(2024 - 03 - 02)).await.unwrap(), 24);
    assert_eq!(service.process_location(&p1, date!(2024 - 03 - 02)).await.unwrap(), 0);

    let text = storage.read_text("weather-data/p1/2024/wb_2024_02.csv");
    assert_eq!(data_lines(&text).len(), 24);
}

#[tokio::test]
async fn consecutive_days_share_the_monthly_file() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_history()
        .times(2)
        .returning(|_, _, _, _| Ok(three_days()));
    let service = service(source, &storage);
    let p1 = location("p1", 35.0, 139.0);

    // 2024-02-29 window: first record UTC is 2024-02-28T15:00
    assert_eq!(service.process_location(&p1, date!(2024 - 03 - 01)).await.unwrap(), 24);
    // 2024-03-01 window: first record UTC is 2024-02-29T15:00
    assert_eq!(service.process_location(&p1, date!(2024 - 03 - 02)).await.unwrap(), 24);

    let text = storage.read_text("weather-data/p1/2024/wb_2024_02.csv");
    let header = HISTORY_COLUMNS.join(",");
    assert_eq!(text.matches(header.as_str()).count(), 1);
    assert_eq!(data_lines(&text).len(), 48);
}

#[tokio::test]
async fn nothing_in_window_writes_nothing() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_history()
        .returning(|_, _, _, _| Ok(three_days()));

    let rows = service(source, &storage)
        .process_location(&location("p1", 35.0, 139.0), date!(2024 - 04 - 10))
        .await
        .unwrap();
    assert_eq!(rows, 0);
    assert!(!storage.dir.path().join("weather-data").exists());
}

#[tokio::test]
async fn run_uses_the_event_date() {
    let storage = TestStorage::new();
    let mut source = MockSource::new();
    source
        .expect_hourly_history()
        .withf(|_, _, start, end| *start == date!(2024 - 02 - 29) && *end == date!(2024 - 03 - 02))
        .times(2)
        .returning(|_, _, _, _| Ok(three_days()));

    let event = RunEvent {
        locations: vec![location("p1", 35.0, 139.0), location("p2", 34.0, 135.0)],
        date: date!(2024 - 03 - 02),
    };
    let summary = service(source, &storage).run(&event, Duration::ZERO).await;

    assert_eq!(summary.locations_processed, 2);
    assert_eq!(summary.locations_failed, 0);
    assert_eq!(summary.rows_written, 48);
    assert!(storage.exists("weather-data/p2/2024/wb_2024_02.csv"));
}
