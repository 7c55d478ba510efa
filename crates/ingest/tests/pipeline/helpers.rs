use async_trait::async_trait;
use ingest::{
    decode_shift_jis, ApiResponse, ClientError, LocalStorage, Location, TimestampNormalizer,
    WeatherSource,
};
use mockall::mock;
use serde_json::{json, Value};
use slog::{o, Discard, Logger};
use std::sync::Arc;
use tempfile::TempDir;
use time::{
    macros::{format_description, offset},
    Date, Duration, PrimitiveDateTime,
};

mock! {
    pub Source {}
    #[async_trait]
    impl WeatherSource for Source {
        async fn hourly_forecast(
            &self,
            lat: f64,
            lon: f64,
            hours: u16,
        ) -> Result<ApiResponse, ClientError>;

        async fn hourly_history(
            &self,
            lat: f64,
            lon: f64,
            start: Date,
            end: Date,
        ) -> Result<ApiResponse, ClientError>;
    }
}

pub const PREFIX: &str = "weather-data";

pub fn test_logger() -> Logger {
    Logger::root(Discard, o!())
}

pub fn normalizer() -> TimestampNormalizer {
    TimestampNormalizer::new(offset!(+9), test_logger())
}

pub fn location(point: &str, lat: f64, lon: f64) -> Location {
    Location {
        lat,
        lon,
        point: point.to_string(),
    }
}

pub struct TestStorage {
    pub dir: TempDir,
    pub storage: Arc<LocalStorage>,
}

impl TestStorage {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path(), test_logger()));
        Self { dir, storage }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.dir.path().join(path).is_file()
    }

    /// Decoded content of a partition file.
    pub fn read_text(&self, path: &str) -> String {
        let bytes = std::fs::read(self.dir.path().join(path)).unwrap();
        decode_shift_jis(&bytes).unwrap()
    }

    pub fn read_bytes(&self, path: &str) -> Vec<u8> {
        std::fs::read(self.dir.path().join(path)).unwrap()
    }
}

pub fn response(city: &str, data: Vec<Value>) -> ApiResponse {
    serde_json::from_value(json!({
        "city_name": city,
        "country_code": "JP",
        "timezone": "Asia/Tokyo",
        "data": data,
    }))
    .unwrap()
}

/// One hourly record with both timestamps, `utc` derived from `local` (+09:00).
pub fn hourly(local: PrimitiveDateTime, temp: f64) -> Value {
    let layout = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let utc = local - Duration::hours(9);
    json!({
        "timestamp_local": local.format(layout).unwrap(),
        "timestamp_utc": utc.format(layout).unwrap(),
        "ts": utc.assume_utc().unix_timestamp(),
        "temp": temp,
        "rh": 55,
        "pod": "d",
        "weather": {"code": 801, "description": "Few clouds", "icon": "c02d"}
    })
}

/// `count` consecutive hours starting at `start`.
pub fn hours_from(start: PrimitiveDateTime, count: i64) -> Vec<Value> {
    (0..count)
        .map(|hour| hourly(start + Duration::hours(hour), 10.0 + hour as f64 / 10.0))
        .collect()
}

/// Data lines of a partition file, header excluded.
pub fn data_lines(text: &str) -> Vec<&str> {
    text.split("\r\n")
        .flat_map(|chunk| chunk.split('\n'))
        .skip(1)
        .filter(|line| !line.is_empty())
        .collect()
}
