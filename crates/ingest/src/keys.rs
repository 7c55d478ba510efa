use std::collections::HashSet;

use crate::{RawRecord, TimestampKind, TimestampNormalizer};

/// Coordinates render the way they were first written into stored keys:
/// shortest round-trip form with at least one decimal, e.g. `139.0`.
pub fn format_coordinate(value: f64) -> String {
    format!("{:?}", value)
}

/// Canonical local timestamp used inside forecast keys. Falls back to the
/// raw text when it cannot be parsed and to `""` when missing.
pub fn key_timestamp(
    normalizer: &TimestampNormalizer,
    raw: Option<&str>,
    kind: TimestampKind,
) -> String {
    match raw.filter(|raw| !raw.is_empty()) {
        Some(raw) => normalizer
            .try_format(raw, kind)
            .unwrap_or_else(|_| raw.to_string()),
        None => String::new(),
    }
}

/// `{acquisition}_{local}_{lat}_{lon}`
pub fn full_key(
    normalizer: &TimestampNormalizer,
    record: &RawRecord,
    lat: f64,
    lon: f64,
    ingestion_id: &str,
) -> String {
    let local = key_timestamp(normalizer, record.timestamp_local(), TimestampKind::Local);
    compose_full(ingestion_id, &local, lat, lon)
}

/// `{acquisition}_{local}`, the form recoverable from a stored forecast row.
pub fn simplified_key(
    normalizer: &TimestampNormalizer,
    record: &RawRecord,
    ingestion_id: &str,
) -> String {
    let local = key_timestamp(normalizer, record.timestamp_local(), TimestampKind::Local);
    compose_simplified(ingestion_id, &local)
}

/// `{utc}_{lat}_{lon}`
pub fn history_key(normalizer: &TimestampNormalizer, record: &RawRecord, lat: f64, lon: f64) -> String {
    let utc = key_timestamp(normalizer, record.timestamp_utc(), TimestampKind::Utc);
    compose_history(&utc, lat, lon)
}

/// Both forecast key forms from a single timestamp parse.
pub fn forecast_keys(
    normalizer: &TimestampNormalizer,
    record: &RawRecord,
    lat: f64,
    lon: f64,
    ingestion_id: &str,
) -> [String; 2] {
    let local = key_timestamp(normalizer, record.timestamp_local(), TimestampKind::Local);
    [
        compose_full(ingestion_id, &local, lat, lon),
        compose_simplified(ingestion_id, &local),
    ]
}

fn compose_full(ingestion_id: &str, local: &str, lat: f64, lon: f64) -> String {
    format!(
        "{}_{}_{}_{}",
        ingestion_id,
        local,
        format_coordinate(lat),
        format_coordinate(lon)
    )
}

fn compose_simplified(ingestion_id: &str, local: &str) -> String {
    format!("{}_{}", ingestion_id, local)
}

fn compose_history(utc: &str, lat: f64, lon: f64) -> String {
    format!("{}_{}_{}", utc, format_coordinate(lat), format_coordinate(lon))
}

/// Keys already present in one partition, in any of the forms above.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnownKeys(HashSet<String>);

impl KnownKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    pub fn contains_any<S: AsRef<str>>(&self, keys: &[S]) -> bool {
        keys.iter().any(|key| self.contains(key.as_ref()))
    }

    pub fn insert(&mut self, key: String) -> bool {
        self.0.insert(key)
    }

    pub fn extend<I: IntoIterator<Item = String>>(&mut self, keys: I) {
        self.0.extend(keys)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<String> for KnownKeys {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// How to rebuild keys from rows already stored in a partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExistingKeyScheme {
    /// `acquisition_date` + `timestamp_local`; coordinates are not stored
    /// so only the simplified key can be recovered.
    Forecast,
    /// `timestamp_utc` plus the coordinates of the point the file belongs to.
    History { lat: f64, lon: f64 },
}

impl ExistingKeyScheme {
    fn columns(&self) -> &'static [&'static str] {
        match self {
            ExistingKeyScheme::Forecast => &["acquisition_date", "timestamp_local"],
            ExistingKeyScheme::History { .. } => &["timestamp_utc"],
        }
    }

    fn compose(&self, values: &[&str]) -> Option<String> {
        if values.iter().any(|value| value.is_empty()) {
            return None;
        }
        match (self, values) {
            (ExistingKeyScheme::Forecast, [acquisition, local]) => {
                Some(compose_simplified(acquisition, local))
            }
            (ExistingKeyScheme::History { lat, lon }, [utc]) => {
                Some(compose_history(utc, *lat, *lon))
            }
            _ => None,
        }
    }
}

/// Rebuild keys from decoded CSV text that starts with a header row.
/// Rows missing any key column are ignored.
pub fn existing_keys_from_csv(text: &str, scheme: ExistingKeyScheme) -> Result<KnownKeys, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let positions: Option<Vec<usize>> = scheme
        .columns()
        .iter()
        .map(|column| headers.iter().position(|header| header == *column))
        .collect();
    let Some(positions) = positions else {
        return Ok(KnownKeys::new());
    };

    let mut keys = KnownKeys::new();
    for row in reader.records() {
        let row = row?;
        let values: Vec<&str> = positions
            .iter()
            .map(|index| row.get(*index).unwrap_or(""))
            .collect();
        if let Some(key) = scheme.compose(&values) {
            keys.insert(key);
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slog::{o, Logger};
    use time::macros::offset;

    fn normalizer() -> TimestampNormalizer {
        TimestampNormalizer::new(offset!(+9), Logger::root(slog::Discard, o!()))
    }

    fn record(local: Option<&str>, utc: Option<&str>) -> RawRecord {
        RawRecord {
            timestamp_local: local.map(String::from),
            timestamp_utc: utc.map(String::from),
            ..Default::default()
        }
    }

    const RUN: &str = "2024-03-01T06:00:00+09:00";

    #[test]
    fn coordinates_keep_a_decimal() {
        assert_eq!(format_coordinate(139.0), "139.0");
        assert_eq!(format_coordinate(35.6895), "35.6895");
        assert_eq!(format_coordinate(-0.5), "-0.5");
    }

    #[test]
    fn forecast_key_forms() {
        let n = normalizer();
        let rec = record(Some("2024-03-01T23:30:00"), None);
        assert_eq!(
            full_key(&n, &rec, 35.0, 139.0, RUN),
            "2024-03-01T06:00:00+09:00_2024-03-01T23:30:00+09:00_35.0_139.0"
        );
        assert_eq!(
            simplified_key(&n, &rec, RUN),
            "2024-03-01T06:00:00+09:00_2024-03-01T23:30:00+09:00"
        );
        assert_eq!(
            forecast_keys(&n, &rec, 35.0, 139.0, RUN),
            [full_key(&n, &rec, 35.0, 139.0, RUN), simplified_key(&n, &rec, RUN)]
        );
    }

    #[test]
    fn unparseable_timestamp_stays_raw_in_key() {
        let n = normalizer();
        let rec = record(Some("soon"), None);
        assert_eq!(simplified_key(&n, &rec, RUN), format!("{}_soon", RUN));
        let rec = record(None, None);
        assert_eq!(simplified_key(&n, &rec, RUN), format!("{}_", RUN));
    }

    #[test]
    fn history_key_uses_normalized_utc() {
        let n = normalizer();
        let rec = record(None, Some("2024-03-01T14:00:00"));
        assert_eq!(
            history_key(&n, &rec, 35.6895, 139.6917),
            "2024-03-01T23:00:00+09:00_35.6895_139.6917"
        );
    }

    #[test]
    fn forecast_rows_yield_simplified_keys() {
        let text = "acquisition_date,city_name,timestamp_local\n\
                    2024-03-01T06:00:00+09:00,Tokyo,2024-03-01T23:00:00+09:00\r\n\
                    ,Tokyo,2024-03-01T23:30:00+09:00\r\n";
        let keys = existing_keys_from_csv(text, ExistingKeyScheme::Forecast).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("2024-03-01T06:00:00+09:00_2024-03-01T23:00:00+09:00"));
    }

    #[test]
    fn history_rows_pick_up_partition_coordinates() {
        let text = "city_name,timestamp_utc\nTokyo,2024-03-01T23:00:00+09:00\r\n";
        let scheme = ExistingKeyScheme::History { lat: 35.0, lon: 139.0 };
        let keys = existing_keys_from_csv(text, scheme).unwrap();
        assert!(keys.contains("2024-03-01T23:00:00+09:00_35.0_139.0"));

        let n = normalizer();
        let rec = record(None, Some("2024-03-01T14:00:00Z"));
        assert!(keys.contains(&history_key(&n, &rec, 35.0, 139.0)));
    }

    #[test]
    fn missing_key_columns_give_no_keys() {
        let text = "city_name,temp\nTokyo,7.5\r\n";
        let keys = existing_keys_from_csv(text, ExistingKeyScheme::Forecast).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn contains_any_checks_every_form() {
        let keys: KnownKeys = ["a".to_string()].into_iter().collect();
        assert!(keys.contains_any(&["b", "a"]));
        assert!(!keys.contains_any(&["b", "c"]));
    }
}
