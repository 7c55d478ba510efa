use serde::Deserialize;
use thiserror::Error;
use time::{macros::format_description, Date};

use crate::{FieldValue, TimestampNormalizer};

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event must contain a 'locations' array")]
    MissingLocations,
    #[error("'locations' array must contain at least one location")]
    EmptyLocations,
    #[error("location at index {0} must have numeric 'lat' and 'lon'")]
    InvalidCoordinates(usize),
    #[error("location at index {0} must have a 'point'")]
    MissingPoint(usize),
    #[error("invalid 'date' value '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// A point to ingest. `point` names its directory under the prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub point: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunEvent {
    pub locations: Vec<Location>,
    /// History target date; today in the reference offset when absent.
    pub date: Date,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    locations: Option<Vec<RawLocation>>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLocation {
    lat: Option<FieldValue>,
    lon: Option<FieldValue>,
    point: Option<FieldValue>,
}

impl RawLocation {
    fn validate(self, index: usize) -> Result<Location, EventError> {
        let (Some(lat), Some(lon)) = (coordinate(self.lat), coordinate(self.lon)) else {
            return Err(EventError::InvalidCoordinates(index));
        };
        let point = match self.point {
            Some(FieldValue::Text(text)) if !text.is_empty() => text,
            Some(number @ FieldValue::Number(_)) => number.to_string(),
            _ => return Err(EventError::MissingPoint(index)),
        };
        Ok(Location { lat, lon, point })
    }
}

fn coordinate(value: Option<FieldValue>) -> Option<f64> {
    match value? {
        FieldValue::Number(number) => number.as_f64(),
        FieldValue::Text(text) => text.trim().parse().ok(),
        FieldValue::Bool(_) => None,
    }
}

/// Parse and validate the JSON run event:
///
/// ```json
/// {"locations": [{"lat": 35.6895, "lon": "139.6917", "point": "tokyo"}], "date": "2024-03-02"}
/// ```
pub fn parse_event(text: &str, normalizer: &TimestampNormalizer) -> Result<RunEvent, EventError> {
    let event: RawEvent = serde_json::from_str(text)?;

    let entries = event.locations.ok_or(EventError::MissingLocations)?;
    if entries.is_empty() {
        return Err(EventError::EmptyLocations);
    }
    let locations = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.validate(index))
        .collect::<Result<Vec<_>, _>>()?;

    let date = match event.date.as_deref() {
        Some(raw) if !raw.is_empty() => Date::parse(raw, format_description!("[year]-[month]-[day]"))
            .map_err(|_| EventError::InvalidDate(raw.to_string()))?,
        _ => normalizer.today(),
    };

    Ok(RunEvent { locations, date })
}
