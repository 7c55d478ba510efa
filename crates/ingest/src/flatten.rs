use std::fmt;

use crate::{FieldValue, RawRecord, SourceMetadata, TimestampKind, TimestampNormalizer};

pub const HISTORY_COLUMNS: [&str; 28] = [
    "city_name",
    "country_code",
    "datetime",
    "timestamp_utc",
    "timestamp_local",
    "ts",
    "temp",
    "app_temp",
    "rh",
    "dewpt",
    "pres",
    "slp",
    "clouds",
    "vis",
    "wind_spd",
    "wind_dir",
    "wind_gust_spd",
    "precip",
    "snow",
    "uv",
    "solar_rad",
    "ghi",
    "dni",
    "dhi",
    "pod",
    "weather_code",
    "weather_description",
    "weather_icon",
];

pub const FORECAST_COLUMNS: [&str; 29] = [
    "acquisition_date",
    "city_name",
    "country_code",
    "datetime",
    "timestamp_utc",
    "timestamp_local",
    "ts",
    "temp",
    "app_temp",
    "rh",
    "dewpt",
    "pres",
    "slp",
    "clouds",
    "vis",
    "wind_spd",
    "wind_dir",
    "wind_gust_spd",
    "precip",
    "snow",
    "uv",
    "solar_rad",
    "ghi",
    "dni",
    "dhi",
    "pod",
    "weather_code",
    "weather_description",
    "weather_icon",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Forecast,
    History,
}

impl Schema {
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Schema::Forecast => &FORECAST_COLUMNS,
            Schema::History => &HISTORY_COLUMNS,
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Forecast => write!(f, "forecast"),
            Schema::History => write!(f, "history"),
        }
    }
}

/// One output row, values aligned with [`Schema::columns`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    schema: Schema,
    values: Vec<String>,
}

impl FlatRow {
    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        let index = self.schema.columns().iter().position(|c| *c == column)?;
        self.values.get(index).map(String::as_str)
    }
}

pub struct Flattener {
    schema: Schema,
    normalizer: TimestampNormalizer,
}

impl Flattener {
    pub fn new(schema: Schema, normalizer: TimestampNormalizer) -> Self {
        Self { schema, normalizer }
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    /// Build the row for `record`. Coordinates are not part of the row; they
    /// only take part in key derivation.
    pub fn flatten(
        &self,
        record: &RawRecord,
        metadata: &SourceMetadata,
        ingestion_id: Option<&str>,
    ) -> FlatRow {
        let mut values = Vec::with_capacity(self.schema.columns().len());

        if self.schema == Schema::Forecast {
            values.push(ingestion_id.unwrap_or_default().to_string());
        }
        values.push(metadata.city_name.clone());
        values.push(metadata.country_code.clone());
        values.push(render(&record.datetime));
        values.push(
            self.normalizer
                .format(record.timestamp_utc.as_deref(), TimestampKind::Utc),
        );
        values.push(
            self.normalizer
                .format(record.timestamp_local.as_deref(), TimestampKind::Local),
        );
        values.push(render(&record.ts));
        values.extend(record.readings().into_iter().map(render));
        values.push(render(&record.pod));

        match &record.weather {
            Some(weather) => {
                values.push(render(&weather.code));
                values.push(weather.description.clone().unwrap_or_default());
                values.push(weather.icon.clone().unwrap_or_default());
            }
            None => values.extend(std::iter::repeat(String::new()).take(3)),
        }

        debug_assert_eq!(values.len(), self.schema.columns().len());
        FlatRow {
            schema: self.schema,
            values,
        }
    }
}

fn render(value: &Option<FieldValue>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}
