use serde::Deserialize;
use serde_json::Number;
use std::fmt;

/// A scalar reading as the API sent it. Rendering follows the text the
/// stored CSV files already contain, e.g. `1013.0`, `7`, `True`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(Number),
    Text(String),
    Bool(bool),
}

impl FieldValue {
    /// Whole epoch seconds. Zero counts as absent.
    pub fn epoch_seconds(&self) -> Option<i64> {
        let seconds = match self {
            FieldValue::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value.floor() as i64)),
            FieldValue::Text(text) => text.trim().parse::<f64>().ok().map(|v| v.floor() as i64),
            FieldValue::Bool(_) => None,
        }?;
        (seconds != 0).then_some(seconds)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(number) => match number.as_f64().filter(|_| number.is_f64()) {
                Some(value) => f.write_str(&float_text(value)),
                None => write!(f, "{}", number),
            },
            FieldValue::Text(text) => write!(f, "{}", text),
            FieldValue::Bool(true) => write!(f, "True"),
            FieldValue::Bool(false) => write!(f, "False"),
        }
    }
}

/// Float text as the stored files carry it: positional notation for
/// exponents -4 through 15, otherwise `1e-05` / `1.5e+16` with a signed
/// exponent of at least two digits.
fn float_text(value: f64) -> String {
    let scientific = format!("{:e}", value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    if (-4..16).contains(&exponent) {
        return Number::from_f64(value).map_or(scientific, |number| number.to_string());
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}e{}{:02}", mantissa, sign, exponent.abs())
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeatherDescriptor {
    pub code: Option<FieldValue>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// One hourly element of `data`. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    pub datetime: Option<FieldValue>,
    pub timestamp_utc: Option<String>,
    pub timestamp_local: Option<String>,
    pub ts: Option<FieldValue>,
    pub temp: Option<FieldValue>,
    pub app_temp: Option<FieldValue>,
    pub rh: Option<FieldValue>,
    pub dewpt: Option<FieldValue>,
    pub pres: Option<FieldValue>,
    pub slp: Option<FieldValue>,
    pub clouds: Option<FieldValue>,
    pub vis: Option<FieldValue>,
    pub wind_spd: Option<FieldValue>,
    pub wind_dir: Option<FieldValue>,
    pub wind_gust_spd: Option<FieldValue>,
    pub precip: Option<FieldValue>,
    pub snow: Option<FieldValue>,
    pub uv: Option<FieldValue>,
    pub solar_rad: Option<FieldValue>,
    pub ghi: Option<FieldValue>,
    pub dni: Option<FieldValue>,
    pub dhi: Option<FieldValue>,
    pub pod: Option<FieldValue>,
    pub weather: Option<WeatherDescriptor>,
}

impl RawRecord {
    pub fn timestamp_local(&self) -> Option<&str> {
        self.timestamp_local.as_deref().filter(|raw| !raw.is_empty())
    }

    pub fn timestamp_utc(&self) -> Option<&str> {
        self.timestamp_utc.as_deref().filter(|raw| !raw.is_empty())
    }

    pub fn epoch_seconds(&self) -> Option<i64> {
        self.ts.as_ref().and_then(FieldValue::epoch_seconds)
    }

    /// Numeric readings in column order, `temp` through `dhi`.
    pub fn readings(&self) -> [&Option<FieldValue>; 18] {
        [
            &self.temp,
            &self.app_temp,
            &self.rh,
            &self.dewpt,
            &self.pres,
            &self.slp,
            &self.clouds,
            &self.vis,
            &self.wind_spd,
            &self.wind_dir,
            &self.wind_gust_spd,
            &self.precip,
            &self.snow,
            &self.uv,
            &self.solar_rad,
            &self.ghi,
            &self.dni,
            &self.dhi,
        ]
    }
}

/// Top level of a forecast or history response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    pub data: Option<Vec<RawRecord>>,
    pub city_name: Option<String>,
    pub country_code: Option<String>,
    pub timezone: Option<String>,
}

/// Location metadata copied onto every flattened row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMetadata {
    pub city_name: String,
    pub country_code: String,
}

impl ApiResponse {
    pub fn records(&self) -> &[RawRecord] {
        self.data.as_deref().unwrap_or_default()
    }

    pub fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            city_name: self.city_name.clone().unwrap_or_default(),
            country_code: self.country_code.clone().unwrap_or_default(),
        }
    }

    /// First and last timestamps in API order, local preferred.
    pub fn span(&self) -> Option<(&str, &str)> {
        fn stamp(record: &RawRecord) -> &str {
            record
                .timestamp_local()
                .or_else(|| record.timestamp_utc())
                .unwrap_or("")
        }
        let records = self.records();
        Some((stamp(records.first()?), stamp(records.last()?)))
    }
}
