use slog::{warn, Logger};
use thiserror::Error;
use time::{
    macros::format_description, Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
};

/// How a timestamp without an explicit offset should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampKind {
    /// Wall-clock time in the reference offset (`timestamp_local`)
    Local,
    /// Wall-clock time in UTC (`timestamp_utc`)
    Utc,
}

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("timestamp is empty")]
    Empty,
    #[error("malformed timestamp '{0}'")]
    Malformed(String),
    #[error("invalid timestamp '{raw}': {source}")]
    Parse {
        raw: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("invalid utc offset '{0}'")]
    Offset(String),
}

/// Turns the timestamp shapes Weatherbit sends into instants in one fixed
/// reference offset.
#[derive(Clone)]
pub struct TimestampNormalizer {
    offset: UtcOffset,
    logger: Logger,
}

impl TimestampNormalizer {
    pub fn new(offset: UtcOffset, logger: Logger) -> Self {
        Self { offset, logger }
    }

    pub fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Parse `raw` and keep whatever offset it carried (or the one implied by
    /// `kind`), without converting to the reference offset.
    pub fn parse_as_written(
        &self,
        raw: &str,
        kind: TimestampKind,
    ) -> Result<OffsetDateTime, TimestampError> {
        if raw.is_empty() {
            return Err(TimestampError::Empty);
        }

        let (wall_clock, offset) = if is_fully_specified(raw) {
            parse_iso(raw)?
        } else {
            let naive = PrimitiveDateTime::parse(
                raw,
                format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
            )
            .map_err(|source| TimestampError::Parse {
                raw: raw.to_string(),
                source,
            })?;
            (naive, None)
        };

        let offset = offset.unwrap_or(match kind {
            TimestampKind::Local => self.offset,
            TimestampKind::Utc => UtcOffset::UTC,
        });
        Ok(wall_clock.assume_offset(offset))
    }

    /// Canonical instant for `raw`, expressed in the reference offset.
    pub fn parse(&self, raw: &str, kind: TimestampKind) -> Result<OffsetDateTime, TimestampError> {
        Ok(self.parse_as_written(raw, kind)?.to_offset(self.offset))
    }

    /// ISO text of the canonical instant without logging on failure.
    pub fn try_format(&self, raw: &str, kind: TimestampKind) -> Result<String, TimestampError> {
        self.parse(raw, kind).map(format_iso)
    }

    /// ISO text of the canonical instant. Empty input stays empty and input
    /// that cannot be parsed is returned unchanged.
    pub fn format(&self, raw: Option<&str>, kind: TimestampKind) -> String {
        let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
            return String::new();
        };
        match self.try_format(raw, kind) {
            Ok(formatted) => formatted,
            Err(err) => {
                warn!(self.logger, "failed to format timestamp '{}': {}", raw, err);
                raw.to_string()
            }
        }
    }

    /// Sort key for `raw`. `None` stands for the minimum instant, so records
    /// whose timestamp is missing or broken sort before everything else.
    pub fn sort_instant(&self, raw: Option<&str>, kind: TimestampKind) -> Option<OffsetDateTime> {
        let raw = raw.filter(|raw| !raw.is_empty())?;
        match self.parse(raw, kind) {
            Ok(instant) => Some(instant),
            Err(err) => {
                warn!(self.logger, "failed to parse timestamp '{}': {}", raw, err);
                None
            }
        }
    }

    /// Calendar date of a local timestamp in the reference offset.
    pub fn calendar_date(&self, raw: &str) -> Option<Date> {
        match self.parse(raw, TimestampKind::Local) {
            Ok(instant) => Some(instant.date()),
            Err(err) => {
                warn!(
                    self.logger,
                    "failed to extract date from timestamp '{}': {}", raw, err
                );
                None
            }
        }
    }

    pub fn from_epoch_seconds(&self, seconds: i64) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .ok()
            .map(|instant| instant.to_offset(self.offset))
    }

    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    pub fn today(&self) -> Date {
        self.now().date()
    }

    /// Run identifier for a forecast batch: `now` in the reference offset,
    /// truncated to whole seconds.
    pub fn ingestion_id(&self, now: OffsetDateTime) -> String {
        let now = now.to_offset(self.offset);
        format_iso(now.replace_nanosecond(0).unwrap_or(now))
    }
}

/// `Z` suffix, any `+`, or three or more `-` mean the string carries its own
/// offset. Strings like `2024-03-01-junk` are misread as fully specified and
/// then fail to parse.
pub fn is_fully_specified(raw: &str) -> bool {
    raw.ends_with('Z') || raw.contains('+') || raw.matches('-').count() >= 3
}

/// `YYYY-MM-DDTHH:MM:SS[.ffffff]+HH:MM`, the fraction only when non-zero.
pub fn format_iso(instant: OffsetDateTime) -> String {
    let offset = instant.offset();
    let (hours, minutes, _) = offset.as_hms();
    let sign = if offset.is_negative() { '-' } else { '+' };
    let fraction = match instant.microsecond() {
        0 => String::new(),
        micros => format!(".{:06}", micros),
    };
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}{}{:02}:{:02}",
        instant.year(),
        u8::from(instant.month()),
        instant.day(),
        instant.hour(),
        instant.minute(),
        instant.second(),
        fraction,
        sign,
        hours.unsigned_abs(),
        minutes.unsigned_abs()
    )
}

/// Parse `+09:00`, `-0500`, `+09` style offsets.
pub fn parse_utc_offset(text: &str) -> Result<UtcOffset, TimestampError> {
    let invalid = || TimestampError::Offset(text.to_string());
    let sign: i8 = match text.as_bytes().first() {
        Some(b'+') => 1,
        Some(b'-') => -1,
        _ => return Err(invalid()),
    };
    let digits: String = text[1..].chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes, seconds) = match digits.len() {
        2 => (&digits[0..2], "0", "0"),
        4 => (&digits[0..2], &digits[2..4], "0"),
        6 => (&digits[0..2], &digits[2..4], &digits[4..6]),
        _ => return Err(invalid()),
    };
    let component = |value: &str| value.parse::<i8>().map_err(|_| invalid());
    UtcOffset::from_hms(
        sign * component(hours)?,
        sign * component(minutes)?,
        sign * component(seconds)?,
    )
    .map_err(|_| invalid())
}

fn parse_iso(raw: &str) -> Result<(PrimitiveDateTime, Option<UtcOffset>), TimestampError> {
    let value = raw.replace('Z', "+00:00");
    let malformed = || TimestampError::Malformed(raw.to_string());
    let parse_error = |source| TimestampError::Parse {
        raw: raw.to_string(),
        source,
    };

    let date_text = value.get(..10).ok_or_else(malformed)?;
    let date = Date::parse(date_text, format_description!("[year]-[month]-[day]"))
        .map_err(parse_error)?;

    let rest = &value[10..];
    if rest.is_empty() {
        return Ok((date.midnight(), None));
    }
    if !(rest.starts_with('T') || rest.starts_with(' ')) {
        return Err(malformed());
    }

    let clock = &rest[1..];
    let (clock, offset) = match clock.find(['+', '-']) {
        Some(index) => (&clock[..index], Some(parse_utc_offset(&clock[index..])?)),
        None => (clock, None),
    };
    let time = parse_clock(clock).map_err(parse_error)?;

    Ok((PrimitiveDateTime::new(date, time), offset))
}

fn parse_clock(clock: &str) -> Result<Time, time::error::Parse> {
    if clock.contains('.') {
        Time::parse(
            clock,
            format_description!("[hour]:[minute]:[second].[subsecond]"),
        )
    } else if clock.matches(':').count() == 2 {
        Time::parse(clock, format_description!("[hour]:[minute]:[second]"))
    } else {
        Time::parse(clock, format_description!("[hour]:[minute]"))
    }
}
