use time::{Date, OffsetDateTime, UtcOffset};

use crate::{RawRecord, TimestampKind, TimestampNormalizer};

/// The full reference-offset day before a target date, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl HistoryWindow {
    /// `[target-1d 00:00:00, target-1d 23:59:59.999999]`
    pub fn for_target(target: Date, offset: UtcOffset) -> Option<Self> {
        let day = target.previous_day()?;
        let end = day.with_hms_micro(23, 59, 59, 999_999).ok()?;
        Some(Self {
            start: day.midnight().assume_offset(offset),
            end: end.assume_offset(offset),
        })
    }

    pub fn day(&self) -> Date {
        self.start.date()
    }

    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Dates sent as `start_date`/`end_date`: two days before the target up to
/// the target itself.
pub fn query_range(target: Date) -> Option<(Date, Date)> {
    let start = target.previous_day()?.previous_day()?;
    Some((start, target))
}

/// Instant used to place a history record in time: `timestamp_local`, else
/// `timestamp_utc`, else `ts`. Only the first field present is tried.
pub fn record_instant(normalizer: &TimestampNormalizer, record: &RawRecord) -> Option<OffsetDateTime> {
    if let Some(local) = record.timestamp_local() {
        return normalizer.sort_instant(Some(local), TimestampKind::Local);
    }
    if let Some(utc) = record.timestamp_utc() {
        return normalizer.sort_instant(Some(utc), TimestampKind::Utc);
    }
    record
        .epoch_seconds()
        .and_then(|seconds| normalizer.from_epoch_seconds(seconds))
}
