mod forecasts;
mod history;

pub use forecasts::*;
pub use history::*;

use time::OffsetDateTime;

/// Stable ascending sort on a precomputed instant. Records without one sort
/// first and keep their relative order.
pub fn sort_chronologically<'r, T, F>(records: Vec<&'r T>, instant: F) -> Vec<&'r T>
where
    F: Fn(&T) -> Option<OffsetDateTime>,
{
    let mut keyed: Vec<(Option<OffsetDateTime>, &'r T)> = records
        .into_iter()
        .map(|record| (instant(record), record))
        .collect();
    keyed.sort_by_key(|(instant, _)| *instant);
    keyed.into_iter().map(|(_, record)| record).collect()
}
