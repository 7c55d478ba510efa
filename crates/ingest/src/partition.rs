use std::fmt;
use time::Date;

/// Which file a batch of rows belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PartitionKey {
    /// One forecast file per local calendar day
    Day(Date),
    /// One history file per month
    Month { year: i32, month: u8 },
}

impl PartitionKey {
    pub fn year(&self) -> i32 {
        match self {
            PartitionKey::Day(date) => date.year(),
            PartitionKey::Month { year, .. } => *year,
        }
    }

    pub fn month(&self) -> u8 {
        match self {
            PartitionKey::Day(date) => u8::from(date.month()),
            PartitionKey::Month { month, .. } => *month,
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Day(date) => write!(
                f,
                "{:04}{:02}{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            ),
            PartitionKey::Month { year, month } => write!(f, "{:04}_{:02}", year, month),
        }
    }
}

/// Maps a point and partition key to the relative path of its CSV file.
///
/// ```text
/// {prefix}/{point}/{YYYY}/{MM}/wbfc_{YYYYMMDD}.csv
/// {prefix}/{point}/{YYYY}/wb_{YYYY}_{MM}.csv
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionLayout {
    prefix: String,
}

impl PartitionLayout {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn path(&self, point: &str, key: &PartitionKey) -> String {
        let relative = match key {
            PartitionKey::Day(_) => format!(
                "{}/{:04}/{:02}/wbfc_{}.csv",
                point,
                key.year(),
                key.month(),
                key
            ),
            PartitionKey::Month { .. } => {
                format!("{}/{:04}/wb_{}.csv", point, key.year(), key)
            }
        };
        if self.prefix.is_empty() {
            relative
        } else {
            format!("{}/{}", self.prefix, relative)
        }
    }
}

/// Encoded rows ready to be appended to one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionBatch {
    pub key: PartitionKey,
    pub bytes: Vec<u8>,
    pub rows: usize,
    pub duplicates: usize,
}
