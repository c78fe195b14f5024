use crate::error::ReduceError;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Calendar month bucket ("YYYY-MM"), the grouping grain of every statistic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u8, // 1..=12
}

impl YearMonth {
    pub fn new(year: i32, month: u8) -> Self {
        assert!((1..=12).contains(&month), "Month must be 1..=12");
        Self { year, month }
    }

    /// Truncate an instant (nanoseconds since the Unix epoch) to its UTC calendar month.
    pub fn from_unix_nanos(nanos: i128) -> Result<Self, ReduceError> {
        let dt = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|_| ReduceError::InvalidTimestamp(nanos))?;
        Ok(Self { year: dt.year(), month: u8::from(dt.month()) })
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s.split_once('-').ok_or("expected YYYY-MM")?;
        if y.len() != 4 || m.len() != 2 {
            return Err("expected YYYY-MM".into());
        }
        let year: i32 = y.parse().map_err(|_| "invalid year")?;
        let month: u8 = m.parse().map_err(|_| "invalid month")?;
        if !(1..=12).contains(&month) {
            return Err("month must be 01..12".into());
        }
        Ok(Self { year, month })
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
