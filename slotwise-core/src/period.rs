//! Period-of-day buckets: the unit of "at most one session per period".

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hour at which MORNING ends.
pub const MORNING_END_HOUR: u32 = 12;
/// Hour at which AFTERNOON ends.
pub const AFTERNOON_END_HOUR: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Period {
    Morning,
    Afternoon,
    Evening,
}

impl Period {
    pub fn of(time: NaiveTime) -> Self {
        if time.hour() < MORNING_END_HOUR {
            Period::Morning
        } else if time.hour() < AFTERNOON_END_HOUR {
            Period::Afternoon
        } else {
            Period::Evening
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Morning => "MORNING",
            Period::Afternoon => "AFTERNOON",
            Period::Evening => "EVENING",
        }
    }

    /// One-letter code used in prompts and digests.
    pub fn code(&self) -> char {
        match self {
            Period::Morning => 'M',
            Period::Afternoon => 'A',
            Period::Evening => 'E',
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (date, period) bucket. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    pub date: NaiveDate,
    pub period: Period,
}

impl PeriodKey {
    pub fn new(date: NaiveDate, period: Period) -> Self {
        Self { date, period }
    }

    pub fn of(dt: NaiveDateTime) -> Self {
        Self {
            date: dt.date(),
            period: Period::of(dt.time()),
        }
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date.format("%Y-%m-%d"), self.period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_period_boundaries() {
        assert_eq!(Period::of(t(8, 0)), Period::Morning);
        assert_eq!(Period::of(t(11, 59)), Period::Morning);
        assert_eq!(Period::of(t(12, 0)), Period::Afternoon);
        assert_eq!(Period::of(t(17, 59)), Period::Afternoon);
        assert_eq!(Period::of(t(18, 0)), Period::Evening);
    }

    #[test]
    fn test_period_key_orders_chronologically() {
        let d1 = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let mut keys = vec![
            PeriodKey::new(d2, Period::Morning),
            PeriodKey::new(d1, Period::Evening),
            PeriodKey::new(d1, Period::Morning),
            PeriodKey::new(d1, Period::Afternoon),
        ];
        keys.sort();
        assert_eq!(
            keys.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
            vec![
                "2026-03-01_MORNING",
                "2026-03-01_AFTERNOON",
                "2026-03-01_EVENING",
                "2026-03-02_MORNING",
            ]
        );
    }
}
