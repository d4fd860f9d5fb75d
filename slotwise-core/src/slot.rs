//! `TimeSlot`: a half-open `[start, end)` interval of free local time.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::period::{Period, PeriodKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimeSlot {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeSlot {
    /// Returns `None` unless `end > start`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn can_fit(&self, minutes: i64) -> bool {
        self.duration_minutes() >= minutes
    }

    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        intervals_overlap(self.start, self.end, start, end)
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn period(&self) -> Period {
        Period::of(self.start.time())
    }

    pub fn period_key(&self) -> PeriodKey {
        PeriodKey::of(self.start)
    }
}

/// `[a_start, a_end)` and `[b_start, b_end)` share at least one instant.
pub fn intervals_overlap(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_rejects_empty_and_inverted() {
        assert!(TimeSlot::new(at(9, 0), at(9, 0)).is_none());
        assert!(TimeSlot::new(at(10, 0), at(9, 0)).is_none());
    }

    #[test]
    fn test_duration_and_fit() {
        let s = TimeSlot::new(at(9, 0), at(10, 30)).unwrap();
        assert_eq!(s.duration_minutes(), 90);
        assert!(s.can_fit(90));
        assert!(!s.can_fit(91));
        assert_eq!(s.period(), Period::Morning);
    }

    #[test]
    fn test_half_open_overlap() {
        let s = TimeSlot::new(at(9, 0), at(10, 0)).unwrap();
        // Touching intervals do not overlap.
        assert!(!s.overlaps(at(10, 0), at(11, 0)));
        assert!(!s.overlaps(at(8, 0), at(9, 0)));
        assert!(s.overlaps(at(9, 59), at(11, 0)));
        assert!(s.overlaps(at(8, 0), at(12, 0)));
    }
}
