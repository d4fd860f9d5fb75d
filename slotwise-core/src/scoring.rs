//! Slot desirability by time of day and length.

use chrono::{NaiveTime, Timelike};

use crate::slot::TimeSlot;

const BASE_SCORE: i32 = 50;
const LONG_SLOT_MINUTES: i64 = 90;
const LONG_SLOT_BONUS: i32 = 10;

/// Half-open bands `[from, to)` in minutes since midnight.
const BANDS: [(u32, u32, i32); 6] = [
    (8 * 60, 11 * 60 + 30, 30),
    (11 * 60 + 30, 13 * 60 + 30, -10),
    (13 * 60 + 30, 17 * 60, 20),
    (17 * 60, 19 * 60, -5),
    (19 * 60, 21 * 60, 10),
    (21 * 60, 24 * 60, -15),
];

fn minutes_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// 0..=100, higher is better.
pub fn score_slot(slot: &TimeSlot) -> i32 {
    score_at(slot.start().time(), slot.duration_minutes())
}

pub fn score_at(start: NaiveTime, duration_minutes: i64) -> i32 {
    let minute = minutes_of_day(start);
    let band = BANDS
        .iter()
        .find(|(from, to, _)| minute >= *from && minute < *to)
        .map_or(0, |(_, _, delta)| *delta);

    let bonus = if duration_minutes >= LONG_SLOT_MINUTES {
        LONG_SLOT_BONUS
    } else {
        0
    };

    (BASE_SCORE + band + bonus).clamp(0, 100)
}

/// Canned rationale for a session starting at `start`.
pub fn rationale(start: NaiveTime) -> &'static str {
    match minutes_of_day(start) {
        m if (480..690).contains(&m) => "Morning - peak focus time",
        m if (810..1020).contains(&m) => "Afternoon - good for focused work",
        m if (1140..1260).contains(&m) => "Early evening - productive self-study time",
        m if (690..810).contains(&m) => "Midday - flexible time",
        _ => "Open slot that fits your calendar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(score_at(t(8, 0), 60), 80);
        assert_eq!(score_at(t(11, 29), 60), 80);
        assert_eq!(score_at(t(11, 30), 60), 40);
        assert_eq!(score_at(t(13, 30), 60), 70);
        assert_eq!(score_at(t(17, 0), 60), 45);
        assert_eq!(score_at(t(19, 0), 60), 60);
        assert_eq!(score_at(t(21, 0), 60), 35);
        assert_eq!(score_at(t(23, 59), 60), 35);
        // Before working hours: no band applies.
        assert_eq!(score_at(t(7, 0), 60), 50);
    }

    #[test]
    fn test_long_slot_bonus() {
        assert_eq!(score_at(t(9, 0), 89), 80);
        assert_eq!(score_at(t(9, 0), 90), 90);

        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let slot = TimeSlot::new(day.and_time(t(14, 0)), day.and_time(t(16, 30))).unwrap();
        assert_eq!(score_slot(&slot), 80);
    }

    #[test]
    fn test_rationale() {
        assert_eq!(rationale(t(9, 0)), "Morning - peak focus time");
        assert_eq!(rationale(t(12, 0)), "Midday - flexible time");
        assert_eq!(rationale(t(14, 0)), "Afternoon - good for focused work");
        assert_eq!(rationale(t(17, 30)), "Open slot that fits your calendar");
        assert_eq!(rationale(t(20, 0)), "Early evening - productive self-study time");
    }
}
