//! Free-interval finder.
//!
//! Computes the complement of busy events against working hours, day by day,
//! leaving a buffer before and after every event. Long gaps are cut into
//! `max_slot`-sized pieces so a single evening never swallows a whole
//! proposal cycle.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::slot::TimeSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinderConfig {
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub buffer_before_minutes: i64,
    pub buffer_after_minutes: i64,
    pub min_slot_minutes: i64,
    pub max_slot_minutes: i64,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            work_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            work_end: NaiveTime::from_hms_opt(23, 0, 0).unwrap_or(NaiveTime::MIN),
            buffer_before_minutes: 10,
            buffer_after_minutes: 5,
            min_slot_minutes: 30,
            max_slot_minutes: 150,
        }
    }
}

/// Free slots in `[window_start, window_end]`, chronological.
///
/// `busy` may be in any order and may include events outside the window.
pub fn find_free_slots(
    busy: &[Event],
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
    cfg: &FinderConfig,
) -> Vec<TimeSlot> {
    let mut events: Vec<&Event> = busy.iter().collect();
    events.sort_by_key(|e| e.start);

    let mut slots = Vec::new();
    let last_date = window_end.date();
    let mut date = window_start.date();

    while date <= last_date {
        let day_start = date.and_time(cfg.work_start).max(window_start);
        let day_end = date.and_time(cfg.work_end).min(window_end);

        if day_start < day_end {
            find_in_day(&events, day_start, day_end, cfg, &mut slots);
        }

        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    slots
}

fn find_in_day(
    events: &[&Event],
    day_start: NaiveDateTime,
    day_end: NaiveDateTime,
    cfg: &FinderConfig,
    out: &mut Vec<TimeSlot>,
) {
    let before = Duration::minutes(cfg.buffer_before_minutes);
    let after = Duration::minutes(cfg.buffer_after_minutes);
    let mut cursor = day_start;

    for event in events {
        if event.end < day_start || event.start > day_end {
            continue;
        }

        if event.start > cursor {
            let gap_end = (event.start - before).min(day_end);
            if gap_end > cursor {
                split_long_gap(cursor, gap_end, cfg, out);
            }
        }

        if event.end > cursor {
            cursor = event.end + after;
        }
    }

    if cursor < day_end {
        split_long_gap(cursor, day_end, cfg, out);
    }
}

/// Cut `[start, end)` into pieces of at most `max_slot` minutes, separated by
/// the after-buffer. A trailing piece shorter than `min_slot` is dropped.
pub fn split_long_gap(
    start: NaiveDateTime,
    end: NaiveDateTime,
    cfg: &FinderConfig,
    out: &mut Vec<TimeSlot>,
) {
    let max = Duration::minutes(cfg.max_slot_minutes);
    let mut current = start;

    while current < end {
        let remaining = (end - current).num_minutes();

        if remaining <= cfg.max_slot_minutes {
            if remaining >= cfg.min_slot_minutes {
                out.extend(TimeSlot::new(current, end));
            }
            break;
        }

        let piece_end = current + max;
        out.extend(TimeSlot::new(current, piece_end));
        current = piece_end + Duration::minutes(cfg.buffer_after_minutes);
    }
}
