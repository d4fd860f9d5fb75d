//! Cycle sizing: how far ahead to look and how many sessions to ask for.

use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::time::ceil_to_quarter_hour;

/// Default cycle length when the user has not configured one.
pub const DEFAULT_HORIZON_DAYS: i64 = 4;
/// A task due within this many days may stack sessions inside one period.
pub const URGENT_DEADLINE_DAYS: i64 = 3;
/// Per-day cap when the deadline falls inside the current cycle.
pub const MAX_SESSIONS_PER_DAY: i64 = 2;

/// Sessions to propose in this cycle.
///
/// Deadline inside the cycle: clear as much as possible, at most two per day.
/// Deadline further out: one per day of the cycle.
pub fn calculate_target_sessions(
    unscheduled: i32,
    days_until_deadline: i64,
    days_in_cycle: i64,
    horizon_days: i64,
) -> i32 {
    if unscheduled <= 0 {
        return 0;
    }

    let days_in_cycle = days_in_cycle.max(0);
    let cap = if days_until_deadline <= horizon_days {
        days_in_cycle * MAX_SESSIONS_PER_DAY
    } else {
        days_in_cycle
    };

    i64::from(unscheduled).min(cap) as i32
}

/// Calendar days from `today` through the due date, counting both ends.
pub fn days_until_deadline(today: NaiveDate, due: NaiveDateTime) -> i64 {
    (due.date() - today).num_days() + 1
}

pub fn is_urgent(days_until_deadline: i64) -> bool {
    days_until_deadline <= URGENT_DEADLINE_DAYS
}

/// The local time window searched in one proposal cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Last calendar day of the cycle.
    pub end_date: NaiveDate,
    pub days_in_cycle: i64,
}

impl CycleWindow {
    /// First day the next cycle may propose for.
    pub fn next_cycle_date(&self) -> Option<NaiveDate> {
        self.end_date.succ_opt()
    }
}

/// Window from `now` (rounded up to a quarter hour) to the earlier of the
/// cycle's last working day and the deadline itself.
pub fn cycle_window(
    now: NaiveDateTime,
    due: NaiveDateTime,
    horizon_days: i64,
    work_end: NaiveTime,
) -> CycleWindow {
    let today = now.date();
    let horizon = u64::try_from(horizon_days.max(1) - 1).unwrap_or(0);
    let horizon_end = today.checked_add_days(Days::new(horizon)).unwrap_or(today);
    let end_date = horizon_end.min(due.date());

    CycleWindow {
        start: ceil_to_quarter_hour(now),
        end: end_date.and_time(work_end).min(due),
        end_date,
        days_in_cycle: (end_date - today).num_days() + 1,
    }
}
