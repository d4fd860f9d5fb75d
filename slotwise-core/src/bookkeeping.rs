//! Session bookkeeping: completed counts and the status transitions they imply.
//!
//! COMPLETED is only ever set by [`mark_completed`]; elapsed sessions can move
//! a task to IN_PROGRESS but never further.

use std::collections::BTreeSet;

use chrono::NaiveDateTime;

use crate::event::Event;
use crate::period::PeriodKey;
use crate::task::{Task, TaskStatus};

/// Session events of `task_id` whose end is strictly before `now`.
pub fn count_completed_sessions(events: &[Event], task_id: &str, now: NaiveDateTime) -> i32 {
    events
        .iter()
        .filter(|e| e.belongs_to_task(task_id) && e.end < now)
        .count() as i32
}

pub fn apply_completed_sessions(task: &mut Task, completed: i32) {
    task.completed_sessions = completed;
    if completed > 0 && task.status != TaskStatus::Completed {
        task.status = TaskStatus::InProgress;
    }
}

pub fn mark_completed(task: &mut Task) {
    task.status = TaskStatus::Completed;
}

/// (date, period) buckets already holding a session of `task_id`.
pub fn used_periods(events: &[Event], task_id: &str) -> BTreeSet<PeriodKey> {
    events
        .iter()
        .filter(|e| e.belongs_to_task(task_id))
        .map(|e| PeriodKey::of(e.start))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventType, NewEvent};
    use crate::period::Period;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn session(task_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Event {
        let mut e = NewEvent::new("u1", "[AI] x", start, end).with_type(EventType::AiGenerated);
        e.source_task_id = Some(task_id.to_string());
        e.into_event("e")
    }

    #[test]
    fn test_counts_only_elapsed_sessions_of_task() {
        let events = vec![
            session("t1", at(2, 9), at(2, 10)),
            session("t1", at(2, 14), at(2, 15)),
            session("t2", at(2, 9), at(2, 10)),
            NewEvent::new("u1", "Lecture", at(2, 8), at(2, 9)).into_event("x"),
        ];
        assert_eq!(count_completed_sessions(&events, "t1", at(2, 12)), 1);
        // end == now is not yet elapsed
        assert_eq!(count_completed_sessions(&events, "t1", at(2, 15)), 1);
        assert_eq!(count_completed_sessions(&events, "t1", at(3, 0)), 2);
    }

    #[test]
    fn test_status_transitions() {
        let mut task = Task::new("t1", "u1", "Essay", at(9, 23)).with_effort(120, 60);
        apply_completed_sessions(&mut task, 0);
        assert_eq!(task.status, TaskStatus::Pending);

        task.status = TaskStatus::Scheduled;
        apply_completed_sessions(&mut task, 2);
        assert_eq!(task.status, TaskStatus::InProgress);
        // All sessions elapsed is still not COMPLETED.
        assert!(task.all_sessions_completed());
        assert_ne!(task.status, TaskStatus::Completed);

        mark_completed(&mut task);
        apply_completed_sessions(&mut task, 2);
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[test]
    fn test_used_periods() {
        let events = vec![session("t1", at(2, 9), at(2, 10)), session("t1", at(2, 19), at(2, 20))];
        let used = used_periods(&events, "t1");
        assert_eq!(
            used.into_iter().collect::<Vec<_>>(),
            vec![
                PeriodKey::new(at(2, 0).date(), Period::Morning),
                PeriodKey::new(at(2, 0).date(), Period::Evening),
            ]
        );
    }
}
