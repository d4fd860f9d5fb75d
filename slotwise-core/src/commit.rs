//! Turning an accepted proposal into a calendar event.
//!
//! Checks run in a fixed order (interval, conflict, quota) and the first
//! failure aborts before anything is written.

use tracing::{info, warn};

use crate::error::{Result, ScheduleError};
use crate::event::{Color, Event, EventType, NewEvent, RecurrenceType};
use crate::ports::{CalendarStore, TaskStore};
use crate::proposal::ScheduleProposal;
use crate::task::{Task, TaskStatus};

/// "[AI] Essay (Session 2/3)", or "[AI] Essay" for single-session tasks.
pub fn session_title(task_title: &str, session_number: i32, total_sessions: i32) -> String {
    if total_sessions > 1 {
        format!("[AI] {task_title} (Session {session_number}/{total_sessions})")
    } else {
        format!("[AI] {task_title}")
    }
}

pub fn session_event(task: &Task, proposal: &ScheduleProposal, session_number: i32) -> NewEvent {
    let total = task.required_sessions();
    NewEvent {
        user_id: task.user_id.clone(),
        title: session_title(&task.title, session_number, total),
        description: Some(format!(
            "Task: {}\nSession {}/{}\n\n{}",
            task.title, session_number, total, proposal.explanation
        )),
        start: proposal.proposed_start,
        end: proposal.proposed_end,
        color: Color::Peacock,
        event_type: EventType::AiGenerated,
        recurrence: RecurrenceType::None,
        parent_event_id: None,
        source_task_id: Some(task.id.clone()),
        ai_explanation: Some(proposal.explanation.clone()),
    }
}

pub fn check_interval(proposal: &ScheduleProposal) -> Result<()> {
    if proposal.proposed_end <= proposal.proposed_start {
        return Err(ScheduleError::InvalidInterval {
            start: proposal.proposed_start,
            end: proposal.proposed_end,
        });
    }
    Ok(())
}

/// `overlapping` is the calendar's answer for the proposal's interval.
pub fn check_conflict(proposal: &ScheduleProposal, overlapping: &[Event]) -> Result<()> {
    match overlapping.first() {
        Some(existing) => Err(ScheduleError::Conflict {
            start: proposal.proposed_start,
            end: proposal.proposed_end,
            conflicting: existing.title.clone(),
        }),
        None => Ok(()),
    }
}

pub fn check_quota(task: &Task) -> Result<()> {
    let required = task.required_sessions();
    if task.scheduled_sessions >= required {
        return Err(ScheduleError::QuotaExceeded {
            scheduled: task.scheduled_sessions,
            required,
        });
    }
    Ok(())
}

/// Validate, persist the session event, then advance the task's counters.
///
/// `task` is updated in place and saved; on error neither store is touched.
pub fn commit_proposal<C, T>(
    calendar: &mut C,
    tasks: &mut T,
    task: &mut Task,
    proposal: &ScheduleProposal,
) -> Result<Event>
where
    C: CalendarStore,
    T: TaskStore,
{
    check_interval(proposal)?;

    let overlapping =
        calendar.list_overlapping(&task.user_id, proposal.proposed_start, proposal.proposed_end)?;
    if let Err(err) = check_conflict(proposal, &overlapping) {
        warn!(task_id = task.id.as_str(), error = %err, "proposal rejected");
        return Err(err);
    }
    if let Err(err) = check_quota(task) {
        warn!(task_id = task.id.as_str(), error = %err, "proposal rejected");
        return Err(err);
    }

    let session_number = task.scheduled_sessions + 1;
    let event = calendar.create_event(session_event(task, proposal, session_number))?;

    let before = (task.scheduled_sessions, task.status);
    task.scheduled_sessions = session_number;
    if task.status == TaskStatus::Pending {
        task.status = TaskStatus::Scheduled;
    }
    if let Err(err) = tasks.save_task(task) {
        (task.scheduled_sessions, task.status) = before;
        warn!(
            task_id = task.id.as_str(),
            event_id = event.id.as_str(),
            error = %err,
            "task save failed; removing session event"
        );
        if let Err(cleanup) = calendar.delete_event(&event.id) {
            warn!(event_id = event.id.as_str(), error = %cleanup, "orphaned session event");
        }
        return Err(err.into());
    }

    info!(
        task_id = task.id.as_str(),
        event_id = event.id.as_str(),
        session = session_number,
        start = %event.start,
        "session committed"
    );
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{MemoryCalendar, MemoryTasks};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn proposal(start: NaiveDateTime, end: NaiveDateTime) -> ScheduleProposal {
        ScheduleProposal {
            task_id: "t1".into(),
            task_title: "Essay".into(),
            proposed_start: start,
            proposed_end: end,
            explanation: "Morning - peak focus time".into(),
            score: 80,
            session_number: 1,
            total_sessions: 2,
        }
    }

    fn stores() -> (MemoryCalendar, MemoryTasks, Task) {
        let task = Task::new("t1", "u1", "Essay", at(23, 0)).with_effort(120, 60);
        let mut tasks = MemoryTasks::new();
        tasks.insert(task.clone());
        (MemoryCalendar::new(), tasks, task)
    }

    #[test]
    fn test_commit_builds_session_event() {
        let (mut cal, mut tasks, mut task) = stores();
        let event = commit_proposal(&mut cal, &mut tasks, &mut task, &proposal(at(9, 0), at(10, 0))).unwrap();

        assert_eq!(event.title, "[AI] Essay (Session 1/2)");
        assert_eq!(
            event.description.as_deref(),
            Some("Task: Essay\nSession 1/2\n\nMorning - peak focus time")
        );
        assert_eq!(event.color, Color::Peacock);
        assert_eq!(event.event_type, EventType::AiGenerated);
        assert_eq!(event.source_task_id.as_deref(), Some("t1"));
        assert_eq!((event.start, event.end), (at(9, 0), at(10, 0)));

        assert_eq!(task.scheduled_sessions, 1);
        assert_eq!(task.status, TaskStatus::Scheduled);
        assert_eq!(tasks.get_task("t1").unwrap().unwrap().scheduled_sessions, 1);
    }

    #[test]
    fn test_single_session_title() {
        assert_eq!(session_title("Reply to Bob", 1, 1), "[AI] Reply to Bob");
    }

    #[test]
    fn test_conflict_leaves_state_untouched() {
        let (mut cal, mut tasks, mut task) = stores();
        cal.create_event(NewEvent::new("u1", "Lecture", at(9, 30), at(11, 0))).unwrap();

        let err = commit_proposal(&mut cal, &mut tasks, &mut task, &proposal(at(9, 0), at(10, 0)))
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
        assert_eq!(cal.events().len(), 1);
        assert_eq!(task.scheduled_sessions, 0);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_touching_event_is_not_a_conflict() {
        let (mut cal, mut tasks, mut task) = stores();
        cal.create_event(NewEvent::new("u1", "Lecture", at(10, 0), at(11, 0))).unwrap();
        assert!(commit_proposal(&mut cal, &mut tasks, &mut task, &proposal(at(9, 0), at(10, 0))).is_ok());
    }

    #[test]
    fn test_quota_checked_after_conflict() {
        let (mut cal, mut tasks, task) = stores();
        let mut full = task.with_sessions(2, 0);
        let err = commit_proposal(&mut cal, &mut tasks, &mut full, &proposal(at(9, 0), at(10, 0)))
            .unwrap_err();
        assert_eq!(err.code(), "QUOTA_EXCEEDED");

        cal.create_event(NewEvent::new("u1", "Lecture", at(9, 0), at(10, 0))).unwrap();
        let err = commit_proposal(&mut cal, &mut tasks, &mut full, &proposal(at(9, 0), at(10, 0)))
            .unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    struct ReadOnlyTasks;

    impl TaskStore for ReadOnlyTasks {
        fn get_task(&self, _task_id: &str) -> anyhow::Result<Option<Task>> {
            Ok(None)
        }
        fn save_task(&mut self, _task: &Task) -> anyhow::Result<()> {
            anyhow::bail!("tasks table is read-only")
        }
        fn list_tasks(&self, _user_id: &str) -> anyhow::Result<Vec<Task>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_failed_task_save_removes_event() {
        let (mut cal, _, mut task) = stores();
        let err = commit_proposal(&mut cal, &mut ReadOnlyTasks, &mut task, &proposal(at(9, 0), at(10, 0)))
            .unwrap_err();

        assert_eq!(err.code(), "STORAGE");
        assert!(cal.events().is_empty());
        assert_eq!(task.scheduled_sessions, 0);
        assert_eq!(task.status, TaskStatus::Pending);

        // The slot is free again for the next attempt.
        let (_, mut tasks, _) = stores();
        assert!(commit_proposal(&mut cal, &mut tasks, &mut task, &proposal(at(9, 0), at(10, 0))).is_ok());
    }

    #[test]
    fn test_inverted_interval_rejected() {
        let (mut cal, mut tasks, mut task) = stores();
        let err = commit_proposal(&mut cal, &mut tasks, &mut task, &proposal(at(10, 0), at(9, 0)))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INTERVAL");
    }
}
