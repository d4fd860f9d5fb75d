//! The scheduling engine: one task per call, against the caller's current
//! calendar snapshot.
//!
//! Writes go through the collaborator stores one proposal at a time. The
//! engine holds no locks; callers sharing stores across processes must
//! serialize `accept_*` calls for the same task.

use std::cmp::Reverse;
use std::sync::Arc;

use chrono::{Days, NaiveDateTime};
use chrono_tz::Tz;
use tracing::{info, warn};

use crate::bookkeeping::{apply_completed_sessions, count_completed_sessions, mark_completed, used_periods};
use crate::commit::commit_proposal;
use crate::completion::TextCompletion;
use crate::cooldown::{Clock, ModelStatus, SystemClock};
use crate::cycle::{calculate_target_sessions, cycle_window, days_until_deadline, DEFAULT_HORIZON_DAYS};
use crate::error::{Result, ScheduleError};
use crate::event::Event;
use crate::finder::{find_free_slots, FinderConfig};
use crate::ports::{CalendarStore, PreferenceStore, TaskStore};
use crate::proposal::{BatchAcceptance, BatchFailure, CycleOutcome, ScheduleProposal, ScheduleResult};
use crate::slot::TimeSlot;
use crate::strategy::{select_proposals, AiStrategy, CycleContext, HeuristicStrategy, SlotStrategy};
use crate::summary::summarize_busy_events;
use crate::task::{Task, TaskStatus};
use crate::time::{ceil_to_quarter_hour, to_local};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub finder: FinderConfig,
    /// Wall clock the user's calendar is kept in.
    pub timezone: Tz,
    /// Cycle length for users without a stored preference.
    pub default_horizon_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            finder: FinderConfig::default(),
            timezone: Tz::UTC,
            default_horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

pub struct SchedulingEngine<C, T, P> {
    calendar: C,
    tasks: T,
    preferences: P,
    completion: Option<Arc<dyn TextCompletion>>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl<C, T, P> SchedulingEngine<C, T, P>
where
    C: CalendarStore,
    T: TaskStore,
    P: PreferenceStore,
{
    /// Engine with the heuristic tier only and the system clock.
    pub fn new(calendar: C, tasks: T, preferences: P) -> Self {
        Self {
            calendar,
            tasks,
            preferences,
            completion: None,
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
        }
    }

    pub fn with_completion(mut self, completion: Arc<dyn TextCompletion>) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn tasks(&self) -> &T {
        &self.tasks
    }

    pub fn preferences(&self) -> &P {
        &self.preferences
    }

    pub fn into_parts(self) -> (C, T, P) {
        (self.calendar, self.tasks, self.preferences)
    }

    /// Current wall-clock time in the configured zone.
    pub fn now_local(&self) -> NaiveDateTime {
        to_local(self.clock.now(), self.config.timezone)
    }

    /// Propose sessions for the next cycle of `task_id`. Nothing is written.
    pub fn propose_cycle(&self, actor: &str, task_id: &str) -> Result<ScheduleResult> {
        let task = self.load_owned(actor, task_id)?;
        if !task.is_deadline() {
            return Err(ScheduleError::InvalidTaskType(task.id));
        }

        if task.status == TaskStatus::Completed {
            return Ok(ScheduleResult::empty(
                &task.id,
                &task.title,
                CycleOutcome::AlreadyCompleted,
                "Task already completed.",
            ));
        }

        let now = self.now_local();
        if task.due_date < now {
            info!(task_id, due = %task.due_date, "deadline passed");
            return Ok(ScheduleResult::empty(
                &task.id,
                &task.title,
                CycleOutcome::DeadlinePassed,
                "Deadline has passed; no sessions can be proposed.",
            ));
        }

        let unscheduled = task.unscheduled_sessions();
        if unscheduled <= 0 {
            return Ok(ScheduleResult::empty(
                &task.id,
                &task.title,
                CycleOutcome::NothingToSchedule,
                format!(
                    "All {} session(s) are already on the calendar.",
                    task.required_sessions()
                ),
            ));
        }

        let horizon = self.horizon_days(&task.user_id);
        let finder = self.config.finder;
        let window = cycle_window(now, task.due_date, horizon, finder.work_end);
        let busy = self
            .calendar
            .list_overlapping(&task.user_id, window.start, window.end)?;
        let free_slots = find_free_slots(&busy, window.start, window.end, &finder);

        if free_slots.is_empty() {
            info!(task_id, horizon, busy = busy.len(), "no free time in cycle");
            return Ok(ScheduleResult::empty(
                &task.id,
                &task.title,
                CycleOutcome::NoFreeTime,
                format!(
                    "No free time in the next {horizon} day(s). Clear some time or wait for the next cycle."
                ),
            )
            .with_remaining(unscheduled));
        }

        let used = used_periods(&busy, &task.id);
        let busy_summary = summarize_busy_events(&busy);
        let custom_rules = self.custom_rules(&task.user_id);
        let days_left = days_until_deadline(now.date(), task.due_date);
        let target = calculate_target_sessions(unscheduled, days_left, window.days_in_cycle, horizon);

        let ctx = CycleContext {
            task: &task,
            free_slots: &free_slots,
            target_sessions: target,
            days_until_deadline: days_left,
            used_periods: &used,
            busy_summary: &busy_summary,
            custom_rules: &custom_rules,
            finder: &finder,
        };

        let heuristic = HeuristicStrategy;
        let selection = match self.completion.as_deref() {
            Some(completion) => {
                let ai = AiStrategy::new(completion);
                let strategies: [&dyn SlotStrategy; 2] = [&ai, &heuristic];
                select_proposals(&strategies, &ctx)
            }
            None => {
                let strategies: [&dyn SlotStrategy; 1] = [&heuristic];
                select_proposals(&strategies, &ctx)
            }
        };
        let proposals = selection.proposals;

        info!(
            task_id,
            free_slots = free_slots.len(),
            target,
            proposed = proposals.len(),
            "cycle proposed"
        );

        let scheduled = proposals.len() as i32;
        Ok(ScheduleResult {
            task_id: task.id.clone(),
            task_title: task.title.clone(),
            outcome: if proposals.is_empty() {
                CycleOutcome::NoSuitableSlot
            } else {
                CycleOutcome::Proposed
            },
            message: cycle_message(&task, &proposals, unscheduled, days_left, horizon),
            remaining_sessions: unscheduled,
            scheduled_in_this_cycle: scheduled,
            can_schedule_more: unscheduled > scheduled,
            next_cycle_date: if proposals.is_empty() {
                None
            } else {
                window.next_cycle_date()
            },
            strategy: selection.strategy.map(str::to_string),
            proposals,
        })
    }

    /// Commit one proposal. Re-reads the task so a batch sees its own writes.
    pub fn accept_proposal(&mut self, actor: &str, proposal: &ScheduleProposal) -> Result<Event> {
        let mut task = self.load_owned(actor, &proposal.task_id)?;
        commit_proposal(&mut self.calendar, &mut self.tasks, &mut task, proposal)
    }

    /// Commit `proposals` in order, stopping at the first failure.
    pub fn accept_all(&mut self, actor: &str, proposals: &[ScheduleProposal]) -> BatchAcceptance {
        let mut batch = BatchAcceptance::default();

        for (index, proposal) in proposals.iter().enumerate() {
            match self.accept_proposal(actor, proposal) {
                Ok(event) => batch.committed.push(event),
                Err(error) => {
                    warn!(
                        index,
                        committed = batch.committed.len(),
                        code = error.code(),
                        "batch acceptance stopped"
                    );
                    batch.failure = Some(BatchFailure { index, error });
                    break;
                }
            }
        }

        batch
    }

    /// Recount elapsed sessions of `task_id` and persist the result.
    pub fn sync_completed_sessions(&mut self, actor: &str, task_id: &str) -> Result<Task> {
        let mut task = self.load_owned(actor, task_id)?;
        let events = self.calendar.events_for_task(&task.id)?;
        let completed = count_completed_sessions(&events, &task.id, self.now_local());

        apply_completed_sessions(&mut task, completed);
        self.tasks.save_task(&task)?;
        info!(task_id, completed, status = task.status.as_str(), "sessions synced");
        Ok(task)
    }

    pub fn mark_completed(&mut self, actor: &str, task_id: &str) -> Result<Task> {
        let mut task = self.load_owned(actor, task_id)?;
        mark_completed(&mut task);
        self.tasks.save_task(&task)?;
        info!(task_id, "task marked completed");
        Ok(task)
    }

    /// Deadline tasks still PENDING, most important first, then earliest due.
    pub fn pending_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .list_tasks(user_id)?
            .into_iter()
            .filter(|t| t.is_deadline() && t.status == TaskStatus::Pending)
            .collect();
        tasks.sort_by_key(|t| (Reverse(t.priority.rank()), t.due_date));
        Ok(tasks)
    }

    /// Free slots from now through the end of day `days` (today counts as 1).
    pub fn free_slots(&self, user_id: &str, days: i64) -> Result<Vec<TimeSlot>> {
        let now = self.now_local();
        let today = now.date();
        let span = u64::try_from(days.max(1) - 1).unwrap_or(0);
        let last = today.checked_add_days(Days::new(span)).unwrap_or(today);

        let start = ceil_to_quarter_hour(now);
        let end = last.and_time(self.config.finder.work_end);
        let busy = self.calendar.list_overlapping(user_id, start, end)?;
        Ok(find_free_slots(&busy, start, end, &self.config.finder))
    }

    /// Availability of each model behind the completion collaborator.
    pub fn model_statuses(&self) -> Vec<ModelStatus> {
        self.completion
            .as_ref()
            .map(|c| c.model_statuses())
            .unwrap_or_default()
    }

    fn load_owned(&self, actor: &str, task_id: &str) -> Result<Task> {
        let task = self
            .tasks
            .get_task(task_id)?
            .ok_or_else(|| ScheduleError::task_not_found(task_id))?;

        if task.user_id != actor {
            return Err(ScheduleError::Unauthorized {
                actor: actor.to_string(),
                task_id: task_id.to_string(),
            });
        }
        Ok(task)
    }

    fn horizon_days(&self, user_id: &str) -> i64 {
        match self.preferences.horizon_days(user_id) {
            Ok(Some(days)) if days > 0 => days,
            Ok(_) => self.config.default_horizon_days,
            Err(err) => {
                warn!(user_id, error = %err, "horizon preference unreadable; using default");
                self.config.default_horizon_days
            }
        }
    }

    fn custom_rules(&self, user_id: &str) -> String {
        match self.preferences.custom_rules(user_id) {
            Ok(rules) => rules.unwrap_or_default(),
            Err(err) => {
                warn!(user_id, error = %err, "custom rules unreadable; ignoring");
                String::new()
            }
        }
    }
}

fn cycle_message(
    task: &Task,
    proposals: &[ScheduleProposal],
    unscheduled: i32,
    days_left: i64,
    horizon: i64,
) -> String {
    if proposals.is_empty() {
        return format!("No suitable free time found in the next {horizon} day(s).");
    }

    let mut msg = format!(
        "Task: {}\n{days_left} day(s) until the deadline\nSessions left: {unscheduled}\n\n",
        task.title
    );
    msg.push_str(&format!(
        "Proposed {} session(s) for the next {horizon} day(s):\n",
        proposals.len()
    ));
    for (i, p) in proposals.iter().enumerate() {
        msg.push_str(&format!(
            "  {}. {} - {}\n",
            i + 1,
            p.proposed_start.format("%d/%m (%a) %H:%M"),
            p.proposed_end.format("%H:%M")
        ));
    }

    let deferred = unscheduled - proposals.len() as i32;
    if deferred > 0 {
        msg.push_str(&format!(
            "\n{deferred} more session(s) will be proposed in later cycles."
        ));
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::testing::FixedClock;
    use crate::ports::{MemoryCalendar, MemoryPreferences, MemoryTasks, UserPreferences};
    use crate::task::{Priority, TaskType};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    type Engine = SchedulingEngine<MemoryCalendar, MemoryTasks, MemoryPreferences>;

    fn engine_with(tasks: Vec<Task>) -> Engine {
        let mut store = MemoryTasks::new();
        for t in tasks {
            store.insert(t);
        }
        let clock = FixedClock::at(Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap());
        SchedulingEngine::new(MemoryCalendar::new(), store, MemoryPreferences::new())
            .with_clock(Arc::new(clock))
    }

    fn essay() -> Task {
        Task::new("t1", "u1", "Essay", at(12, 23, 0)).with_effort(120, 60)
    }

    #[test]
    fn test_ownership_and_type_checked_first() {
        let simple = Task::new("t2", "u1", "Groceries", at(12, 23, 0)).with_type(TaskType::Simple);
        let engine = engine_with(vec![essay(), simple]);

        assert_eq!(engine.propose_cycle("u1", "nope").unwrap_err().code(), "NOT_FOUND");
        assert_eq!(engine.propose_cycle("u2", "t1").unwrap_err().code(), "UNAUTHORIZED");
        assert_eq!(engine.propose_cycle("u1", "t2").unwrap_err().code(), "INVALID_TASK_TYPE");
    }

    #[test]
    fn test_outcomes_are_results_not_errors() {
        let mut done = essay();
        done.status = TaskStatus::Completed;
        let engine = engine_with(vec![done]);
        let result = engine.propose_cycle("u1", "t1").unwrap();
        assert_eq!(result.outcome, CycleOutcome::AlreadyCompleted);
        assert!(result.proposals.is_empty());

        let engine = engine_with(vec![essay().with_sessions(2, 0)]);
        let result = engine.propose_cycle("u1", "t1").unwrap();
        assert_eq!(result.outcome, CycleOutcome::NothingToSchedule);
    }

    #[test]
    fn test_propose_fills_result() {
        let engine = engine_with(vec![essay()]);
        let result = engine.propose_cycle("u1", "t1").unwrap();

        assert_eq!(result.outcome, CycleOutcome::Proposed);
        assert_eq!(result.strategy.as_deref(), Some("heuristic"));
        assert_eq!(result.remaining_sessions, 2);
        assert_eq!(result.scheduled_in_this_cycle, 2);
        assert!(!result.can_schedule_more);
        assert_eq!(result.next_cycle_date, NaiveDate::from_ymd_opt(2026, 3, 6));
        assert!(result.message.starts_with("Task: Essay\n11 day(s) until the deadline\n"));
        assert!(result.message.contains("  1. 02/03 (Mon) 08:00 - 09:00\n"));
    }

    #[test]
    fn test_horizon_preference_shapes_window() {
        let mut engine = engine_with(vec![essay().with_effort(600, 60)]);
        engine.preferences.set(
            "u1",
            UserPreferences {
                horizon_days: Some(2),
                custom_rules: None,
            },
        );
        let result = engine.propose_cycle("u1", "t1").unwrap();
        assert_eq!(result.scheduled_in_this_cycle, 2);
        assert_eq!(result.next_cycle_date, NaiveDate::from_ymd_opt(2026, 3, 4));
        assert!(result.can_schedule_more);
        assert!(result.message.ends_with("8 more session(s) will be proposed in later cycles."));
    }

    #[test]
    fn test_pending_tasks_order() {
        let low = Task::new("a", "u1", "Low", at(5, 12, 0)).with_priority(Priority::Low);
        let high_late = Task::new("b", "u1", "High late", at(9, 12, 0)).with_priority(Priority::High);
        let high_soon = Task::new("c", "u1", "High soon", at(6, 12, 0)).with_priority(Priority::High);
        let mut scheduled = Task::new("d", "u1", "Scheduled", at(4, 12, 0));
        scheduled.status = TaskStatus::Scheduled;
        let simple = Task::new("e", "u1", "Simple", at(4, 12, 0)).with_type(TaskType::Simple);
        let other = Task::new("f", "u2", "Other", at(4, 12, 0));

        let engine = engine_with(vec![low, high_late, high_soon, scheduled, simple, other]);
        let ids: Vec<_> = engine
            .pending_tasks("u1")
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_mark_completed_persists() {
        let mut engine = engine_with(vec![essay()]);
        let task = engine.mark_completed("u1", "t1").unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(
            engine.tasks().get_task("t1").unwrap().unwrap().status,
            TaskStatus::Completed
        );
        assert_eq!(engine.mark_completed("u2", "t1").unwrap_err().code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_free_slots_span() {
        let engine = engine_with(vec![]);
        let slots = engine.free_slots("u1", 1).unwrap();
        // 08:00-23:00 in 150-minute chunks with 5-minute gaps
        assert_eq!(slots.first().map(|s| s.start()), Some(at(2, 8, 0)));
        assert!(slots.iter().all(|s| s.date() == at(2, 0, 0).date()));
        assert!(engine.model_statuses().is_empty());
    }
}
