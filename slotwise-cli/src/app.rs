//! Command handlers: load state, run one engine operation, persist.

use anyhow::{bail, Context, Result};
use chrono::{Days, NaiveDateTime};
use slotwise_core::task::TaskScale;
use slotwise_core::time::parse_local;
use slotwise_core::{
    BatchAcceptance, CalendarStore, Clock, Event, EventType, MemoryCalendar, MemoryPreferences,
    MemoryTasks, ModelStatus, NewEvent, Priority, RecurrenceType, ScheduleProposal, ScheduleResult,
    SchedulingEngine, SystemClock, Task, TaskStore, TaskType, TextCompletion, TimeSlot,
    UserPreferences,
};
use std::sync::Arc;
use tracing::info;

use crate::calendar::sessions_to_ics;
use crate::config::Config;
use crate::llm::build_completer;
use crate::state::StateDir;

pub type Engine = SchedulingEngine<MemoryCalendar, MemoryTasks, MemoryPreferences>;

/// Fields for `task add`, as typed on the command line.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub due: String,
    pub effort: Option<i32>,
    pub session: Option<i32>,
    pub max_sessions: Option<i32>,
    pub priority: Option<String>,
    pub scale: Option<String>,
    pub simple: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventDraft {
    pub title: String,
    pub start: String,
    pub end: String,
    pub fixed: bool,
    pub recurrence: Option<String>,
}

/// Outcome of `accept`, with the failure mapped back to the number the
/// user saw in `propose`.
#[derive(Debug)]
pub struct Acceptance {
    pub batch: BatchAcceptance,
    pub failed_number: Option<usize>,
}

pub struct App {
    state: StateDir,
    config: Config,
    clock: Arc<dyn Clock>,
}

impl App {
    pub fn new(state: StateDir, config: Config) -> Self {
        Self {
            state,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn actor(&self) -> &str {
        &self.config.user.id
    }

    fn engine(&self, use_ai: bool) -> Result<Engine> {
        let mut engine = SchedulingEngine::new(
            self.state.load_calendar()?,
            self.state.load_tasks()?,
            self.state.load_preferences()?,
        )
        .with_clock(self.clock.clone())
        .with_config(self.config.engine_config()?);

        if use_ai {
            if let Some(completer) = build_completer(&self.config)? {
                engine = engine.with_completion(Arc::new(completer));
            }
        }
        Ok(engine)
    }

    fn persist(&self, engine: Engine) -> Result<()> {
        let (calendar, tasks, _) = engine.into_parts();
        self.state.save_calendar(&calendar)?;
        self.state.save_tasks(&tasks)?;
        Ok(())
    }

    pub fn add_task(&self, draft: TaskDraft) -> Result<Task> {
        let mut tasks = self.state.load_tasks()?;
        let due = parse_local(&draft.due).context("--due")?;
        let id = format!("task-{}", tasks.len() + 1);

        let mut task = Task::new(id, self.actor(), draft.title.trim(), due);
        if draft.simple {
            task = task.with_type(TaskType::Simple);
        }
        if let Some(label) = draft.priority.as_deref() {
            let Some(priority) = Priority::from_label(label) else {
                bail!("unknown priority '{label}' (expected high, medium or low)");
            };
            task = task.with_priority(priority);
        }
        if let Some(label) = draft.scale.as_deref() {
            task = task.with_scale(TaskScale::from_label(label));
        }
        if let Some(description) = draft.description {
            task = task.with_description(description);
        }
        task.total_effort_minutes = draft.effort;
        task.session_duration_minutes = draft.session;
        task.max_sessions = draft.max_sessions;

        if task.title.is_empty() {
            bail!("task title is empty");
        }

        tasks.save_task(&task)?;
        self.state.save_tasks(&tasks)?;
        info!(task_id = task.id.as_str(), "task added");
        Ok(task)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut tasks = self.state.load_tasks()?.list_tasks(self.actor())?;
        tasks.sort_by_key(|t| t.due_date);
        Ok(tasks)
    }

    pub fn add_event(&self, draft: EventDraft) -> Result<Event> {
        let start = parse_local(&draft.start).context("--start")?;
        let end = parse_local(&draft.end).context("--end")?;
        if end <= start {
            bail!("event must end after it starts ({} - {})", draft.start, draft.end);
        }

        let mut event = NewEvent::new(self.actor(), draft.title.trim(), start, end);
        if draft.fixed {
            event = event.with_type(EventType::Fixed);
        }
        if let Some(label) = draft.recurrence.as_deref() {
            event = event.with_recurrence(label.parse::<RecurrenceType>()?);
        }

        let mut calendar = self.state.load_calendar()?;
        let event = calendar.create_event(event)?;
        self.state.save_calendar(&calendar)?;
        Ok(event)
    }

    /// All events, or only those in the next `days` days (today counts).
    pub fn list_events(&self, days: Option<i64>) -> Result<Vec<Event>> {
        let calendar = self.state.load_calendar()?;
        let Some(days) = days else {
            return Ok(calendar.all_for_user(self.actor()));
        };

        let tz = self.config.engine_config()?.timezone;
        let today = slotwise_core::time::to_local(self.clock.now(), tz).date();
        let span = u64::try_from(days.max(1)).unwrap_or(1);
        let end = today.checked_add_days(Days::new(span)).unwrap_or(today);
        calendar.list_overlapping(self.actor(), day_start(today), day_start(end))
    }

    pub fn set_prefs(&self, horizon_days: Option<i64>, rules: Option<String>) -> Result<UserPreferences> {
        let mut prefs = self.state.load_preferences()?;
        let mut mine = prefs.get(self.actor());

        if let Some(days) = horizon_days {
            if days <= 0 {
                bail!("--horizon-days must be at least 1");
            }
            mine.horizon_days = Some(days);
        }
        if let Some(rules) = rules {
            let rules = rules.trim().to_string();
            mine.custom_rules = if rules.is_empty() { None } else { Some(rules) };
        }

        prefs.set(self.actor(), mine.clone());
        self.state.save_preferences(&prefs)?;
        Ok(mine)
    }

    pub fn prefs(&self) -> Result<UserPreferences> {
        Ok(self.state.load_preferences()?.get(self.actor()))
    }

    pub fn free_slots(&self, days: i64) -> Result<Vec<TimeSlot>> {
        Ok(self.engine(false)?.free_slots(self.actor(), days)?)
    }

    /// Propose the next cycle and remember it for `accept`.
    pub fn propose(&self, task_id: &str, use_ai: bool) -> Result<ScheduleResult> {
        let engine = self.engine(use_ai)?;
        let result = engine.propose_cycle(self.actor(), task_id)?;

        if result.proposals.is_empty() {
            self.state.clear_last_proposals()?;
        } else {
            self.state.save_last_proposals(&result.proposals)?;
        }
        Ok(result)
    }

    /// Accept the remembered proposals (all, or the 1-based `indices`).
    /// Proposals that were not committed stay available for another try.
    pub fn accept(&self, indices: &[usize]) -> Result<Acceptance> {
        let proposals = self.state.load_last_proposals()?;
        if proposals.is_empty() {
            bail!("No proposals to accept. Run: slotwise propose --task <ID>");
        }
        let numbers = select_numbers(proposals.len(), indices)?;
        let selected: Vec<ScheduleProposal> =
            numbers.iter().map(|n| proposals[n - 1].clone()).collect();

        let mut engine = self.engine(false)?;
        let batch = engine.accept_all(self.actor(), &selected);
        self.persist(engine)?;

        let committed = &numbers[..batch.committed.len()];
        let remaining: Vec<ScheduleProposal> = proposals
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !committed.contains(&(i + 1)))
            .map(|(_, p)| p)
            .collect();
        if remaining.is_empty() {
            self.state.clear_last_proposals()?;
        } else {
            self.state.save_last_proposals(&remaining)?;
        }

        let failed_number = batch
            .failure
            .as_ref()
            .and_then(|f| numbers.get(f.index).copied());
        Ok(Acceptance {
            batch,
            failed_number,
        })
    }

    pub fn sync(&self, task_id: &str) -> Result<Task> {
        let mut engine = self.engine(false)?;
        let task = engine.sync_completed_sessions(self.actor(), task_id)?;
        self.persist(engine)?;
        Ok(task)
    }

    pub fn complete(&self, task_id: &str) -> Result<Task> {
        let mut engine = self.engine(false)?;
        let task = engine.mark_completed(self.actor(), task_id)?;
        self.persist(engine)?;
        Ok(task)
    }

    pub fn pending(&self) -> Result<Vec<Task>> {
        Ok(self.engine(false)?.pending_tasks(self.actor())?)
    }

    /// Per-model availability; with `ping`, after one probe round-trip.
    pub fn models(&self, ping: bool) -> Result<(Option<bool>, Vec<ModelStatus>)> {
        let Some(completer) = build_completer(&self.config)? else {
            bail!(
                "No API key for provider '{}'. Run: slotwise auth paste-key --provider {}",
                self.config.llm.provider,
                self.config.llm.provider
            );
        };
        let answered = ping.then(|| completer.ping());
        Ok((answered, completer.model_statuses()))
    }

    pub fn export_ics(&self) -> Result<String> {
        let calendar = self.state.load_calendar()?;
        let tz = self.config.engine_config()?.timezone;
        sessions_to_ics(&calendar.all_for_user(self.actor()), tz)
    }
}

fn day_start(date: chrono::NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

/// 1-based proposal numbers to accept, in the order given.
fn select_numbers(available: usize, indices: &[usize]) -> Result<Vec<usize>> {
    if indices.is_empty() {
        return Ok((1..=available).collect());
    }
    for &i in indices {
        if i == 0 || i > available {
            bail!("no proposal #{i} (have 1..={available})");
        }
    }
    Ok(indices.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use slotwise_core::{CycleOutcome, TaskStatus};
    use tempfile::TempDir;

    struct FrozenClock(DateTime<Utc>);

    impl Clock for FrozenClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn app(tmp: &TempDir) -> App {
        let state = StateDir::at(tmp.path()).unwrap();
        App::new(state, Config::default())
            .with_clock(Arc::new(FrozenClock(Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap())))
    }

    fn essay() -> TaskDraft {
        TaskDraft {
            title: "Essay".into(),
            due: "2026-03-12 23:00".into(),
            effort: Some(180),
            session: Some(60),
            priority: Some("high".into()),
            ..TaskDraft::default()
        }
    }

    #[test]
    fn add_task_parses_draft() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        let task = app.add_task(essay()).unwrap();

        assert_eq!(task.id, "task-1");
        assert_eq!(task.user_id, "me");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.required_sessions(), 3);
        assert_eq!(app.list_tasks().unwrap().len(), 1);

        let bad = TaskDraft {
            priority: Some("urgent".into()),
            ..essay()
        };
        assert!(app.add_task(bad).is_err());
    }

    #[test]
    fn add_event_validates_interval() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        let draft = EventDraft {
            title: "Lecture".into(),
            start: "2026-03-02 09:00".into(),
            end: "2026-03-02 08:00".into(),
            ..EventDraft::default()
        };
        assert!(app.add_event(draft.clone()).is_err());

        let event = app
            .add_event(EventDraft {
                end: "2026-03-02 10:30".into(),
                recurrence: Some("weekly".into()),
                ..draft
            })
            .unwrap();
        assert_eq!(event.recurrence, RecurrenceType::Weekly);
        assert_eq!(app.list_events(Some(1)).unwrap().len(), 1);
        assert!(app.list_events(Some(1)).unwrap()[0].title == "Lecture");
    }

    #[test]
    fn propose_accept_sync_flow() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        app.add_task(essay()).unwrap();

        let result = app.propose("task-1", false).unwrap();
        assert_eq!(result.outcome, CycleOutcome::Proposed);
        assert_eq!(result.proposals.len(), 3);

        let accepted = app.accept(&[2]).unwrap();
        assert!(accepted.batch.is_complete());
        assert_eq!(accepted.failed_number, None);
        assert_eq!(accepted.batch.committed.len(), 1);
        assert_eq!(accepted.batch.committed[0].start, result.proposals[1].proposed_start);
        // The other two stay available.
        assert_eq!(app.accept(&[]).unwrap().batch.committed.len(), 2);
        assert!(app.accept(&[]).is_err());

        let task = app.sync("task-1").unwrap();
        assert_eq!(task.scheduled_sessions, 3);
        assert_eq!(task.completed_sessions, 0);
        assert_eq!(task.status, TaskStatus::Scheduled);

        let ics = app.export_ics().unwrap();
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 3);
    }

    #[test]
    fn accept_rejects_unknown_index() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        app.add_task(essay()).unwrap();
        app.propose("task-1", false).unwrap();

        assert!(app.accept(&[0]).is_err());
        assert!(app.accept(&[9]).is_err());
    }

    #[test]
    fn accept_stopped_by_conflict_keeps_the_rest() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        app.add_task(essay()).unwrap();
        let proposals = app.propose("task-1", false).unwrap().proposals;
        assert_eq!(proposals.len(), 3);

        let first = &proposals[0];
        app.add_event(EventDraft {
            title: "Clash".into(),
            start: first.proposed_start.format("%Y-%m-%d %H:%M").to_string(),
            end: first.proposed_end.format("%Y-%m-%d %H:%M").to_string(),
            ..EventDraft::default()
        })
        .unwrap();

        let accepted = app.accept(&[3, 1]).unwrap();
        assert_eq!(accepted.batch.committed.len(), 1);
        assert_eq!(accepted.batch.committed[0].start, proposals[2].proposed_start);
        assert_eq!(accepted.failed_number, Some(1));
        let failure = accepted.batch.failure.as_ref().unwrap();
        assert_eq!(failure.index, 1);
        assert_eq!(failure.error.code(), "CONFLICT");

        // Committed session is on disk; the failed and untried ones remain.
        let state = StateDir::at(tmp.path()).unwrap();
        let sessions: Vec<_> = state
            .load_calendar()
            .unwrap()
            .all_for_user("me")
            .into_iter()
            .filter(|e| e.is_ai_generated())
            .collect();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].start, proposals[2].proposed_start);
        assert_eq!(
            state.load_last_proposals().unwrap(),
            vec![proposals[0].clone(), proposals[1].clone()]
        );
        assert_eq!(app.list_tasks().unwrap()[0].scheduled_sessions, 1);
    }

    #[test]
    fn prefs_and_pending() {
        let tmp = TempDir::new().unwrap();
        let app = app(&tmp);
        assert!(app.set_prefs(Some(0), None).is_err());
        let prefs = app.set_prefs(Some(2), Some(" no evenings ".into())).unwrap();
        assert_eq!(prefs.custom_rules.as_deref(), Some("no evenings"));
        assert_eq!(app.prefs().unwrap().horizon_days, Some(2));

        app.add_task(essay()).unwrap();
        assert_eq!(app.pending().unwrap().len(), 1);
        app.complete("task-1").unwrap();
        assert!(app.pending().unwrap().is_empty());
    }
}
