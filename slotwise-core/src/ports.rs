//! Collaborator contracts: calendar, task and preference stores.
//!
//! The engine assumes one in-flight commitment per task. Implementations
//! backed by a shared database must serialize writes to the same task and
//! its events (one transaction per `accept_*` call).

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::cycle::DEFAULT_HORIZON_DAYS;
use crate::event::{Event, NewEvent};
use crate::slot::intervals_overlap;
use crate::task::Task;

pub trait CalendarStore {
    /// Every event of `user_id` intersecting `[start, end)`, ordered by start.
    /// Includes all event types.
    fn list_overlapping(
        &self,
        user_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Event>>;

    /// Session events committed for `task_id`.
    fn events_for_task(&self, task_id: &str) -> Result<Vec<Event>>;

    fn create_event(&mut self, event: NewEvent) -> Result<Event>;

    /// Remove an event created by this store. Unknown ids are not an error.
    fn delete_event(&mut self, event_id: &str) -> Result<()>;
}

pub trait TaskStore {
    fn get_task(&self, task_id: &str) -> Result<Option<Task>>;
    fn save_task(&mut self, task: &Task) -> Result<()>;
    fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>>;
}

pub trait PreferenceStore {
    /// `Ok(None)` when the user never set a value.
    fn horizon_days(&self, user_id: &str) -> Result<Option<i64>>;
    fn custom_rules(&self, user_id: &str) -> Result<Option<String>>;
}

/// In-memory calendar. Ids are assigned as `evt-1`, `evt-2`, ...
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryCalendar {
    events: Vec<Event>,
    next_id: u64,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn all_for_user(&self, user_id: &str) -> Vec<Event> {
        let mut out: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.start);
        out
    }
}

impl CalendarStore for MemoryCalendar {
    fn list_overlapping(
        &self,
        user_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<Event>> {
        let mut out: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.user_id == user_id && intervals_overlap(e.start, e.end, start, end))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.start);
        Ok(out)
    }

    fn events_for_task(&self, task_id: &str) -> Result<Vec<Event>> {
        let mut out: Vec<Event> = self
            .events
            .iter()
            .filter(|e| e.belongs_to_task(task_id))
            .cloned()
            .collect();
        out.sort_by_key(|e| e.start);
        Ok(out)
    }

    fn create_event(&mut self, event: NewEvent) -> Result<Event> {
        self.next_id += 1;
        let event = event.into_event(format!("evt-{}", self.next_id));
        self.events.push(event.clone());
        Ok(event)
    }

    fn delete_event(&mut self, event_id: &str) -> Result<()> {
        self.events.retain(|e| e.id != event_id);
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryTasks {
    tasks: BTreeMap<String, Task>,
}

impl MemoryTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl TaskStore for MemoryTasks {
    fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.get(task_id).cloned())
    }

    fn save_task(&mut self, task: &Task) -> Result<()> {
        self.tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn list_tasks(&self, user_id: &str) -> Result<Vec<Task>> {
        Ok(self
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizon_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<String>,
}

impl UserPreferences {
    pub fn effective_horizon_days(&self) -> i64 {
        self.horizon_days
            .filter(|d| *d > 0)
            .unwrap_or(DEFAULT_HORIZON_DAYS)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryPreferences {
    users: BTreeMap<String, UserPreferences>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> UserPreferences {
        self.users.get(user_id).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, user_id: impl Into<String>, prefs: UserPreferences) {
        self.users.insert(user_id.into(), prefs);
    }
}

impl PreferenceStore for MemoryPreferences {
    fn horizon_days(&self, user_id: &str) -> Result<Option<i64>> {
        Ok(self.users.get(user_id).and_then(|p| p.horizon_days))
    }

    fn custom_rules(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.users.get(user_id).and_then(|p| p.custom_rules.clone()))
    }
}
