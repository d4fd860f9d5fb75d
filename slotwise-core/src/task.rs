//! Task model: deadline-bound work split into fixed-length sessions.
//!
//! Session counts (required/remaining/unscheduled) are never stored; they are
//! recomputed from the stored effort/session fields on every read.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Upper bound for a single session, in minutes.
pub const MAX_SESSION_MINUTES: i32 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    #[default]
    Simple,
    Deadline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Larger is more important.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 2,
            Priority::Medium => 1,
            Priority::Low => 0,
        }
    }

    /// Single-letter code used in prompts.
    pub fn code(&self) -> char {
        match self {
            Priority::High => 'H',
            Priority::Medium => 'M',
            Priority::Low => 'L',
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "high" | "h" => Some(Priority::High),
            "medium" | "m" => Some(Priority::Medium),
            "low" | "l" => Some(Priority::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Pending,
    Scheduled,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Scheduled => "SCHEDULED",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
        }
    }
}

/// Rough size of a task; supplies effort/session defaults when unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskScale {
    Quick,
    #[default]
    Regular,
    Project,
}

impl TaskScale {
    /// Unknown labels fall back to `Regular`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "quick" => TaskScale::Quick,
            "project" => TaskScale::Project,
            _ => TaskScale::Regular,
        }
    }

    pub fn default_total_effort(&self) -> i32 {
        match self {
            TaskScale::Quick => 30,
            TaskScale::Regular => 120,
            TaskScale::Project => 600,
        }
    }

    pub fn default_session_duration(&self) -> i32 {
        match self {
            TaskScale::Quick => 30,
            TaskScale::Regular => 60,
            TaskScale::Project => 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Local wall-clock deadline.
    pub due_date: NaiveDateTime,

    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<TaskScale>,

    /// Minutes. `None` falls back to the scale default.
    #[serde(default)]
    pub total_effort_minutes: Option<i32>,
    /// Minutes. `None` falls back to the scale default.
    #[serde(default)]
    pub session_duration_minutes: Option<i32>,
    /// Overrides the effort/session division when set.
    #[serde(default)]
    pub max_sessions: Option<i32>,

    #[serde(default)]
    pub scheduled_sessions: i32,
    #[serde(default)]
    pub completed_sessions: i32,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        title: impl Into<String>,
        due_date: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            due_date,
            task_type: TaskType::Deadline,
            priority: Priority::Medium,
            status: TaskStatus::Pending,
            scale: None,
            total_effort_minutes: None,
            session_duration_minutes: None,
            max_sessions: None,
            scheduled_sessions: 0,
            completed_sessions: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task_type = task_type;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_scale(mut self, scale: TaskScale) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_effort(mut self, total_minutes: i32, session_minutes: i32) -> Self {
        self.total_effort_minutes = Some(total_minutes);
        self.session_duration_minutes = Some(session_minutes);
        self
    }

    pub fn with_max_sessions(mut self, max_sessions: i32) -> Self {
        self.max_sessions = Some(max_sessions);
        self
    }

    pub fn with_sessions(mut self, scheduled: i32, completed: i32) -> Self {
        self.scheduled_sessions = scheduled;
        self.completed_sessions = completed;
        self
    }

    pub fn is_deadline(&self) -> bool {
        self.task_type == TaskType::Deadline
    }

    pub fn effective_total_effort(&self) -> i32 {
        self.total_effort_minutes
            .filter(|m| *m > 0)
            .unwrap_or_else(|| match self.scale {
                Some(scale) => scale.default_total_effort(),
                None => 60,
            })
    }

    /// Session length, capped at [`MAX_SESSION_MINUTES`].
    pub fn effective_session_duration(&self) -> i32 {
        let raw = self
            .session_duration_minutes
            .filter(|m| *m > 0)
            .unwrap_or_else(|| match self.scale {
                Some(scale) => scale.default_session_duration(),
                None => 60,
            });
        raw.min(MAX_SESSION_MINUTES)
    }

    pub fn required_sessions(&self) -> i32 {
        required_sessions(
            self.effective_total_effort(),
            self.effective_session_duration(),
            self.max_sessions,
        )
    }

    pub fn remaining_sessions(&self) -> i32 {
        (self.required_sessions() - self.completed_sessions).max(0)
    }

    pub fn unscheduled_sessions(&self) -> i32 {
        (self.required_sessions() - self.scheduled_sessions).max(0)
    }

    pub fn remaining_effort_minutes(&self) -> i32 {
        (self.effective_total_effort() - self.completed_sessions * self.effective_session_duration())
            .max(0)
    }

    pub fn progress_percent(&self) -> i32 {
        let required = self.required_sessions();
        if required <= 0 {
            return 100;
        }
        (self.completed_sessions * 100 / required).min(100)
    }

    pub fn all_sessions_completed(&self) -> bool {
        self.completed_sessions >= self.required_sessions()
    }
}

/// `max_sessions` when set and positive, else `ceil(total / session)`.
pub fn required_sessions(total_effort: i32, session_duration: i32, max_sessions: Option<i32>) -> i32 {
    if let Some(max) = max_sessions.filter(|m| *m > 0) {
        return max;
    }
    if session_duration <= 0 || total_effort <= 0 {
        return 0;
    }
    (total_effort + session_duration - 1) / session_duration
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn due() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(23, 59, 0)
            .unwrap()
    }

    #[test]
    fn test_required_sessions_ceil_division() {
        for (total, session, expected) in [(120, 60, 2), (121, 60, 3), (30, 45, 1), (600, 90, 7)] {
            assert_eq!(required_sessions(total, session, None), expected, "{total}/{session}");
        }
    }

    #[test]
    fn test_max_sessions_overrides() {
        assert_eq!(required_sessions(600, 60, Some(3)), 3);
        let t = Task::new("t1", "u1", "Essay", due())
            .with_effort(600, 60)
            .with_max_sessions(4);
        assert_eq!(t.required_sessions(), 4);
    }

    #[test]
    fn test_session_duration_is_capped() {
        let t = Task::new("t1", "u1", "Thesis", due()).with_effort(600, 240);
        assert_eq!(t.effective_session_duration(), MAX_SESSION_MINUTES);
        assert_eq!(t.required_sessions(), 4);
    }

    #[test]
    fn test_scale_defaults() {
        let quick = Task::new("q", "u1", "Reply", due()).with_scale(TaskScale::Quick);
        assert_eq!(quick.effective_session_duration(), 30);
        assert_eq!(quick.effective_total_effort(), 30);
        assert_eq!(quick.required_sessions(), 1);

        let project = Task::new("p", "u1", "Capstone", due()).with_scale(TaskScale::Project);
        assert_eq!(project.effective_total_effort(), 600);
        assert_eq!(project.effective_session_duration(), 90);
        assert_eq!(project.required_sessions(), 7);

        let none = Task::new("n", "u1", "Misc", due());
        assert_eq!(none.effective_total_effort(), 60);
        assert_eq!(none.effective_session_duration(), 60);

        assert_eq!(TaskScale::from_label("gigantic"), TaskScale::Regular);
    }

    #[test]
    fn test_remaining_and_unscheduled() {
        let t = Task::new("t1", "u1", "Essay", due())
            .with_effort(180, 60)
            .with_sessions(2, 1);
        assert_eq!(t.remaining_sessions(), 2);
        assert_eq!(t.unscheduled_sessions(), 1);
        assert_eq!(t.remaining_effort_minutes(), 120);
        assert_eq!(t.progress_percent(), 33);

        let over = t.clone().with_sessions(5, 4);
        assert_eq!(over.unscheduled_sessions(), 0);
        assert_eq!(over.remaining_sessions(), 0);
        assert_eq!(over.remaining_effort_minutes(), 0);
        assert_eq!(over.progress_percent(), 100);
        assert!(over.all_sessions_completed());
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }
}
