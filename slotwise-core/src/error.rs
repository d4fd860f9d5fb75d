//! Failures that abort a single engine operation.
//!
//! Expected scheduling outcomes (deadline passed, no free time, nothing left
//! to schedule) are not errors; they come back as `ScheduleResult`s.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("task {0} is not a deadline task")]
    InvalidTaskType(String),

    #[error("slot {start} - {end} overlaps existing event '{conflicting}'")]
    Conflict {
        start: NaiveDateTime,
        end: NaiveDateTime,
        conflicting: String,
    },

    #[error("all sessions already scheduled ({scheduled}/{required})")]
    QuotaExceeded { scheduled: i32, required: i32 },

    #[error("user {actor} does not own task {task_id}")]
    Unauthorized { actor: String, task_id: String },

    #[error("invalid interval: {start} - {end}")]
    InvalidInterval {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl ScheduleError {
    pub fn task_not_found(id: impl Into<String>) -> Self {
        ScheduleError::NotFound {
            entity: "task",
            id: id.into(),
        }
    }

    /// Stable taxonomy code for callers and logs.
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::NotFound { .. } => "NOT_FOUND",
            ScheduleError::InvalidTaskType(_) => "INVALID_TASK_TYPE",
            ScheduleError::Conflict { .. } => "CONFLICT",
            ScheduleError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            ScheduleError::Unauthorized { .. } => "UNAUTHORIZED",
            ScheduleError::InvalidInterval { .. } => "INVALID_INTERVAL",
            ScheduleError::Storage(_) => "STORAGE",
        }
    }
}

pub type Result<T, E = ScheduleError> = std::result::Result<T, E>;
