//! Proposal-cycle outputs. Nothing here is persisted until accepted.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ScheduleError;
use crate::event::Event;
use crate::slot::TimeSlot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleProposal {
    pub task_id: String,
    pub task_title: String,
    pub proposed_start: NaiveDateTime,
    pub proposed_end: NaiveDateTime,
    pub explanation: String,
    pub score: i32,
    pub session_number: i32,
    pub total_sessions: i32,
}

impl ScheduleProposal {
    pub fn duration_minutes(&self) -> i64 {
        (self.proposed_end - self.proposed_start).num_minutes()
    }

    pub fn slot(&self) -> Option<TimeSlot> {
        TimeSlot::new(self.proposed_start, self.proposed_end)
    }
}

/// Why a cycle produced the proposals it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleOutcome {
    Proposed,
    /// Free time existed but no strategy could place a session in it.
    NoSuitableSlot,
    NothingToSchedule,
    AlreadyCompleted,
    DeadlinePassed,
    NoFreeTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleResult {
    pub task_id: String,
    pub task_title: String,
    pub outcome: CycleOutcome,
    pub message: String,
    pub proposals: Vec<ScheduleProposal>,
    /// Sessions not yet placed on the calendar, before this cycle.
    pub remaining_sessions: i32,
    pub scheduled_in_this_cycle: i32,
    pub can_schedule_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_cycle_date: Option<NaiveDate>,
    /// Name of the strategy that produced `proposals`, if one ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl ScheduleResult {
    /// An empty result carrying only an explanation.
    pub fn empty(
        task_id: impl Into<String>,
        task_title: impl Into<String>,
        outcome: CycleOutcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            task_title: task_title.into(),
            outcome,
            message: message.into(),
            proposals: Vec::new(),
            remaining_sessions: 0,
            scheduled_in_this_cycle: 0,
            can_schedule_more: false,
            next_cycle_date: None,
            strategy: None,
        }
    }

    pub fn with_remaining(mut self, remaining_sessions: i32) -> Self {
        self.remaining_sessions = remaining_sessions;
        self
    }
}

/// The failure that stopped a batch acceptance.
#[derive(Debug)]
pub struct BatchFailure {
    /// Position in the caller-supplied batch.
    pub index: usize,
    pub error: ScheduleError,
}

/// Result of accepting proposals in order, stopping at the first failure.
/// Events in `committed` stay committed regardless of `failure`.
#[derive(Debug, Default)]
pub struct BatchAcceptance {
    pub committed: Vec<Event>,
    pub failure: Option<BatchFailure>,
}

impl BatchAcceptance {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}
