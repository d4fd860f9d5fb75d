//! Calendar events as the engine sees them: busy intervals with provenance.

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Immutable constraint (classes, meetings).
    Fixed,
    #[default]
    UserCreated,
    /// Session committed from a proposal; carries `source_task_id`.
    AiGenerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceType {
    #[default]
    None,
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Yearly,
    Weekdays,
}

impl RecurrenceType {
    pub fn is_recurring(&self) -> bool {
        *self != RecurrenceType::None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceType::None => "NONE",
            RecurrenceType::Daily => "DAILY",
            RecurrenceType::Weekly => "WEEKLY",
            RecurrenceType::Biweekly => "BIWEEKLY",
            RecurrenceType::Monthly => "MONTHLY",
            RecurrenceType::Yearly => "YEARLY",
            RecurrenceType::Weekdays => "WEEKDAYS",
        }
    }

    /// Compact label for the busy digest, anchored on an occurrence start.
    /// Patterns without a dedicated label read as "REPEAT".
    pub fn summary_label(&self, start: NaiveDateTime) -> String {
        match self {
            RecurrenceType::Daily => "DAILY".to_string(),
            RecurrenceType::Weekly => {
                format!("WEEKLY {}", start.format("%a").to_string().to_uppercase())
            }
            RecurrenceType::Weekdays => "WEEKDAYS".to_string(),
            RecurrenceType::Monthly => format!("MONTHLY d{}", start.day()),
            RecurrenceType::Yearly => "YEARLY".to_string(),
            RecurrenceType::None | RecurrenceType::Biweekly => "REPEAT".to_string(),
        }
    }
}

impl FromStr for RecurrenceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(RecurrenceType::None),
            "daily" => Ok(RecurrenceType::Daily),
            "weekly" => Ok(RecurrenceType::Weekly),
            "biweekly" => Ok(RecurrenceType::Biweekly),
            "monthly" => Ok(RecurrenceType::Monthly),
            "yearly" => Ok(RecurrenceType::Yearly),
            "weekdays" => Ok(RecurrenceType::Weekdays),
            other => anyhow::bail!("unknown recurrence: {other}"),
        }
    }
}

/// Calendar palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Color {
    Tomato,
    LightPink,
    Tangerine,
    Banana,
    Sage,
    Basil,
    #[default]
    Peacock,
    Blueberry,
    Lavender,
    Grape,
}

impl Color {
    pub fn hex(&self) -> &'static str {
        match self {
            Color::Tomato => "#FF6347",
            Color::LightPink => "#E67C73",
            Color::Tangerine => "#FFA500",
            Color::Banana => "#FFE135",
            Color::Sage => "#BCB88A",
            Color::Basil => "#0B8043",
            Color::Peacock => "#039BE5",
            Color::Blueberry => "#4F86C6",
            Color::Lavender => "#E6E6FA",
            Color::Grape => "#8E24AA",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub event_type: EventType,
    #[serde(default)]
    pub recurrence: RecurrenceType,
    /// Set on expanded instances of a recurring series.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_explanation: Option<String>,
}

impl Event {
    pub fn is_ai_generated(&self) -> bool {
        self.event_type == EventType::AiGenerated
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn belongs_to_task(&self, task_id: &str) -> bool {
        self.is_ai_generated() && self.source_task_id.as_deref() == Some(task_id)
    }
}

/// An event not yet persisted; the calendar store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: Color,
    pub event_type: EventType,
    pub recurrence: RecurrenceType,
    pub parent_event_id: Option<String>,
    pub source_task_id: Option<String>,
    pub ai_explanation: Option<String>,
}

impl NewEvent {
    /// A plain non-recurring event.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            start,
            end,
            color: Color::default(),
            event_type: EventType::UserCreated,
            recurrence: RecurrenceType::None,
            parent_event_id: None,
            source_task_id: None,
            ai_explanation: None,
        }
    }

    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_type = event_type;
        self
    }

    pub fn with_recurrence(mut self, recurrence: RecurrenceType) -> Self {
        self.recurrence = recurrence;
        self
    }

    pub fn with_parent(mut self, parent_event_id: impl Into<String>) -> Self {
        self.parent_event_id = Some(parent_event_id.into());
        self
    }

    pub fn into_event(self, id: impl Into<String>) -> Event {
        Event {
            id: id.into(),
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            start: self.start,
            end: self.end,
            color: self.color,
            event_type: self.event_type,
            recurrence: self.recurrence,
            parent_event_id: self.parent_event_id,
            source_task_id: self.source_task_id,
            ai_explanation: self.ai_explanation,
        }
    }
}
