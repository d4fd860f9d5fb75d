//! Busy-event digest for the completion prompt.
//!
//! Recurring events collapse into one line per (pattern, time range, title);
//! one-off events are listed individually, or per day once there are more
//! than [`SINGLE_EVENT_GROUP_THRESHOLD`] of them. Session events the engine
//! created itself are left out.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};

use crate::event::{Event, RecurrenceType};
use crate::period::Period;
use crate::time::truncate_chars;

pub const SINGLE_EVENT_GROUP_THRESHOLD: usize = 10;

const TIME_FMT: &str = "%H:%M";
const DATE_FMT: &str = "%d/%m";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Recurring {
        recurrence: RecurrenceType,
        start: NaiveTime,
        end: NaiveTime,
        title: String,
    },
    Instance {
        parent_id: String,
        start: NaiveTime,
        end: NaiveTime,
    },
}

/// Returns an empty string when nothing relevant is busy.
pub fn summarize_busy_events(events: &[Event]) -> String {
    // Insertion-ordered grouping: `order` holds first-seen keys.
    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: HashMap<GroupKey, (usize, &Event)> = HashMap::new();
    let mut singles: Vec<&Event> = Vec::new();

    for event in events.iter().filter(|e| !e.is_ai_generated()) {
        let key = if event.recurrence.is_recurring() {
            GroupKey::Recurring {
                recurrence: event.recurrence,
                start: event.start.time(),
                end: event.end.time(),
                title: event.title.clone(),
            }
        } else if let Some(parent) = &event.parent_event_id {
            GroupKey::Instance {
                parent_id: parent.clone(),
                start: event.start.time(),
                end: event.end.time(),
            }
        } else {
            singles.push(event);
            continue;
        };

        groups
            .entry(key.clone())
            .and_modify(|(count, _)| *count += 1)
            .or_insert_with(|| {
                order.push(key);
                (1, event)
            });
    }

    if order.is_empty() && singles.is_empty() {
        return String::new();
    }

    let mut out = String::from("BUSY:\n");

    for key in &order {
        if let Some((count, first)) = groups.get(key) {
            out.push_str(&recurring_line(first, *count));
            out.push('\n');
        }
    }

    if singles.len() > SINGLE_EVENT_GROUP_THRESHOLD {
        for (date, day_events) in group_by_date(&singles) {
            let parts: Vec<String> = day_events
                .iter()
                .map(|e| {
                    format!(
                        "{} {}-{}",
                        Period::of(e.start.time()).code(),
                        e.start.format(TIME_FMT),
                        e.end.format(TIME_FMT)
                    )
                })
                .collect();
            out.push_str(&format!("{}: {}\n", date.format(DATE_FMT), parts.join(", ")));
        }
    } else {
        for e in &singles {
            out.push_str(&format!(
                "{} {} {}-{} {}\n",
                e.start.format(DATE_FMT),
                Period::of(e.start.time()).code(),
                e.start.format(TIME_FMT),
                e.end.format(TIME_FMT),
                truncate_chars(&e.title, 20, 17)
            ));
        }
    }

    out
}

/// "DAILY 08:00-09:30 English class (x7)"
fn recurring_line(first: &Event, occurrences: usize) -> String {
    // Expanded instances carry no pattern of their own and read as REPEAT.
    format!(
        "{} {}-{} {} (x{})",
        first.recurrence.summary_label(first.start),
        first.start.format(TIME_FMT),
        first.end.format(TIME_FMT),
        truncate_chars(&first.title, 15, 12),
        occurrences
    )
}

fn group_by_date<'a>(events: &[&'a Event]) -> Vec<(NaiveDate, Vec<&'a Event>)> {
    let mut out: Vec<(NaiveDate, Vec<&'a Event>)> = Vec::new();
    for e in events {
        let date = e.start.date();
        match out.iter_mut().find(|(d, _)| *d == date) {
            Some((_, list)) => list.push(e),
            None => out.push((date, vec![e])),
        }
    }
    out
}
