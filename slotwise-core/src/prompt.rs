//! Prompt builder and reply parser for the completion-backed strategy.
//!
//! The prompt is deliberately terse (one-letter period codes, `dd/mm` dates,
//! at most [`MAX_PROMPT_SLOTS`] numbered slots) to keep token counts flat as
//! calendars fill up. The reply is parsed line by line; anything that does not
//! look like a directive is ignored.

use std::collections::{BTreeSet, HashSet};

use anyhow::Result;
use chrono::{Duration, NaiveDate};
use regex::Regex;

use crate::proposal::ScheduleProposal;
use crate::scoring::score_slot;
use crate::slot::TimeSlot;
use crate::strategy::CycleContext;
use crate::time::truncate_chars;

pub const MAX_PROMPT_SLOTS: usize = 25;
const MIN_SLOTS_PER_DAY: usize = 3;
const DESCRIPTION_LIMIT: usize = 50;
const DEFAULT_EXPLANATION: &str = "AI suggested";

pub const SYSTEM_PROMPT: &str = "\
You are a scheduling assistant that places study and work sessions into a student's free time.

Rules:
1. Prefer high-focus hours: 08:00-11:30, 14:00-17:00, 19:00-22:00
2. Avoid working after 23:00
3. HIGH priority tasks go as early as possible
4. A session never exceeds 150 minutes
5. Spread sessions out, one per day when possible
6. Never pick a slot marked X or one that overlaps a busy event

Reply with one line per chosen slot and nothing else:
SLOT_1: [slot number] | D: [minutes] | R: [short reason]
SLOT_2: [slot number] | D: [minutes] | R: [short reason]
";

/// Slots to show in the prompt, chronological.
///
/// Above the cap, each day keeps its best slots (score plus a length bonus)
/// so later days are not starved by a busy-free first day.
pub fn select_prompt_slots(slots: &[TimeSlot]) -> Vec<TimeSlot> {
    if slots.len() <= MAX_PROMPT_SLOTS {
        return slots.to_vec();
    }

    let mut by_date: Vec<(NaiveDate, Vec<TimeSlot>)> = Vec::new();
    for slot in slots {
        match by_date.iter_mut().find(|(d, _)| *d == slot.date()) {
            Some((_, day)) => day.push(*slot),
            None => by_date.push((slot.date(), vec![*slot])),
        }
    }

    let per_day = MIN_SLOTS_PER_DAY.max(MAX_PROMPT_SLOTS / by_date.len());
    let mut picked = Vec::with_capacity(MAX_PROMPT_SLOTS);

    for (_, mut day) in by_date {
        day.sort_by_key(|s| std::cmp::Reverse(prompt_rank(s)));
        picked.extend(day.into_iter().take(per_day));
        if picked.len() >= MAX_PROMPT_SLOTS {
            break;
        }
    }

    picked.truncate(MAX_PROMPT_SLOTS);
    picked.sort();
    picked
}

fn prompt_rank(slot: &TimeSlot) -> i64 {
    i64::from(score_slot(slot)) + slot.duration_minutes() / 10
}

/// User-side prompt text for `ctx`, listing `slots` as numbered choices.
pub fn build_prompt(ctx: &CycleContext<'_>, slots: &[TimeSlot]) -> String {
    let task = ctx.task;
    let urgent = ctx.urgent();
    let mut out = String::new();

    out.push_str("TASK: ");
    out.push_str(&task.title);
    if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
        out.push_str(" | ");
        out.push_str(&truncate_chars(desc, DESCRIPTION_LIMIT, DESCRIPTION_LIMIT));
    }
    out.push('\n');
    out.push_str(&format!(
        "P:{} DL:{} ({}d) Need:{}m Pick:{}\n\n",
        task.priority.code(),
        task.due_date.format("%d/%m"),
        ctx.days_until_deadline,
        task.remaining_effort_minutes(),
        ctx.target_sessions
    ));

    let rules = ctx.custom_rules.trim();
    if !rules.is_empty() {
        out.push_str(&format!("RULES: {rules}\n\n"));
    }

    if !ctx.busy_summary.is_empty() {
        out.push_str(ctx.busy_summary);
        out.push('\n');
    }

    if !urgent && !ctx.used_periods.is_empty() {
        let keys: Vec<String> = ctx.used_periods.iter().map(|k| k.to_string()).collect();
        out.push_str(&format!("BLOCKED: {}\n\n", keys.join(",")));
    }

    out.push_str(if urgent {
        "SLOTS (URGENT):\n"
    } else {
        "SLOTS (max 1/period):\n"
    });
    for (i, slot) in slots.iter().enumerate() {
        let blocked = !urgent && ctx.used_periods.contains(&slot.period_key());
        out.push_str(&format!(
            "{}. {} {} {}-{} {}m{}\n",
            i + 1,
            slot.start().format("%d/%m"),
            slot.period().code(),
            slot.start().format("%H:%M"),
            slot.end().format("%H:%M"),
            slot.duration_minutes(),
            if blocked { " X" } else { "" }
        ));
    }

    out.push_str("\nFormat: SLOT_X:[num]|D:[min]|R:[reason]\n");
    out.push_str("(M=Morning A=Afternoon E=Evening, X=blocked)\n");
    out
}

/// One parsed reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// 1-based index into the prompt's slot list.
    pub slot: usize,
    pub duration_minutes: Option<i64>,
    pub reason: Option<String>,
}

pub struct ReplyParser {
    slot_re: Regex,
    field_re: Regex,
    number_re: Regex,
}

impl ReplyParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            slot_re: Regex::new(r"(?i)SLOT_\w*\s*:\s*\[?\s*(\d+)")?,
            field_re: Regex::new(r"(?i)^\s*(DURATION|D|REASON|R)\s*:\s*(.*)$")?,
            number_re: Regex::new(r"\d+")?,
        })
    }

    /// Directives in reply order. Malformed lines are dropped.
    pub fn parse(&self, reply: &str) -> Vec<Directive> {
        reply
            .lines()
            .filter(|line| line.contains('|'))
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    fn parse_line(&self, line: &str) -> Option<Directive> {
        let mut parts = line.split('|');
        let head = parts.next()?;
        let slot: usize = self.slot_re.captures(head)?.get(1)?.as_str().parse().ok()?;

        let mut duration_minutes = None;
        let mut reason: Option<String> = None;

        for part in parts {
            match self.field_re.captures(part) {
                Some(caps) => {
                    let tag = caps.get(1).map(|m| m.as_str().to_ascii_uppercase());
                    let value = caps.get(2).map_or("", |m| m.as_str()).trim();
                    match tag.as_deref() {
                        Some("D" | "DURATION") => {
                            duration_minutes = self
                                .number_re
                                .find(value)
                                .and_then(|m| m.as_str().parse().ok());
                        }
                        _ => reason = Some(value.to_string()),
                    }
                }
                // Untagged text reads as the reason if none was given.
                None if reason.is_none() => {
                    let text = part.trim();
                    if !text.is_empty() {
                        reason = Some(text.to_string());
                    }
                }
                None => {}
            }
        }

        Some(Directive {
            slot,
            duration_minutes,
            reason: reason.filter(|r| !r.is_empty()),
        })
    }
}

/// Turn directives into proposals against the slots shown in the prompt.
///
/// Out-of-range and repeated indices are skipped, as are slots in an
/// already-used period unless the task is urgent. At most
/// `ctx.target_sessions` proposals come back, sorted by start and numbered
/// in that order.
pub fn proposals_from_directives(
    ctx: &CycleContext<'_>,
    directives: &[Directive],
    slots: &[TimeSlot],
) -> Vec<ScheduleProposal> {
    let urgent = ctx.urgent();
    let target = usize::try_from(ctx.target_sessions).unwrap_or(0);
    let mut used: BTreeSet<_> = ctx.used_periods.clone();
    let mut seen = HashSet::new();
    let mut proposals = Vec::new();

    for d in directives {
        if proposals.len() >= target {
            break;
        }
        if d.slot == 0 || !seen.insert(d.slot) {
            continue;
        }
        let Some(slot) = slots.get(d.slot - 1) else {
            continue;
        };

        let key = slot.period_key();
        if !urgent && used.contains(&key) {
            continue;
        }

        let requested = d.duration_minutes.unwrap_or(ctx.session_duration());
        let minutes = requested
            .min(ctx.finder.max_slot_minutes)
            .min(slot.duration_minutes())
            .max(ctx.finder.min_slot_minutes);

        proposals.push(ScheduleProposal {
            task_id: ctx.task.id.clone(),
            task_title: ctx.task.title.clone(),
            proposed_start: slot.start(),
            proposed_end: slot.start() + Duration::minutes(minutes),
            explanation: d
                .reason
                .clone()
                .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
            score: score_slot(slot),
            session_number: 0,
            total_sessions: ctx.total_sessions(),
        });
        used.insert(key);
    }

    proposals.sort_by_key(|p| p.proposed_start);
    // Session numbers follow the calendar, not the reply order.
    let first = ctx.current_session();
    for (offset, p) in proposals.iter_mut().enumerate() {
        p.session_number = first + offset as i32;
    }
    proposals
}
