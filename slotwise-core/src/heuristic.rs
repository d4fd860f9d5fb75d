//! Deterministic greedy allocator used when no completion reply is usable.
//!
//! Walks (date, period) buckets in chronological order, takes the longest slot
//! in each, and sizes the session so the remaining effort is split evenly over
//! the sessions still to place.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;

use crate::period::PeriodKey;
use crate::proposal::ScheduleProposal;
use crate::scoring::{rationale, score_slot};
use crate::slot::TimeSlot;
use crate::strategy::CycleContext;

pub fn allocate(ctx: &CycleContext<'_>) -> Vec<ScheduleProposal> {
    let target = i64::from(ctx.target_sessions);
    if target <= 0 {
        return Vec::new();
    }

    let mut remaining_effort = i64::from(ctx.task.remaining_effort_minutes());
    if remaining_effort <= 0 {
        remaining_effort = ctx.session_duration() * target;
    }

    let mut buckets: BTreeMap<PeriodKey, Vec<TimeSlot>> = BTreeMap::new();
    for slot in ctx.free_slots {
        buckets.entry(slot.period_key()).or_default().push(*slot);
    }

    let urgent = ctx.urgent();
    let mut used: BTreeSet<PeriodKey> = ctx.used_periods.clone();
    let mut proposals = Vec::new();
    let mut allocated = 0_i64;

    for (key, slots) in &buckets {
        let created = proposals.len() as i64;
        if created >= target || allocated >= remaining_effort {
            break;
        }
        if !urgent && used.contains(key) {
            continue;
        }
        let Some(best) = best_slot_in_period(slots, ctx.finder.min_slot_minutes) else {
            continue;
        };

        let minutes = flexible_duration(
            remaining_effort - allocated,
            target - created,
            best.duration_minutes(),
            ctx.finder.min_slot_minutes,
            ctx.finder.max_slot_minutes,
        );
        let session_number = ctx.current_session() + created as i32;

        proposals.push(ScheduleProposal {
            task_id: ctx.task.id.clone(),
            task_title: ctx.task.title.clone(),
            proposed_start: best.start(),
            proposed_end: best.start() + Duration::minutes(minutes),
            explanation: format!(
                "Session {session_number}: {}. Duration {minutes} minutes.",
                rationale(best.start().time())
            ),
            score: score_slot(&best),
            session_number,
            total_sessions: ctx.total_sessions(),
        });

        allocated += minutes;
        used.insert(*key);
    }

    proposals.sort_by_key(|p| p.proposed_start);
    proposals
}

/// Longest slot of at least `min_minutes`; ties go to the higher score, then
/// the earlier start.
pub fn best_slot_in_period(slots: &[TimeSlot], min_minutes: i64) -> Option<TimeSlot> {
    slots
        .iter()
        .filter(|s| s.duration_minutes() >= min_minutes)
        .max_by_key(|s| (s.duration_minutes(), score_slot(s), Reverse(s.start())))
        .copied()
}

/// Even share of the remaining effort, rounded up to a quarter hour, then
/// clamped to `[min_minutes, min(max_minutes, available)]`.
pub fn flexible_duration(
    remaining_effort: i64,
    remaining_sessions: i64,
    available: i64,
    min_minutes: i64,
    max_minutes: i64,
) -> i64 {
    let ceiling = max_minutes.min(available);
    if remaining_sessions <= 0 {
        return ceiling;
    }

    let share = remaining_effort / remaining_sessions;
    let rounded = (share + 14) / 15 * 15;
    rounded.min(ceiling).max(min_minutes)
}
