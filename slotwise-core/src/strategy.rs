//! Slot-selection strategies and their dispatch order.
//!
//! Strategies are tried in order; the first one returning a non-empty
//! proposal list wins. An empty list is a normal outcome, never an error.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::completion::{Prompt, TextCompletion};
use crate::cycle::is_urgent;
use crate::finder::FinderConfig;
use crate::heuristic;
use crate::period::PeriodKey;
use crate::proposal::ScheduleProposal;
use crate::prompt::{
    build_prompt, proposals_from_directives, select_prompt_slots, ReplyParser, SYSTEM_PROMPT,
};
use crate::slot::TimeSlot;
use crate::task::Task;

/// Everything a strategy may consult for one task in one cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleContext<'a> {
    pub task: &'a Task,
    pub free_slots: &'a [TimeSlot],
    pub target_sessions: i32,
    pub days_until_deadline: i64,
    /// Periods that already hold a session of this task.
    pub used_periods: &'a BTreeSet<PeriodKey>,
    pub busy_summary: &'a str,
    pub custom_rules: &'a str,
    pub finder: &'a FinderConfig,
}

impl CycleContext<'_> {
    pub fn urgent(&self) -> bool {
        is_urgent(self.days_until_deadline)
    }

    pub fn session_duration(&self) -> i64 {
        i64::from(self.task.effective_session_duration())
    }

    /// Ordinal of the first session proposed this cycle.
    pub fn current_session(&self) -> i32 {
        self.task.scheduled_sessions + 1
    }

    pub fn total_sessions(&self) -> i32 {
        self.task.required_sessions()
    }
}

pub trait SlotStrategy {
    fn name(&self) -> &'static str;
    fn propose(&self, ctx: &CycleContext<'_>) -> Vec<ScheduleProposal>;
}

/// Asks the completion collaborator to pick slots.
pub struct AiStrategy<'a> {
    completion: &'a dyn TextCompletion,
}

impl<'a> AiStrategy<'a> {
    pub fn new(completion: &'a dyn TextCompletion) -> Self {
        Self { completion }
    }
}

impl SlotStrategy for AiStrategy<'_> {
    fn name(&self) -> &'static str {
        "ai"
    }

    fn propose(&self, ctx: &CycleContext<'_>) -> Vec<ScheduleProposal> {
        let parser = match ReplyParser::new() {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "reply parser unavailable");
                return Vec::new();
            }
        };

        let slots = select_prompt_slots(ctx.free_slots);
        let prompt = Prompt::new(SYSTEM_PROMPT, build_prompt(ctx, &slots));
        debug!(task_id = ctx.task.id.as_str(), slots = slots.len(), "prompting completion");

        let Some(reply) = self.completion.complete(&prompt) else {
            warn!(task_id = ctx.task.id.as_str(), "completion unavailable");
            return Vec::new();
        };
        debug!(reply = reply.as_str(), "completion reply");

        let directives = parser.parse(&reply);
        let proposals = proposals_from_directives(ctx, &directives, &slots);
        if proposals.is_empty() {
            warn!(
                task_id = ctx.task.id.as_str(),
                directives = directives.len(),
                "completion reply had no usable directives"
            );
        }
        proposals
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicStrategy;

impl SlotStrategy for HeuristicStrategy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn propose(&self, ctx: &CycleContext<'_>) -> Vec<ScheduleProposal> {
        heuristic::allocate(ctx)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Strategy that produced `proposals`; the last one tried if all came back empty.
    pub strategy: Option<&'static str>,
    pub proposals: Vec<ScheduleProposal>,
}

/// Run `strategies` in order until one proposes something.
pub fn select_proposals(strategies: &[&dyn SlotStrategy], ctx: &CycleContext<'_>) -> Selection {
    let mut last = None;

    for strategy in strategies {
        let proposals = strategy.propose(ctx);
        last = Some(strategy.name());
        if !proposals.is_empty() {
            info!(
                task_id = ctx.task.id.as_str(),
                strategy = strategy.name(),
                proposals = proposals.len(),
                "strategy produced proposals"
            );
            return Selection {
                strategy: last,
                proposals,
            };
        }
        info!(
            task_id = ctx.task.id.as_str(),
            strategy = strategy.name(),
            "strategy produced nothing; falling through"
        );
    }

    Selection {
        strategy: last,
        proposals: Vec::new(),
    }
}
