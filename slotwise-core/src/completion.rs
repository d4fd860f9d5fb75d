//! Text-completion collaborator: a best-effort `prompt -> reply` call.
//!
//! `FallbackCompleter` walks an ordered model list, skipping models that are
//! cooling down and parking any model whose call fails. It never retries a
//! model within one call, so a completion costs at most `models.len()`
//! round-trips.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cooldown::{Clock, CooldownRegistry, ModelCooldowns, ModelStatus, SystemClock};
use crate::cooldown::{cooldown_until, model_statuses};

/// Ordered default model chain.
pub const DEFAULT_MODELS: [&str; 4] = [
    "gemini-2.5-flash",
    "gemini-2.5-flash-lite",
    "gemini-2.0-flash",
    "gemma-3-27b-it",
];

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// System and user text joined, for backends without a system role.
    pub fn flattened(&self) -> String {
        if self.system.is_empty() {
            return self.user.clone();
        }
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// What the engine sees. `None` covers every failure mode.
pub trait TextCompletion: Send + Sync {
    fn complete(&self, prompt: &Prompt) -> Option<String>;

    /// Per-model availability, for diagnostics.
    fn model_statuses(&self) -> Vec<ModelStatus> {
        Vec::new()
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("request failed: {0}")]
    Failed(String),
}

/// One provider endpoint able to run any model in the chain.
pub trait ModelBackend: Send + Sync {
    fn generate(&self, model: &str, prompt: &Prompt) -> Result<String, BackendError>;
}

pub struct FallbackCompleter {
    backend: Arc<dyn ModelBackend>,
    models: Vec<String>,
    cooldowns: Arc<dyn CooldownRegistry>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
}

impl FallbackCompleter {
    pub fn new(backend: Arc<dyn ModelBackend>, models: Vec<String>) -> Self {
        let cooldowns = Arc::new(ModelCooldowns::new(models.iter().cloned()));
        Self {
            backend,
            models,
            cooldowns,
            clock: Arc::new(SystemClock),
            cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_default_models(backend: Arc<dyn ModelBackend>) -> Self {
        Self::new(backend, DEFAULT_MODELS.iter().map(|m| m.to_string()).collect())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cooldowns(mut self, cooldowns: Arc<dyn CooldownRegistry>) -> Self {
        self.cooldowns = cooldowns;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Short round-trip to check that at least one model answers.
    pub fn ping(&self) -> bool {
        self.complete(&Prompt::new("", "Reply briefly: OK")).is_some()
    }

    fn attempt(&self, model: &str, prompt: &Prompt) -> Option<String> {
        debug!(model, "calling model");
        match self.backend.generate(model, prompt) {
            Ok(text) if !text.trim().is_empty() => {
                info!(model, "model call succeeded");
                Some(text)
            }
            Ok(_) => {
                warn!(model, "model returned an empty reply");
                None
            }
            Err(err) => {
                let until = cooldown_until(self.clock.now(), self.cooldown);
                warn!(model, error = %err, until = %until, "model call failed; cooling down");
                self.cooldowns.mark_rate_limited(model, until);
                None
            }
        }
    }
}

impl TextCompletion for FallbackCompleter {
    fn complete(&self, prompt: &Prompt) -> Option<String> {
        let mut attempted = false;

        for model in &self.models {
            if !self.cooldowns.is_available(model, self.clock.now()) {
                debug!(model, "skipping model in cooldown");
                continue;
            }
            attempted = true;
            if let Some(text) = self.attempt(model, prompt) {
                return Some(text);
            }
        }

        // Everything was cooling down: the last model gets one try.
        if !attempted {
            if let Some(last) = self.models.last() {
                info!(model = last.as_str(), "all models cooling down; trying last model");
                return self.attempt(last, prompt);
            }
        }

        warn!(models = self.models.len(), "all models failed");
        None
    }

    fn model_statuses(&self) -> Vec<ModelStatus> {
        model_statuses(self.cooldowns.as_ref(), &self.models, self.clock.now())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use chrono::{TimeZone, Utc};

    fn models() -> Vec<String> {
        vec!["m1".into(), "m2".into(), "m3".into()]
    }

    fn prompt() -> Prompt {
        Prompt::new("sys", "hello")
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::at(Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()))
    }

    #[test]
    fn test_first_model_wins() {
        let backend = Arc::new(ScriptedBackend::default().reply("m1", "SLOT_1: 1"));
        let c = FallbackCompleter::new(backend.clone(), models()).with_clock(clock());
        assert_eq!(c.complete(&prompt()).as_deref(), Some("SLOT_1: 1"));
        assert_eq!(backend.calls(), vec!["m1"]);
    }

    #[test]
    fn test_failure_parks_model_and_falls_through() {
        let backend = Arc::new(ScriptedBackend::default().fail("m1").reply("m2", "ok"));
        let clock = clock();
        let c = FallbackCompleter::new(backend.clone(), models()).with_clock(clock.clone());

        assert_eq!(c.complete(&prompt()).as_deref(), Some("ok"));
        // m1 is cooling down, so the second call goes straight to m2.
        assert_eq!(c.complete(&prompt()).as_deref(), Some("ok"));
        assert_eq!(backend.calls(), vec!["m1", "m2", "m2"]);

        let statuses = c.model_statuses();
        assert!(!statuses[0].available);
        assert_eq!(statuses[0].cooldown_remaining_secs, 30);

        clock.advance(chrono::Duration::seconds(30));
        assert!(c.model_statuses()[0].available);
    }

    #[test]
    fn test_empty_reply_skips_without_cooldown() {
        let backend = Arc::new(ScriptedBackend::default().reply("m1", "  ").reply("m2", "ok"));
        let c = FallbackCompleter::new(backend, models()).with_clock(clock());
        assert_eq!(c.complete(&prompt()).as_deref(), Some("ok"));
        assert!(c.model_statuses()[0].available);
    }

    #[test]
    fn test_all_cooling_tries_last_once() {
        let backend = Arc::new(ScriptedBackend::default().fail("m1").fail("m2").fail("m3"));
        let c = FallbackCompleter::new(backend.clone(), models()).with_clock(clock());

        assert_eq!(c.complete(&prompt()), None);
        assert_eq!(backend.calls(), vec!["m1", "m2", "m3"]);

        assert_eq!(c.complete(&prompt()), None);
        assert_eq!(backend.calls(), vec!["m1", "m2", "m3", "m3"]);
    }

    #[test]
    fn test_prompt_flattening() {
        assert_eq!(Prompt::new("", "u").flattened(), "u");
        assert_eq!(Prompt::new("s", "u").flattened(), "s\n\nu");
    }
}
