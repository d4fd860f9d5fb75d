//! Per-model availability windows for the completion collaborator.
//!
//! A model that fails is parked for a fixed cooldown. The registry holds one
//! `available_after` instant per model id; each slot is an atomic so updates
//! from concurrent callers never need a shared lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Source of "now". Swapped for a fixed clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub trait CooldownRegistry: Send + Sync {
    /// `None` when the model has never been parked (or is unknown).
    fn available_after(&self, model: &str) -> Option<DateTime<Utc>>;

    /// Park `model` until `until`. Never shortens an existing cooldown.
    fn mark_rate_limited(&self, model: &str, until: DateTime<Utc>);

    fn is_available(&self, model: &str, now: DateTime<Utc>) -> bool {
        self.available_after(model).is_none_or(|after| now >= after)
    }
}

/// Lock-free registry over a fixed model list.
///
/// Keys are fixed at construction; marking an unknown model is a no-op.
#[derive(Debug)]
pub struct ModelCooldowns {
    // Epoch millis; 0 = never parked.
    slots: HashMap<String, AtomicI64>,
}

impl ModelCooldowns {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: models
                .into_iter()
                .map(|m| (m.into(), AtomicI64::new(0)))
                .collect(),
        }
    }
}

impl CooldownRegistry for ModelCooldowns {
    fn available_after(&self, model: &str) -> Option<DateTime<Utc>> {
        let millis = self.slots.get(model)?.load(Ordering::Acquire);
        if millis == 0 {
            return None;
        }
        DateTime::from_timestamp_millis(millis)
    }

    fn mark_rate_limited(&self, model: &str, until: DateTime<Utc>) {
        if let Some(slot) = self.slots.get(model) {
            slot.fetch_max(until.timestamp_millis(), Ordering::AcqRel);
        }
    }
}

/// Diagnostic view of one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStatus {
    pub model: String,
    pub available: bool,
    pub cooldown_remaining_secs: i64,
}

/// Status of each model in `models`, in order.
pub fn model_statuses(
    registry: &dyn CooldownRegistry,
    models: &[String],
    now: DateTime<Utc>,
) -> Vec<ModelStatus> {
    models
        .iter()
        .map(|model| {
            let remaining = registry
                .available_after(model)
                .map(|after| (after - now).num_seconds().max(0))
                .unwrap_or(0);
            ModelStatus {
                model: model.clone(),
                available: registry.is_available(model, now),
                cooldown_remaining_secs: remaining,
            }
        })
        .collect()
}

/// `now + cooldown`, saturating on overflow.
pub fn cooldown_until(now: DateTime<Utc>, cooldown: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(cooldown)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_fresh_models_are_available() {
        let reg = ModelCooldowns::new(["a", "b"]);
        assert!(reg.is_available("a", t0()));
        assert_eq!(reg.available_after("a"), None);
    }

    #[test]
    fn test_cooldown_expires() {
        let reg = ModelCooldowns::new(["a", "b"]);
        reg.mark_rate_limited("a", cooldown_until(t0(), Duration::from_secs(30)));

        assert!(!reg.is_available("a", t0()));
        assert!(!reg.is_available("a", t0() + chrono::Duration::seconds(29)));
        assert!(reg.is_available("a", t0() + chrono::Duration::seconds(30)));
        // Independent per model.
        assert!(reg.is_available("b", t0()));
    }

    #[test]
    fn test_mark_never_shortens() {
        let reg = ModelCooldowns::new(["a"]);
        reg.mark_rate_limited("a", t0() + chrono::Duration::seconds(60));
        reg.mark_rate_limited("a", t0() + chrono::Duration::seconds(10));
        assert_eq!(reg.available_after("a"), Some(t0() + chrono::Duration::seconds(60)));
    }

    #[test]
    fn test_unknown_model_is_ignored() {
        let reg = ModelCooldowns::new(["a"]);
        reg.mark_rate_limited("zzz", t0() + chrono::Duration::seconds(60));
        assert!(reg.is_available("zzz", t0()));
    }

    #[test]
    fn test_statuses_report_remaining() {
        let reg = ModelCooldowns::new(["a", "b"]);
        reg.mark_rate_limited("b", t0() + chrono::Duration::seconds(30));
        let models = vec!["a".to_string(), "b".to_string()];
        let statuses = model_statuses(&reg, &models, t0() + chrono::Duration::seconds(12));
        assert_eq!(
            statuses,
            vec![
                ModelStatus { model: "a".into(), available: true, cooldown_remaining_secs: 0 },
                ModelStatus { model: "b".into(), available: false, cooldown_remaining_secs: 18 },
            ]
        );
    }

    #[test]
    fn test_concurrent_marks_keep_latest() {
        let reg = Arc::new(ModelCooldowns::new(["a"]));
        let handles: Vec<_> = (1..=8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    reg.mark_rate_limited("a", t0() + chrono::Duration::seconds(i * 10));
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.available_after("a"), Some(t0() + chrono::Duration::seconds(80)));
    }
}
