use anyhow::{Context, Result};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use slotwise_core::completion::DEFAULT_COOLDOWN;
use slotwise_core::cycle::DEFAULT_HORIZON_DAYS;
use slotwise_core::time::parse_timezone;
use slotwise_core::{EngineConfig, FinderConfig, DEFAULT_MODELS};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_slotwise_home;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmSection,
    pub scheduling: SchedulingSection,
    pub user: UserSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// "gemini", "openai" or "anthropic"
    pub provider: String,
    /// Tried in order; a failing model cools down before it is retried.
    pub models: Vec<String>,
    /// Overrides the provider's public endpoint (proxies, local gateways).
    pub base_url: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub cooldown_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingSection {
    /// "HH:MM", local time
    pub work_start: String,
    pub work_end: String,
    pub buffer_before_minutes: i64,
    pub buffer_after_minutes: i64,
    pub min_slot_minutes: i64,
    pub max_slot_minutes: i64,
    pub default_horizon_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSection {
    pub id: String,
    /// IANA name, e.g. "Asia/Ho_Chi_Minh"
    pub timezone: String,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            base_url: None,
            temperature: 0.3,
            timeout_secs: 30,
            cooldown_secs: DEFAULT_COOLDOWN.as_secs(),
        }
    }
}

impl Default for SchedulingSection {
    fn default() -> Self {
        let finder = FinderConfig::default();
        Self {
            work_start: finder.work_start.format("%H:%M").to_string(),
            work_end: finder.work_end.format("%H:%M").to_string(),
            buffer_before_minutes: finder.buffer_before_minutes,
            buffer_after_minutes: finder.buffer_after_minutes,
            min_slot_minutes: finder.min_slot_minutes,
            max_slot_minutes: finder.max_slot_minutes,
            default_horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

impl Default for UserSection {
    fn default() -> Self {
        Self {
            id: "me".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let s = &self.scheduling;
        let finder = FinderConfig {
            work_start: parse_clock(&s.work_start).context("scheduling.work_start")?,
            work_end: parse_clock(&s.work_end).context("scheduling.work_end")?,
            buffer_before_minutes: s.buffer_before_minutes.max(0),
            buffer_after_minutes: s.buffer_after_minutes.max(0),
            min_slot_minutes: s.min_slot_minutes.max(1),
            max_slot_minutes: s.max_slot_minutes.max(s.min_slot_minutes.max(1)),
        };
        if finder.work_end <= finder.work_start {
            anyhow::bail!(
                "scheduling.work_end ({}) must be after work_start ({})",
                s.work_end,
                s.work_start
            );
        }

        Ok(EngineConfig {
            finder,
            timezone: parse_timezone(&self.user.timezone).context("user.timezone")?,
            default_horizon_days: if s.default_horizon_days > 0 {
                s.default_horizon_days
            } else {
                DEFAULT_HORIZON_DAYS
            },
        })
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").with_context(|| format!("invalid time '{s}' (expected HH:MM)"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_slotwise_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config_to(p: &Path, cfg: &Config) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&p, &Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}
