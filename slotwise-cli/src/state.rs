use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use slotwise_core::{MemoryCalendar, MemoryPreferences, MemoryTasks, ScheduleProposal};
use std::fs;
use std::path::{Path, PathBuf};

pub const TASKS_FILE: &str = "tasks.json";
pub const EVENTS_FILE: &str = "events.json";
pub const PREFERENCES_FILE: &str = "preferences.json";
pub const LAST_PROPOSALS_FILE: &str = "last_proposals.json";

/// `$SLOTWISE_HOME`, or `~/.slotwise`.
pub fn slotwise_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SLOTWISE_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".slotwise"))
}

pub fn ensure_slotwise_home() -> Result<PathBuf> {
    let dir = slotwise_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// JSON-backed state directory. One CLI process is the only writer.
#[derive(Debug, Clone)]
pub struct StateDir {
    dir: PathBuf,
}

impl StateDir {
    pub fn open() -> Result<Self> {
        Ok(Self {
            dir: ensure_slotwise_home()?,
        })
    }

    pub fn at(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    pub fn load_tasks(&self) -> Result<MemoryTasks> {
        self.load_or_default(TASKS_FILE)
    }

    pub fn save_tasks(&self, tasks: &MemoryTasks) -> Result<()> {
        self.save(TASKS_FILE, tasks)
    }

    pub fn load_calendar(&self) -> Result<MemoryCalendar> {
        self.load_or_default(EVENTS_FILE)
    }

    pub fn save_calendar(&self, calendar: &MemoryCalendar) -> Result<()> {
        self.save(EVENTS_FILE, calendar)
    }

    pub fn load_preferences(&self) -> Result<MemoryPreferences> {
        self.load_or_default(PREFERENCES_FILE)
    }

    pub fn save_preferences(&self, prefs: &MemoryPreferences) -> Result<()> {
        self.save(PREFERENCES_FILE, prefs)
    }

    pub fn load_last_proposals(&self) -> Result<Vec<ScheduleProposal>> {
        self.load_or_default(LAST_PROPOSALS_FILE)
    }

    pub fn save_last_proposals(&self, proposals: &[ScheduleProposal]) -> Result<()> {
        self.save(LAST_PROPOSALS_FILE, proposals)
    }

    pub fn clear_last_proposals(&self) -> Result<()> {
        let p = self.path(LAST_PROPOSALS_FILE);
        if p.exists() {
            fs::remove_file(&p).with_context(|| format!("remove {}", p.display()))?;
        }
        Ok(())
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T> {
        let p = self.path(file);
        if !p.exists() {
            return Ok(T::default());
        }
        let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))
    }

    fn save<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        write_atomic(&self.path(file), &serde_json::to_string_pretty(value)?)
    }
}

/// Write to a sibling temp file, then rename over `path`.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}
