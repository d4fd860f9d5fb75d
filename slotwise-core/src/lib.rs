//! slotwise-core: scheduling engine that places deadline-task sessions into free calendar time

pub mod bookkeeping;
pub mod commit;
pub mod completion;
pub mod cooldown;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod event;
pub mod finder;
pub mod heuristic;
pub mod period;
pub mod ports;
pub mod prompt;
pub mod proposal;
pub mod scoring;
pub mod slot;
pub mod strategy;
pub mod summary;
pub mod task;
pub mod time;

pub use completion::{BackendError, FallbackCompleter, ModelBackend, Prompt, TextCompletion, DEFAULT_MODELS};
pub use cooldown::{Clock, CooldownRegistry, ModelCooldowns, ModelStatus, SystemClock};
pub use engine::{EngineConfig, SchedulingEngine};
pub use error::{Result, ScheduleError};
pub use event::{Color, Event, EventType, NewEvent, RecurrenceType};
pub use finder::{find_free_slots, FinderConfig};
pub use period::{Period, PeriodKey};
pub use ports::{
    CalendarStore, MemoryCalendar, MemoryPreferences, MemoryTasks, PreferenceStore, TaskStore,
    UserPreferences,
};
pub use proposal::{BatchAcceptance, BatchFailure, CycleOutcome, ScheduleProposal, ScheduleResult};
pub use scoring::score_slot;
pub use slot::TimeSlot;
pub use strategy::{AiStrategy, CycleContext, HeuristicStrategy, SlotStrategy};
pub use task::{Priority, Task, TaskScale, TaskStatus, TaskType};
