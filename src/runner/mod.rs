// Cycle runner: one decision cycle in order plus the entry cooldown
pub mod engine;
pub mod scheduler;

pub use engine::{ActionOutcome, CycleReport, EntryOutcome, TradingEngine};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, SessionWindow};
