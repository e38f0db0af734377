// Core modules
pub mod broker;
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod risk;
pub mod runner;
pub mod sim;
pub mod strategy;

// Re-export commonly used types
pub use config::Settings;
pub use error::EngineError;
pub use models::*;
pub use runner::{CycleReport, EntryOutcome, TradingEngine};
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, EngineError>;
