// src/models/mod.rs

//! Domain models for the change tracker.

mod config;
mod pattern;
mod site;

// Re-export all public types
pub use config::{CheckerConfig, Config, FetchConfig, LoggingConfig, NotifyConfig, StrategyKind};
pub use pattern::{Pattern, PatternError};
pub use site::{Site, SiteChange};
