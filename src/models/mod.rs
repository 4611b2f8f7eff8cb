// src/models/mod.rs

//! Domain models for the bulletin monitor.

mod bulletin;
mod config;
mod report;

// Re-export all public types
pub use bulletin::{Bulletin, BulletinUpdate};
pub use config::{
    Config, EmailConfig, EmailTransport, GuardConfig, HttpConfig, LimitsConfig, SourceConfig,
    StorageConfig, parse_bool,
};
pub use report::{InvocationResult, RunSummary};
