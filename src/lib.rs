//! Confluence - multi-source trading signal aggregation with adaptive source weighting

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result, SourceUnavailable};
pub use services::{SignalEngine, SqliteStore, TraderScheduler, TraderStore};
pub use types::*;
