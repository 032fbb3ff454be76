//! # fokus-core
//!
//! Core library for fokus - a focused-study session tracker.
//!
//! This library provides:
//! - Domain types for subjects and study sessions
//! - Database storage layer with SQLite
//! - A session timer state machine with a tokio tick driver
//! - History aggregation (daily stats, subject stats, streaks)
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! The timer owns the live session lifecycle and writes every transition
//! through the store, so a crash never loses more than the current tick.
//! History reads are pure aggregation over the persisted sessions and
//! never mutate anything.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fokus_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use db::Database;
pub use error::{Error, Result};
pub use history::{HistoryService, OverallStats, SubjectStats};
pub use timer::{SessionTimer, SwitchPolicy, Tick, TimerService, TimerState};
pub use types::*;

// Public modules
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod history;
pub mod logging;
pub mod timer;
pub mod types;
