//! Core domain types for fokus
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Subject** | A named study category with a default countdown length |
//! | **Session** | One timed study interval, persisted with its countdown state |
//! | **Active session** | A session with `completed == false` for a subject |
//! | **Studied minutes** | `round((duration - remaining) / 60)` for a session |
//! | **Tick** | One 1-second decrement of the running countdown |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named study category.
///
/// Subjects own zero or more sessions (linked by `Session::subject_id`)
/// and carry the default countdown length used when a new session starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    /// Unique identifier (UUID v4, assigned at creation)
    pub id: String,
    /// Display name, unique among subjects
    pub name: String,
    /// Default countdown length in seconds for new sessions
    pub session_duration_secs: u32,
    /// When this subject was created
    pub created_at: DateTime<Utc>,
}

/// One timed study interval.
///
/// Invariants maintained by the store and the lifecycle controller:
/// - `0 <= remaining_secs <= duration_secs`
/// - `completed == true` implies `end_time` is set and `remaining_secs == 0`
/// - `paused == true` implies `completed == false`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Owning subject; `None` denotes an untracked quick session
    pub subject_id: Option<String>,
    /// When the countdown was started
    pub start_time: DateTime<Utc>,
    /// Set only on completion
    pub end_time: Option<DateTime<Utc>>,
    /// Planned length in seconds, fixed at creation
    pub duration_secs: u32,
    /// Countdown value in seconds
    pub remaining_secs: u32,
    /// Whether the countdown ran to zero
    pub completed: bool,
    /// Whether the countdown is paused (meaningful only while uncompleted)
    pub paused: bool,
}

impl Session {
    /// Minutes actually studied in this session.
    ///
    /// A `remaining_secs` larger than `duration_secs` cannot be produced by
    /// the controller, but aggregation floors it at zero instead of
    /// propagating a negative total.
    pub fn studied_minutes(&self) -> u32 {
        let secs = self.duration_secs.saturating_sub(self.remaining_secs);
        ((secs as f64) / 60.0).round() as u32
    }
}
