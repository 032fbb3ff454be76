//! Session lifecycle controller
//!
//! [`SessionTimer`] is the synchronous state machine: it owns the in-memory
//! countdown and issues store commands to keep the persisted session record
//! in step with it. [`TimerService`] wraps it with the 1-second tick driver.
//!
//! Store failures on pause/resume/complete/delete never interrupt the
//! in-memory countdown; they are logged and the state machine proceeds.
//! Session *creation* failure is the one exception: with nothing persisted
//! to count against, the timer does not start.

mod driver;

pub use driver::TimerService;

use crate::db::Database;
use crate::error::Result;
use crate::types::Subject;
use serde::Deserialize;
use std::sync::Arc;

/// Countdown state, a closed variant set.
///
/// Illegal flag combinations (paused and completed at once, a countdown
/// with no session) are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerState {
    /// No countdown running, no session bound
    Idle,
    /// Counting down against a persisted session
    Running { session_id: String },
    /// Countdown frozen, session persisted with its remaining time
    Paused { session_id: String },
}

impl TimerState {
    pub fn is_running(&self) -> bool {
        matches!(self, TimerState::Running { .. })
    }

    /// The bound session id, if a session is bound
    pub fn session_id(&self) -> Option<&str> {
        match self {
            TimerState::Idle => None,
            TimerState::Running { session_id } | TimerState::Paused { session_id } => {
                Some(session_id)
            }
        }
    }
}

/// What to do with an existing active session when a subject is selected.
///
/// The original behavior is `DiscardActive`: switching to a subject throws
/// away its uncompleted session and starts a fresh countdown. `ResumeActive`
/// adopts the stored session's remaining/paused state instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchPolicy {
    #[default]
    DiscardActive,
    ResumeActive,
}

/// Outcome of a single tick, consumed by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running; nothing happened
    Idle,
    /// Countdown advanced
    Running { remaining_secs: u32 },
    /// Countdown reached zero; session completed, timer back to idle
    Completed,
}

/// The session lifecycle state machine.
pub struct SessionTimer {
    db: Arc<Database>,
    policy: SwitchPolicy,
    subject: Option<Subject>,
    state: TimerState,
    /// Planned length of the current countdown in seconds
    duration_secs: u32,
    /// In-memory countdown value; the persisted record lags behind this
    /// while running and is synchronized on pause/completion
    remaining_secs: u32,
}

impl SessionTimer {
    pub fn new(db: Arc<Database>, policy: SwitchPolicy) -> Self {
        Self {
            db,
            policy,
            subject: None,
            state: TimerState::Idle,
            duration_secs: 0,
            remaining_secs: 0,
        }
    }

    /// Rebind the last-selected subject from the stored preference.
    pub fn restore_last_subject(&mut self) {
        let restored = match self.db.last_subject() {
            Ok(Some(id)) => match self.db.get_subject(&id) {
                Ok(subject) => subject,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load last-selected subject");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read last-subject preference");
                None
            }
        };

        if let Some(subject) = restored {
            self.select_subject(Some(subject));
        }
    }

    /// Rebind the controller to a subject (or to none).
    ///
    /// Under [`SwitchPolicy::ResumeActive`] an existing active session for
    /// the new subject is adopted as the controller's state; under
    /// [`SwitchPolicy::DiscardActive`] it is deleted and the countdown
    /// resets to the subject's full duration. Store failures here are
    /// non-fatal: the controller falls back to a fresh idle countdown.
    pub fn select_subject(&mut self, subject: Option<Subject>) {
        if let Err(e) = self
            .db
            .set_last_subject(subject.as_ref().map(|s| s.id.as_str()))
        {
            tracing::warn!(error = %e, "Failed to persist subject selection");
        }

        let Some(subject) = subject else {
            tracing::debug!("Subject cleared");
            self.subject = None;
            self.state = TimerState::Idle;
            self.duration_secs = 0;
            self.remaining_secs = 0;
            return;
        };

        let active = match self.db.get_active_session_for_subject(&subject.id) {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(error = %e, subject = %subject.name, "Active-session lookup failed");
                None
            }
        };

        match (self.policy, active) {
            (SwitchPolicy::ResumeActive, Some(session)) => {
                tracing::info!(
                    subject = %subject.name,
                    session_id = %session.id,
                    remaining_secs = session.remaining_secs,
                    paused = session.paused,
                    "Adopting active session"
                );
                self.duration_secs = session.duration_secs;
                self.remaining_secs = session.remaining_secs;
                self.state = if session.paused {
                    TimerState::Paused {
                        session_id: session.id,
                    }
                } else {
                    TimerState::Running {
                        session_id: session.id,
                    }
                };
            }
            (SwitchPolicy::DiscardActive, Some(session)) => {
                tracing::info!(
                    subject = %subject.name,
                    session_id = %session.id,
                    "Discarding active session on subject switch"
                );
                if let Err(e) = self.db.delete_session(&session.id) {
                    tracing::warn!(error = %e, "Failed to delete discarded session");
                }
                self.reset_countdown(&subject);
            }
            (_, None) => {
                self.reset_countdown(&subject);
            }
        }

        self.subject = Some(subject);
    }

    fn reset_countdown(&mut self, subject: &Subject) {
        self.state = TimerState::Idle;
        self.duration_secs = subject.session_duration_secs;
        self.remaining_secs = subject.session_duration_secs;
    }

    /// Start, pause, or resume the countdown.
    ///
    /// Idle -> Running creates the backing session (`duration` fixed to the
    /// current remaining time); a creation failure keeps the timer idle and
    /// propagates. Running -> Paused and Paused -> Running always transition
    /// in memory; a failed store write is logged.
    ///
    /// No-op when no subject is bound.
    pub fn toggle(&mut self) -> Result<TimerState> {
        let Some(subject) = self.subject.clone() else {
            tracing::debug!("Toggle ignored: no subject selected");
            return Ok(self.state.clone());
        };

        match self.state.clone() {
            TimerState::Idle => {
                let session = self
                    .db
                    .create_session(Some(&subject.id), self.remaining_secs)?;
                tracing::info!(
                    subject = %subject.name,
                    session_id = %session.id,
                    duration_secs = session.duration_secs,
                    "Session started"
                );
                self.state = TimerState::Running {
                    session_id: session.id,
                };
            }
            TimerState::Running { session_id } => {
                match self.db.pause_session(&session_id, self.remaining_secs) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::warn!(session_id = %session_id, "Pause target already gone")
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to persist pause"),
                }
                self.state = TimerState::Paused { session_id };
            }
            TimerState::Paused { session_id } => {
                match self.db.resume_session(&session_id) {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        tracing::warn!(session_id = %session_id, "Resume target already gone")
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to persist resume"),
                }
                self.state = TimerState::Running { session_id };
            }
        }

        Ok(self.state.clone())
    }

    /// Advance the countdown by one second.
    ///
    /// At zero the bound session is completed, the countdown resets to the
    /// subject's full duration, and the timer returns to idle. Errors never
    /// escape this path.
    pub fn tick(&mut self) -> Tick {
        let TimerState::Running { session_id } = self.state.clone() else {
            return Tick::Idle;
        };

        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Tick::Running {
                remaining_secs: self.remaining_secs,
            };
        }

        match self.db.complete_session(&session_id) {
            Ok(Some(_)) => {
                tracing::info!(session_id = %session_id, "Session completed")
            }
            Ok(None) => tracing::warn!(session_id = %session_id, "Completion target already gone"),
            Err(e) => tracing::warn!(error = %e, "Failed to persist completion"),
        }

        self.duration_secs = self.full_duration();
        self.remaining_secs = self.duration_secs;
        self.state = TimerState::Idle;
        Tick::Completed
    }

    /// Discard the bound session and restore the full countdown.
    ///
    /// Safe and idempotent from any state, including mid-tick.
    pub fn reset(&mut self) {
        if let Some(session_id) = self.state.session_id() {
            match self.db.delete_session(session_id) {
                Ok(true) => tracing::info!(session_id, "Session discarded on reset"),
                Ok(false) => {}
                Err(e) => tracing::warn!(error = %e, "Failed to delete session on reset"),
            }
        }

        self.duration_secs = self.full_duration();
        self.remaining_secs = self.duration_secs;
        self.state = TimerState::Idle;
    }

    fn full_duration(&self) -> u32 {
        self.subject
            .as_ref()
            .map(|s| s.session_duration_secs)
            .unwrap_or(0)
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Fraction of the countdown still remaining, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration_secs == 0 {
            1.0
        } else {
            f64::from(self.remaining_secs) / f64::from(self.duration_secs)
        }
    }
}
