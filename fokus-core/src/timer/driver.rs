//! Periodic tick driver for the session timer
//!
//! The driver is an owned, cancellable resource: at most one tick task
//! exists per [`TimerService`], any prior handle is dropped (and thereby
//! aborted) before a new one is registered, and every transition out of
//! `Running` cancels it. This guarantees a tick can never fire against a
//! deleted session record after `reset()`.

use super::{SessionTimer, Tick, TimerState};
use crate::error::Result;
use crate::types::Subject;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to the spawned 1-second tick task. Aborts the task when dropped.
struct TickDriver {
    handle: JoinHandle<()>,
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Owns a [`SessionTimer`] together with its periodic tick driver.
pub struct TimerService {
    timer: Arc<Mutex<SessionTimer>>,
    driver: Option<TickDriver>,
}

impl TimerService {
    pub fn new(timer: SessionTimer) -> Self {
        Self {
            timer: Arc::new(Mutex::new(timer)),
            driver: None,
        }
    }

    /// Rebind to a subject; adopts or discards per the timer's policy and
    /// starts or cancels the driver to match the resulting state.
    pub fn select_subject(&mut self, subject: Option<Subject>) {
        self.timer.lock().unwrap().select_subject(subject);
        self.sync_driver();
    }

    /// Start, pause, or resume the countdown.
    pub fn toggle(&mut self) -> Result<TimerState> {
        let state = self.timer.lock().unwrap().toggle()?;
        self.sync_driver();
        Ok(state)
    }

    /// Discard the bound session and stop ticking.
    pub fn reset(&mut self) {
        // Cancel before deleting the record so no tick can race the delete
        self.driver = None;
        self.timer.lock().unwrap().reset();
    }

    pub fn state(&self) -> TimerState {
        self.timer.lock().unwrap().state().clone()
    }

    pub fn remaining_secs(&self) -> u32 {
        self.timer.lock().unwrap().remaining_secs()
    }

    pub fn progress(&self) -> f64 {
        self.timer.lock().unwrap().progress()
    }

    /// Align the driver with the timer state: running gets exactly one
    /// driver, everything else gets none.
    fn sync_driver(&mut self) {
        if self.timer.lock().unwrap().state().is_running() {
            self.start_driver();
        } else {
            self.driver = None;
        }
    }

    fn start_driver(&mut self) {
        // Drop (and abort) any prior driver before registering a new one
        self.driver = None;

        let timer = Arc::clone(&self.timer);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick resolves immediately; consume it so the
            // countdown only advances after a full elapsed second.
            interval.tick().await;

            loop {
                interval.tick().await;
                let outcome = timer.lock().unwrap().tick();
                if !matches!(outcome, Tick::Running { .. }) {
                    break;
                }
            }
        });

        self.driver = Some(TickDriver { handle });
    }
}
