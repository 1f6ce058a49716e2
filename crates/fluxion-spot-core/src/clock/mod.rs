// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Wall-clock time and one-shot timers.
//!
//! Coordinators never sleep themselves; they arm timers through a
//! [`ClockScheduler`] so tests can drive time by hand.

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Work to run when a timer fires
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Source of "now" and of one-shot timers
pub trait ClockScheduler: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;

    /// Run `callback` once at `instant` (immediately if it already passed)
    fn at(&self, instant: DateTime<Utc>, callback: TimerCallback) -> TimerHandle;

    /// Run `callback` once after `delay`
    fn after(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        self.at(offset(self.now(), delay), callback)
    }
}

/// `instant + delay`, saturating at the latest representable time
pub fn offset(instant: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(delay)
        .ok()
        .and_then(|d| instant.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Cancellation handle for one armed timer.
///
/// Dropping the handle leaves the timer armed; call [`TimerHandle::cancel`].
pub struct TimerHandle {
    due: DateTime<Utc>,
    canceller: Box<dyn FnOnce() + Send + 'static>,
}

impl TimerHandle {
    pub fn new(due: DateTime<Utc>, canceller: impl FnOnce() + Send + 'static) -> Self {
        Self {
            due,
            canceller: Box::new(canceller),
        }
    }

    pub fn due(&self) -> DateTime<Utc> {
        self.due
    }

    /// Disarm the timer. A no-op if it already fired.
    pub fn cancel(self) {
        (self.canceller)();
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").field("due", &self.due).finish_non_exhaustive()
    }
}
