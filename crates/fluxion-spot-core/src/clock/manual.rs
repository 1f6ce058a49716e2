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

//! Hand-driven clock for deterministic tests and replays

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use super::{ClockScheduler, TimerCallback, TimerHandle};

struct PendingTimer {
    due: DateTime<Utc>,
    callback: TimerCallback,
}

struct ManualState {
    now: DateTime<Utc>,
    next_id: u64,
    timers: BTreeMap<u64, PendingTimer>,
}

impl fmt::Debug for ManualState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualState")
            .field("now", &self.now)
            .field("pending", &self.timers.len())
            .finish()
    }
}

/// Clock whose time only moves when told to.
///
/// Timers fire from [`ManualClock::advance`], in due order, with the clock set
/// to each timer's due time while its callback runs.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now,
                next_id: 0,
                timers: BTreeMap::new(),
            })),
        }
    }

    /// Jump to `now` without firing anything
    pub fn set_now(&self, now: DateTime<Utc>) {
        self.state.lock().now = now;
    }

    /// Number of armed timers
    pub fn pending(&self) -> usize {
        self.state.lock().timers.len()
    }

    /// Due times of armed timers, earliest first
    pub fn pending_due(&self) -> Vec<DateTime<Utc>> {
        let mut due: Vec<_> = self.state.lock().timers.values().map(|t| t.due).collect();
        due.sort();
        due
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.state.lock().timers.values().map(|t| t.due).min()
    }

    /// Move time forward by `delta`, firing every timer that falls due on the way.
    ///
    /// Returns the number of callbacks run. Timers armed by a callback fire in
    /// the same call when they are due before the target.
    pub fn advance(&self, delta: TimeDelta) -> usize {
        let target = self.state.lock().now + delta;
        self.advance_to(target)
    }

    pub fn advance_to(&self, target: DateTime<Utc>) -> usize {
        let mut fired = 0;
        loop {
            let next = {
                let mut state = self.state.lock();
                let due_id = state
                    .timers
                    .iter()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(id, t)| (t.due, **id))
                    .map(|(id, _)| *id);
                match due_id.and_then(|id| state.timers.remove(&id)) {
                    Some(timer) => {
                        if timer.due > state.now {
                            state.now = timer.due;
                        }
                        Some(timer.callback)
                    }
                    None => {
                        if target > state.now {
                            state.now = target;
                        }
                        None
                    }
                }
            };
            // The lock is released here so callbacks may arm new timers.
            match next {
                Some(callback) => {
                    callback();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }
}

impl ClockScheduler for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.state.lock().now
    }

    fn at(&self, instant: DateTime<Utc>, callback: TimerCallback) -> TimerHandle {
        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.timers.insert(
                id,
                PendingTimer {
                    due: instant,
                    callback,
                },
            );
            id
        };
        let state = Arc::downgrade(&self.state);
        TimerHandle::new(instant, move || {
            if let Some(state) = state.upgrade() {
                state.lock().timers.remove(&id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn fires_in_due_order() {
        let clock = ManualClock::new(start());
        let log = Arc::new(Mutex::new(Vec::new()));
        for (label, secs) in [("b", 20), ("a", 10), ("c", 30)] {
            let log = log.clone();
            clock.after(
                std::time::Duration::from_secs(secs),
                Box::new(move || log.lock().push(label)),
            );
        }

        assert_eq!(clock.advance(TimeDelta::seconds(25)), 2);
        assert_eq!(*log.lock(), vec!["a", "b"]);
        assert_eq!(clock.now(), start() + TimeDelta::seconds(25));
        assert_eq!(clock.pending(), 1);
    }

    #[test]
    fn cancel_removes_timer() {
        let clock = ManualClock::new(start());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let handle = clock.after(
            std::time::Duration::from_secs(5),
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(clock.pending(), 1);
        handle.cancel();
        assert_eq!(clock.pending(), 0);
        clock.advance(TimeDelta::minutes(1));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callbacks_can_rearm() {
        let clock = ManualClock::new(start());
        let count = Arc::new(AtomicUsize::new(0));

        fn arm(clock: &ManualClock, count: Arc<AtomicUsize>) {
            let inner = clock.clone();
            clock.after(
                std::time::Duration::from_secs(60),
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                    arm(&inner, count);
                }),
            );
        }
        arm(&clock, count.clone());

        clock.advance(TimeDelta::minutes(5));
        assert_eq!(count.load(Ordering::SeqCst), 5);
        assert_eq!(clock.pending(), 1);
    }
}
