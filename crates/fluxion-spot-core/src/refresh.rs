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

//! Retry/backoff refresh loop shared by the source coordinators.
//!
//! One [`RefreshScheduler`] drives one upstream: it runs the fetch under a
//! timeout, keeps the last good result, and arms exactly one timer for either
//! the next normal refresh or the next retry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fluxion_spot_types::Commodity;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use crate::clock::{self, ClockScheduler, TimerHandle};
use crate::error::SourceError;
use crate::listeners::{Listeners, Subscription};

/// Which upstream a scheduler polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SourceId {
    Spot(Commodity),
    Fx,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Spot(commodity) => write!(f, "spot/{commodity}"),
            SourceId::Fx => f.write_str("fx"),
        }
    }
}

/// Timing knobs shared by all schedulers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub fetch_timeout: Duration,
    /// Upper bound on a retry delay. `None` leaves backoff bounded only by the next normal refresh.
    pub max_retry_delay: Option<Duration>,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_retry_delay: None,
        }
    }
}

/// Health of one upstream as consumers see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    /// No fetch has succeeded yet. Not an error: this is the normal startup state.
    NeverFetched {
        attempts: u32,
        last_error: Option<SourceError>,
    },
    /// The latest fetch succeeded
    Ok { at: DateTime<Utc> },
    /// Data was obtained before but the latest fetches failed; the last good data is still served
    Failing {
        attempts: u32,
        since: DateTime<Utc>,
        last_error: SourceError,
    },
}

impl SourceStatus {
    /// True only for a failure after data was once available
    pub fn is_failing(&self) -> bool {
        matches!(self, SourceStatus::Failing { .. })
    }
}

/// The part of a coordinator that knows what to fetch and when the data goes stale
#[async_trait]
pub trait RefreshJob: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    async fn fetch(&self, now: DateTime<Utc>) -> Result<Self::Output, SourceError>;

    /// When to refresh next after a successful fetch at `now`
    fn next_refresh(&self, data: &Self::Output, now: DateTime<Utc>) -> DateTime<Utc>;
}

struct RefreshState<T> {
    data: Option<Arc<T>>,
    status: SourceStatus,
    attempts: u32,
    next_normal: Option<DateTime<Utc>>,
}

pub struct RefreshScheduler<J: RefreshJob> {
    id: SourceId,
    job: Arc<J>,
    clock: Arc<dyn ClockScheduler>,
    policy: RefreshPolicy,
    state: Mutex<RefreshState<J::Output>>,
    timer: Mutex<Option<TimerHandle>>,
    /// Serializes refreshes of this scheduler
    running: tokio::sync::Mutex<()>,
    stopped: AtomicBool,
    listeners: Listeners<()>,
}

impl<J: RefreshJob> RefreshScheduler<J> {
    pub fn new(id: SourceId, job: J, clock: Arc<dyn ClockScheduler>, policy: RefreshPolicy) -> Arc<Self> {
        Arc::new(Self {
            id,
            job: Arc::new(job),
            clock,
            policy,
            state: Mutex::new(RefreshState {
                data: None,
                status: SourceStatus::NeverFetched {
                    attempts: 0,
                    last_error: None,
                },
                attempts: 0,
                next_normal: None,
            }),
            timer: Mutex::new(None),
            running: tokio::sync::Mutex::new(()),
            stopped: AtomicBool::new(false),
            listeners: Listeners::new(),
        })
    }

    pub fn id(&self) -> SourceId {
        self.id
    }

    pub fn job(&self) -> &J {
        &self.job
    }

    pub fn clock(&self) -> &Arc<dyn ClockScheduler> {
        &self.clock
    }

    /// Last successfully fetched data
    pub fn data(&self) -> Option<Arc<J::Output>> {
        self.state.lock().data.clone()
    }

    pub fn status(&self) -> SourceStatus {
        self.state.lock().status.clone()
    }

    /// Consecutive failures since the last success
    pub fn attempts(&self) -> u32 {
        self.state.lock().attempts
    }

    /// Due time of the armed timer, if any
    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.timer.lock().as_ref().map(TimerHandle::due)
    }

    /// Called after every fetch, failed ones included, once the new status is in place
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(move |()| callback())
    }

    /// Arm the first refresh for right now
    pub fn start(self: &Arc<Self>) {
        self.stopped.store(false, Ordering::SeqCst);
        self.arm(self.clock.now());
    }

    /// Cancel the pending timer. An in-flight fetch completes but schedules nothing.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.timer.lock().take() {
            handle.cancel();
        }
        debug!(source = %self.id, "Refresh scheduler stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Run one fetch now and schedule whatever follows.
    ///
    /// The returned error is informational; it has already been turned into a retry.
    pub async fn refresh(self: &Arc<Self>) -> Result<(), SourceError> {
        let _running = self.running.lock().await;
        if self.is_stopped() {
            debug!(source = %self.id, "Skipping refresh of stopped scheduler");
            return Ok(());
        }
        self.cancel_timer();

        let started = self.clock.now();
        match self.run_fetch(started).await {
            Ok(data) => {
                self.on_success(data);
                Ok(())
            }
            Err(err) => {
                self.on_failure(&err);
                Err(err)
            }
        }
    }

    async fn run_fetch(&self, now: DateTime<Utc>) -> Result<J::Output, SourceError> {
        let job = Arc::clone(&self.job);
        let mut task = tokio::spawn(async move { job.fetch(now).await });

        match tokio::time::timeout(self.policy.fetch_timeout, &mut task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => Err(SourceError::Unexpected(format!(
                "fetch task panicked: {join_err}"
            ))),
            Ok(Err(join_err)) => Err(SourceError::Unexpected(format!("fetch task aborted: {join_err}"))),
            Err(_) => {
                task.abort();
                Err(SourceError::Timeout(self.policy.fetch_timeout))
            }
        }
    }

    fn on_success(self: &Arc<Self>, data: J::Output) {
        let now = self.clock.now();
        let next = self.job.next_refresh(&data, now);
        {
            let mut state = self.state.lock();
            state.data = Some(Arc::new(data));
            state.status = SourceStatus::Ok { at: now };
            state.attempts = 0;
            state.next_normal = Some(next);
        }
        info!(source = %self.id, next_refresh = %next, "✅ Refreshed");

        if !self.is_stopped() {
            self.arm(next);
        }
        self.listeners.notify(&());
    }

    fn on_failure(self: &Arc<Self>, err: &SourceError) {
        let now = self.clock.now();
        let (attempts, delay) = {
            let mut state = self.state.lock();
            state.attempts = state.attempts.saturating_add(1);
            let attempts = state.attempts;
            state.status = match (&state.data, &state.status) {
                (None, _) => SourceStatus::NeverFetched {
                    attempts,
                    last_error: Some(err.clone()),
                },
                (Some(_), SourceStatus::Failing { since, .. }) => SourceStatus::Failing {
                    attempts,
                    since: *since,
                    last_error: err.clone(),
                },
                (Some(_), SourceStatus::Ok { .. } | SourceStatus::NeverFetched { .. }) => SourceStatus::Failing {
                    attempts,
                    since: now,
                    last_error: err.clone(),
                },
            };
            (attempts, self.retry_delay(attempts, state.next_normal, now))
        };

        if err.is_severe() {
            error!(source = %self.id, attempts, retry_in_secs = delay.as_secs(), error = %err, "❌ Refresh failed");
        } else {
            warn!(source = %self.id, attempts, retry_in_secs = delay.as_secs(), error = %err, "⚠️ Refresh failed, retrying");
        }

        if !self.is_stopped() {
            self.arm(clock::offset(now, delay));
        }
        self.listeners.notify(&());
    }

    /// `2^attempts` seconds, but never past the next normal refresh or the configured cap
    pub fn retry_delay(&self, attempts: u32, next_normal: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
        let mut delay = Duration::from_secs(1u64.checked_shl(attempts).unwrap_or(u64::MAX));
        if let Some(until_normal) = next_normal
            .and_then(|next| (next - now).to_std().ok())
            .filter(|d| !d.is_zero())
        {
            delay = delay.min(until_normal);
        }
        if let Some(cap) = self.policy.max_retry_delay {
            delay = delay.min(cap);
        }
        delay
    }

    fn cancel_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.cancel();
        }
    }

    /// Replace the pending timer with one firing at `due`
    fn arm(self: &Arc<Self>, due: DateTime<Utc>) {
        let weak = Arc::downgrade(self);
        let id = self.id;
        let callback = Box::new(move || {
            let Some(scheduler) = weak.upgrade() else {
                return;
            };
            match Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        // Already logged and rescheduled
                        let _ = scheduler.refresh().await;
                    });
                }
                Err(e) => error!(source = %id, error = %e, "Refresh timer fired outside a runtime"),
            }
        });

        let mut slot = self.timer.lock();
        if let Some(previous) = slot.take() {
            previous.cancel();
        }
        *slot = Some(self.clock.at(due, callback));
        debug!(source = %self.id, due = %due, "Refresh armed");
    }
}

impl<J: RefreshJob> fmt::Debug for RefreshScheduler<J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("next_wakeup", &self.next_wakeup())
            .finish_non_exhaustive()
    }
}
