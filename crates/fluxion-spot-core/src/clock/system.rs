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

//! Tokio-backed clock used by the running service

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;

use super::{ClockScheduler, TimerCallback, TimerHandle};

/// Longest single sleep before the wall clock is consulted again
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct SystemClock {
    runtime: Handle,
}

impl SystemClock {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Clock bound to the runtime the caller is running on
    pub fn current() -> anyhow::Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| anyhow::anyhow!("system clock needs a tokio runtime: {e}"))?;
        Ok(Self::new(runtime))
    }
}

impl ClockScheduler for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn at(&self, instant: DateTime<Utc>, callback: TimerCallback) -> TimerHandle {
        let task = self.runtime.spawn(async move {
            while let Ok(remaining) = (instant - Utc::now()).to_std() {
                if remaining.is_zero() {
                    break;
                }
                tokio::time::sleep(remaining.min(MAX_SLEEP_SLICE)).await;
            }
            callback();
        });
        TimerHandle::new(instant, move || task.abort())
    }
}
