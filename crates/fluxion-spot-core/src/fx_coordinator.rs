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

//! Daily exchange-rate cache

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use fluxion_spot_types::Currency;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::clock::ClockScheduler;
use crate::error::SourceError;
use crate::listeners::Subscription;
use crate::refresh::{RefreshJob, RefreshPolicy, RefreshScheduler, SourceId, SourceStatus};
use crate::sources::{FxRates, FxSource};
use crate::time_utils::{local_date, local_midnight};

/// How many days before today are tried when today has no rates
pub const MAX_LOOKBACK_DAYS: u32 = 7;

/// One published rate set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FxSnapshot {
    /// Provider-local day the fetch was for
    pub requested: NaiveDate,
    /// Day the rates were actually published for; earlier than `requested` on weekends and holidays
    pub effective: NaiveDate,
    pub base: Currency,
    /// Units of `base` per unit of each currency. Always contains `base` itself at 1.
    pub rates: FxRates,
}

impl FxSnapshot {
    pub fn rate(&self, currency: Currency) -> Option<Decimal> {
        self.rates.get(&currency).copied()
    }

    /// Factor turning an amount in `from` into `to`
    pub fn conversion(&self, from: Currency, to: Currency) -> Option<Decimal> {
        if from == to {
            return Some(Decimal::ONE);
        }
        let from_rate = self.rate(from)?;
        let to_rate = self.rate(to)?;
        from_rate.checked_div(to_rate)
    }

    pub fn is_fallback(&self) -> bool {
        self.effective != self.requested
    }
}

#[derive(Debug)]
pub struct FxJob {
    source: Arc<dyn FxSource>,
    timezone: Tz,
}

#[async_trait]
impl RefreshJob for FxJob {
    type Output = FxSnapshot;

    async fn fetch(&self, now: DateTime<Utc>) -> Result<FxSnapshot, SourceError> {
        let requested = local_date(self.timezone, now);
        let base = self.source.base_currency();

        let mut day = requested;
        for back in 0..=MAX_LOOKBACK_DAYS {
            match self.source.fetch_day(day).await {
                Ok(mut rates) => {
                    rates.insert(base, Decimal::ONE);
                    if back > 0 {
                        info!(%requested, effective = %day, "💱 Using rates from an earlier day");
                    }
                    return Ok(FxSnapshot {
                        requested,
                        effective: day,
                        base,
                        rates,
                    });
                }
                Err(SourceError::NoDataForDate(missing)) => {
                    debug!(%missing, "No exchange rates published");
                    match day.pred_opt() {
                        Some(previous) => day = previous,
                        None => break,
                    }
                }
                Err(other) => return Err(other),
            }
        }

        warn!(%requested, days = MAX_LOOKBACK_DAYS, "No exchange rates in lookback window");
        Err(SourceError::NoDataForDate(requested))
    }

    fn next_refresh(&self, data: &FxSnapshot, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = local_date(self.timezone, now);
        let next = local_midnight(self.timezone, today.succ_opt().unwrap_or(today));
        info!(
            effective = %data.effective,
            currencies = data.rates.len(),
            next = %next,
            "💱 Exchange rates updated"
        );
        next
    }
}

/// Cached exchange rates, refreshed at provider-local midnight
#[derive(Debug)]
pub struct FxRateCoordinator {
    scheduler: Arc<RefreshScheduler<FxJob>>,
}

impl FxRateCoordinator {
    pub fn new(
        source: Arc<dyn FxSource>,
        timezone: Tz,
        clock: Arc<dyn ClockScheduler>,
        refresh: RefreshPolicy,
    ) -> Self {
        let job = FxJob { source, timezone };
        Self {
            scheduler: RefreshScheduler::new(SourceId::Fx, job, clock, refresh),
        }
    }

    pub fn base_currency(&self) -> Currency {
        self.scheduler.job().source.base_currency()
    }

    pub fn start(&self) {
        info!(base = %self.base_currency(), "🚀 Starting exchange rate coordinator");
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub async fn refresh_now(&self) -> Result<(), SourceError> {
        self.scheduler.refresh().await
    }

    pub fn rates(&self) -> Option<Arc<FxSnapshot>> {
        self.scheduler.data()
    }

    pub fn status(&self) -> SourceStatus {
        self.scheduler.status()
    }

    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_wakeup()
    }

    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.scheduler.subscribe(callback)
    }
}
