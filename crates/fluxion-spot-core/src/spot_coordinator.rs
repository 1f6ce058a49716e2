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

//! Day-ahead price cache for one commodity.
//!
//! Polls around the market's publication time: once tomorrow's prices are in
//! there is nothing new until the next day's publication, otherwise it waits
//! for today's publication or retries shortly when the data is late.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use chrono_tz::Tz;
use fluxion_spot_types::{Commodity, Currency, EnergyUnit, RateTable, Resolution};
use rand::Rng;
use tracing::{debug, info};

use crate::clock::{self, ClockScheduler};
use crate::error::SourceError;
use crate::listeners::Subscription;
use crate::refresh::{RefreshJob, RefreshPolicy, RefreshScheduler, SourceId, SourceStatus};
use crate::sources::PriceSource;
use crate::time_utils::{local_date, local_to_utc};

/// When the market publishes next-day prices, in provider-local time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicationPolicy {
    pub timezone: Tz,
    pub publication_time: NaiveTime,
    /// Upper bound of the random delay added to publication-time polls
    pub max_jitter: Duration,
    /// Delay between polls once publication time passed without tomorrow's data
    pub late_retry: Duration,
}

impl Default for PublicationPolicy {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Prague,
            publication_time: NaiveTime::from_hms_opt(13, 10, 0).unwrap_or(NaiveTime::MIN),
            max_jitter: Duration::from_secs(120),
            late_retry: Duration::from_secs(120),
        }
    }
}

impl PublicationPolicy {
    /// Today's publication instant
    pub fn publication_on(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        local_to_utc(self.timezone, local_date(self.timezone, now), self.publication_time)
    }

    /// Whether tomorrow's prices should already be out at `now`
    pub fn is_tomorrow_expected(&self, now: DateTime<Utc>) -> bool {
        now >= self.publication_on(now)
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_secs();
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs(rand::thread_rng().gen_range(0..=max))
    }

    /// Next poll after a successful fetch at `now`
    pub fn next_refresh(&self, has_tomorrow: bool, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = local_date(self.timezone, now);
        let publication_today = local_to_utc(self.timezone, today, self.publication_time);

        if has_tomorrow {
            let tomorrow = today.succ_opt().unwrap_or(today);
            let publication = local_to_utc(self.timezone, tomorrow, self.publication_time);
            clock::offset(publication, self.jitter())
        } else if now < publication_today {
            clock::offset(publication_today, self.jitter())
        } else {
            clock::offset(now, self.late_retry)
        }
    }
}

/// Whether `table` already holds the next provider-local day.
///
/// Daily series count as complete when any day starts after `now`. Sub-daily
/// series must price local noon tomorrow, which stays inside the day on DST
/// transitions.
pub fn has_tomorrow_data(table: &RateTable, commodity: Commodity, now: DateTime<Utc>, tz: Tz) -> bool {
    match commodity.finest_resolution() {
        Resolution::Day => table
            .latest_start(Resolution::Day)
            .is_some_and(|latest| latest > now),
        resolution @ (Resolution::Hour | Resolution::QuarterHour) => {
            let Some(tomorrow) = local_date(tz, now).succ_opt() else {
                return false;
            };
            let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
            table.has_price_at(resolution, local_to_utc(tz, tomorrow, noon))
        }
    }
}

/// Coarse state of a commodity cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    NoData,
    /// Data is served but misses today, or tomorrow's prices are overdue
    Stale,
    Fresh,
}

#[derive(Debug)]
pub struct SpotJob {
    commodity: Commodity,
    source: Arc<dyn PriceSource>,
    policy: PublicationPolicy,
}

#[async_trait]
impl RefreshJob for SpotJob {
    type Output = RateTable;

    async fn fetch(&self, now: DateTime<Utc>) -> Result<RateTable, SourceError> {
        let tz = self.policy.timezone;
        let today = local_date(tz, now);
        let start = today.pred_opt().unwrap_or(today);
        let end = today.succ_opt().unwrap_or(today);

        debug!(commodity = %self.commodity, source = self.source.name(), %start, %end, "📡 Fetching spot prices");
        let table = self.source.fetch(self.commodity, start, end).await?;
        if table.is_empty() {
            return Err(SourceError::NoDataForDate(today));
        }
        Ok(if table.timezone() == tz {
            table
        } else {
            table.with_timezone(tz)
        })
    }

    fn next_refresh(&self, data: &RateTable, now: DateTime<Utc>) -> DateTime<Utc> {
        let has_tomorrow = has_tomorrow_data(data, self.commodity, now, self.policy.timezone);
        let next = self.policy.next_refresh(has_tomorrow, now);
        info!(
            commodity = %self.commodity,
            has_tomorrow,
            next = %next,
            "💰 Spot prices updated"
        );
        next
    }
}

/// Cached, self-scheduling day-ahead prices for one commodity
#[derive(Debug)]
pub struct SpotPriceCoordinator {
    scheduler: Arc<RefreshScheduler<SpotJob>>,
    currency: Currency,
    unit: EnergyUnit,
}

impl SpotPriceCoordinator {
    pub fn new(
        commodity: Commodity,
        source: Arc<dyn PriceSource>,
        clock: Arc<dyn ClockScheduler>,
        publication: PublicationPolicy,
        refresh: RefreshPolicy,
    ) -> Self {
        let currency = source.currency();
        let unit = source.unit();
        let job = SpotJob {
            commodity,
            source,
            policy: publication,
        };
        Self {
            scheduler: RefreshScheduler::new(SourceId::Spot(commodity), job, clock, refresh),
            currency,
            unit,
        }
    }

    pub fn commodity(&self) -> Commodity {
        self.scheduler.job().commodity
    }

    /// Currency prices are quoted in before conversion
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn unit(&self) -> EnergyUnit {
        self.unit
    }

    pub fn publication(&self) -> &PublicationPolicy {
        &self.scheduler.job().policy
    }

    pub fn start(&self) {
        info!(commodity = %self.commodity(), "🚀 Starting spot price coordinator");
        self.scheduler.start();
    }

    pub fn stop(&self) {
        self.scheduler.stop();
    }

    pub async fn refresh_now(&self) -> Result<(), SourceError> {
        self.scheduler.refresh().await
    }

    /// Last good price table
    pub fn rates(&self) -> Option<Arc<RateTable>> {
        self.scheduler.data()
    }

    pub fn status(&self) -> SourceStatus {
        self.scheduler.status()
    }

    pub fn next_wakeup(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_wakeup()
    }

    pub fn has_tomorrow_data(&self) -> bool {
        let now = self.scheduler.clock().now();
        self.rates().is_some_and(|table| {
            has_tomorrow_data(&table, self.commodity(), now, self.publication().timezone)
        })
    }

    pub fn is_tomorrow_expected(&self) -> bool {
        self.publication().is_tomorrow_expected(self.scheduler.clock().now())
    }

    pub fn freshness(&self) -> Freshness {
        let Some(table) = self.rates() else {
            return Freshness::NoData;
        };
        let now = self.scheduler.clock().now();
        let tz = self.publication().timezone;
        let resolution = self.commodity().finest_resolution();
        let covers_today = !table.day_slice(resolution, local_date(tz, now), tz).is_empty();
        let tomorrow_ok = !self.is_tomorrow_expected() || has_tomorrow_data(&table, self.commodity(), now, tz);

        if covers_today && tomorrow_ok {
            Freshness::Fresh
        } else {
            Freshness::Stale
        }
    }

    /// Called after every fetch attempt, once `rates()` and `status()` reflect it
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.scheduler.subscribe(callback)
    }

    /// Time until tomorrow's prices are due, zero once overdue
    pub fn until_publication(&self) -> TimeDelta {
        let now = self.scheduler.clock().now();
        (self.publication().publication_on(now) - now).max(TimeDelta::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::Europe::Prague;
    use rust_decimal::Decimal;

    fn prague(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Prague.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().with_timezone(&Utc)
    }

    fn no_jitter() -> PublicationPolicy {
        PublicationPolicy {
            max_jitter: Duration::ZERO,
            ..PublicationPolicy::default()
        }
    }

    #[test]
    fn schedule_with_tomorrow_data() {
        let policy = no_jitter();
        for now in [prague(2025, 1, 15, 12, 30), prague(2025, 1, 15, 14, 30)] {
            assert_eq!(policy.next_refresh(true, now), prague(2025, 1, 16, 13, 10));
        }
    }

    #[test]
    fn schedule_morning_without_tomorrow() {
        let policy = no_jitter();
        let now = prague(2025, 1, 15, 12, 30);
        assert_eq!(policy.next_refresh(false, now), prague(2025, 1, 15, 13, 10));
    }

    #[test]
    fn schedule_evening_without_tomorrow_retries_soon() {
        let policy = no_jitter();
        let now = prague(2025, 1, 15, 14, 30);
        assert_eq!(policy.next_refresh(false, now), now + TimeDelta::seconds(120));
    }

    #[test]
    fn jitter_stays_in_range() {
        let policy = PublicationPolicy::default();
        let now = prague(2025, 1, 15, 12, 30);
        let base = prague(2025, 1, 15, 13, 10);
        for _ in 0..50 {
            let next = policy.next_refresh(false, now);
            assert!(next >= base && next <= base + TimeDelta::seconds(120));
        }
    }

    #[test]
    fn tomorrow_detection_for_electricity() {
        let now = prague(2025, 3, 29, 14, 0);
        let mut builder = RateTable::builder(Prague);
        // Tomorrow is the spring DST day; local noon there is 10:00 UTC
        builder.insert(Resolution::QuarterHour, prague(2025, 3, 30, 12, 0), Decimal::ONE);
        let table = builder.build();
        assert!(has_tomorrow_data(&table, Commodity::Electricity, now, Prague));

        let today_only = {
            let mut b = RateTable::builder(Prague);
            b.insert(Resolution::QuarterHour, prague(2025, 3, 29, 12, 0), Decimal::ONE);
            b.build()
        };
        assert!(!has_tomorrow_data(&today_only, Commodity::Electricity, now, Prague));
    }

    #[test]
    fn tomorrow_detection_for_gas() {
        let now = prague(2025, 1, 15, 14, 0);
        let day = |d: u32| {
            Prague
                .from_local_datetime(&NaiveDate::from_ymd_opt(2025, 1, d).unwrap().and_hms_opt(0, 0, 0).unwrap())
                .unwrap()
                .with_timezone(&Utc)
        };
        let mut builder = RateTable::builder(Prague);
        builder.insert(Resolution::Day, day(14), Decimal::ONE);
        builder.insert(Resolution::Day, day(15), Decimal::ONE);
        assert!(!has_tomorrow_data(&builder.clone().build(), Commodity::Gas, now, Prague));

        builder.insert(Resolution::Day, day(16), Decimal::ONE);
        assert!(has_tomorrow_data(&builder.build(), Commodity::Gas, now, Prague));
    }
}
