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

//! Fused, converted price views for one entry.
//!
//! A [`FusionCoordinator`] listens to its spot and FX coordinators and to a
//! quarter-hour clock, rebuilds a [`FusedView`] from scratch on every trigger,
//! and publishes it by replacing the previous one.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use fluxion_spot_types::{
    BlockSize, Currency, DaySlice, EnergyUnit, Interval, RateTable, Resolution, Trade, Window,
};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clock::{ClockScheduler, TimerHandle};
use crate::entry::EntryConfig;
use crate::error::{BlockUnavailable, DirectionUnavailable, SourceError, WindowError};
use crate::fx_coordinator::{FxRateCoordinator, FxSnapshot};
use crate::listeners::{Listeners, Subscription};
use crate::refresh::{SourceId, SourceStatus};
use crate::spot_coordinator::SpotPriceCoordinator;
use crate::time_utils::{local_date, next_quarter_hour};
use crate::window::find_cheapest_window;

// ============= Availability =============

/// Why an entry has no view at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewUnavailable {
    /// The source has not been asked yet
    #[error("{0} has not been fetched yet")]
    NeverFetched(SourceId),

    /// Every fetch so far failed; retries continue
    #[error("{upstream} has no data yet, attempt {attempts} failed: {last_error}")]
    Retrying {
        upstream: SourceId,
        attempts: u32,
        last_error: SourceError,
    },

    /// Rates are in, but not for this currency
    #[error("no exchange rate for {0}")]
    MissingFxRate(Currency),

    #[error("price conversion overflowed")]
    ConversionOverflow,
}

impl ViewUnavailable {
    fn from_status(source: SourceId, status: &SourceStatus) -> Self {
        match status {
            SourceStatus::NeverFetched {
                attempts,
                last_error: Some(last_error),
            } => ViewUnavailable::Retrying {
                upstream: source,
                attempts: *attempts,
                last_error: last_error.clone(),
            },
            SourceStatus::NeverFetched { last_error: None, .. }
            | SourceStatus::Ok { .. }
            | SourceStatus::Failing { .. } => ViewUnavailable::NeverFetched(source),
        }
    }
}

/// Upstream health at the moment a view was built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHealth {
    pub spot: SourceStatus,
    /// `None` when the entry needs no currency conversion
    pub fx: Option<SourceStatus>,
}

impl SourceHealth {
    /// Served from the last good data while a source is failing
    pub fn is_degraded(&self) -> bool {
        self.spot.is_failing() || self.fx.as_ref().is_some_and(SourceStatus::is_failing)
    }
}

/// Inputs of one view build
#[derive(Debug, Clone, Copy)]
pub struct FusionInputs<'a> {
    pub spot: &'a RateTable,
    pub spot_currency: Currency,
    pub spot_unit: EnergyUnit,
    /// Required when the entry's currency differs from `spot_currency`
    pub fx: Option<&'a FxSnapshot>,
    pub now: DateTime<Utc>,
}

// ============= Trade series =============

/// One derived price series (spot, buy or sell) with its day views and cheapest blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSeries {
    pub trade: Trade,
    pub resolution: Resolution,
    pub table: RateTable,
    pub yesterday: DaySlice,
    pub today: DaySlice,
    pub tomorrow: DaySlice,
    pub cheapest: BTreeMap<BlockSize, Result<Window, WindowError>>,
}

impl TradeSeries {
    fn build(trade: Trade, table: RateTable, config: &EntryConfig, today: NaiveDate) -> Self {
        let tz = config.timezone;
        let resolution = config.resolution;
        let slice = |date: Option<NaiveDate>| {
            table.day_slice(resolution, date.unwrap_or(today), tz)
        };
        let yesterday = slice(today.pred_opt());
        let tomorrow = slice(today.succ_opt());
        let today_slice = slice(Some(today));

        let mut cheapest = BTreeMap::new();
        for block in config.all_cheapest_blocks() {
            let Some(len) = block.window_len(resolution) else {
                continue;
            };
            let candidates: Vec<Interval> = if today_slice.is_empty() {
                Vec::new()
            } else if config.allow_cross_midnight && block != BlockSize::SingleInterval {
                today_slice
                    .intervals()
                    .iter()
                    .chain(tomorrow.intervals())
                    .cloned()
                    .collect()
            } else {
                today_slice.intervals().to_vec()
            };
            let window = find_cheapest_window(&candidates, Some(len), resolution);
            if let Err(e) = &window {
                debug!(%trade, %block, error = %e, "No cheapest window");
            }
            cheapest.insert(block, window);
        }

        Self {
            trade,
            resolution,
            table,
            yesterday,
            today: today_slice,
            tomorrow,
            cheapest,
        }
    }

    /// Interval covering `now`
    pub fn current(&self, now: DateTime<Utc>) -> Option<&Interval> {
        self.table.interval_at(self.resolution, now)
    }

    pub fn current_price(&self, now: DateTime<Utc>) -> Option<Decimal> {
        self.current(now).map(|i| i.price)
    }

    /// Rank of the current interval among today's, cheapest first
    pub fn current_order(&self, now: DateTime<Utc>) -> Option<usize> {
        let current = self.current(now)?;
        self.today.order_of(current.start_utc)
    }

    pub fn cheapest_today(&self) -> Option<&Interval> {
        self.today.cheapest()
    }

    pub fn most_expensive_today(&self) -> Option<&Interval> {
        self.today.most_expensive()
    }

    pub fn cheapest_tomorrow(&self) -> Option<&Interval> {
        self.tomorrow.cheapest()
    }

    pub fn most_expensive_tomorrow(&self) -> Option<&Interval> {
        self.tomorrow.most_expensive()
    }

    /// Rank of every interval of tomorrow, in time order
    pub fn tomorrow_orders(&self) -> Vec<(DateTime<Utc>, usize)> {
        self.tomorrow.orders()
    }

    /// Daily price for today. Falls back to yesterday while today is missing.
    pub fn daily_price_today(&self) -> Option<Decimal> {
        self.today
            .first()
            .or_else(|| self.yesterday.first())
            .map(|i| i.price)
    }

    pub fn daily_price_tomorrow(&self) -> Option<Decimal> {
        self.tomorrow.first().map(|i| i.price)
    }

    pub fn cheapest_window(&self, block: BlockSize) -> Result<&Window, BlockUnavailable> {
        match self.cheapest.get(&block) {
            Some(Ok(window)) => Ok(window),
            Some(Err(e)) => Err(BlockUnavailable::Search(*e)),
            None => Err(BlockUnavailable::NotRequested(block)),
        }
    }

    pub fn is_in_cheapest_window(&self, block: BlockSize, now: DateTime<Utc>) -> Result<bool, BlockUnavailable> {
        Ok(self.cheapest_window(block)?.contains(now))
    }
}

// ============= Fused view =============

/// Everything one entry exposes, built in one step from one set of inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusedView {
    pub built_at: DateTime<Utc>,
    pub timezone: Tz,
    pub today: NaiveDate,
    pub currency: Currency,
    pub unit: EnergyUnit,
    /// Factor applied to source prices (exchange rate times unit scale)
    pub conversion_rate: Decimal,
    /// Day of the exchange rates used, when converting
    pub fx_effective: Option<NaiveDate>,
    pub health: SourceHealth,
    spot: TradeSeries,
    buy: Result<TradeSeries, DirectionUnavailable>,
    sell: Result<TradeSeries, DirectionUnavailable>,
}

impl FusedView {
    /// Build a view from raw inputs. Pure: equal inputs give equal views.
    pub fn build(
        config: &EntryConfig,
        inputs: FusionInputs<'_>,
        health: SourceHealth,
    ) -> Result<Self, ViewUnavailable> {
        let unit_scale = config.unit.scale_from(inputs.spot_unit);
        let (fx_rate, fx_effective) = if config.needs_fx(inputs.spot_currency) {
            let fx = inputs.fx.ok_or(ViewUnavailable::NeverFetched(SourceId::Fx))?;
            let rate = fx
                .conversion(inputs.spot_currency, config.currency)
                .ok_or(ViewUnavailable::MissingFxRate(config.currency))?;
            (rate, Some(fx.effective))
        } else {
            (Decimal::ONE, None)
        };
        let conversion_rate = fx_rate
            .checked_mul(unit_scale)
            .ok_or(ViewUnavailable::ConversionOverflow)?;

        let tz = config.timezone;
        let converted = inputs
            .spot
            .map_prices(|_, interval| {
                interval
                    .price
                    .checked_mul(conversion_rate)
                    .ok_or(ViewUnavailable::ConversionOverflow)
            })?
            .with_timezone(tz);

        let today = local_date(tz, inputs.now);
        let derive = |trade: Trade| -> Result<TradeSeries, DirectionUnavailable> {
            let transform = config
                .transform(trade)
                .ok_or(DirectionUnavailable::NotConfigured(trade))?;
            let to_unavailable = |error| DirectionUnavailable::Transform { trade, error };
            transform.validate().map_err(to_unavailable)?;
            let table = converted
                .map_prices(|_, interval| transform.apply(interval.price, interval.start_utc, tz))
                .map_err(to_unavailable)?;
            Ok(TradeSeries::build(trade, table, config, today))
        };
        let buy = derive(Trade::Buy);
        let sell = derive(Trade::Sell);
        for result in [&buy, &sell] {
            if let Err(e @ DirectionUnavailable::Transform { .. }) = result {
                error!(error = %e, "❌ Price transform failed");
            }
        }

        Ok(Self {
            built_at: inputs.now,
            timezone: tz,
            today,
            currency: config.currency,
            unit: config.unit,
            conversion_rate,
            fx_effective,
            health,
            spot: TradeSeries::build(Trade::Spot, converted, config, today),
            buy,
            sell,
        })
    }

    pub fn spot(&self) -> &TradeSeries {
        &self.spot
    }

    pub fn trade(&self, trade: Trade) -> Result<&TradeSeries, DirectionUnavailable> {
        match trade {
            Trade::Spot => Ok(&self.spot),
            Trade::Buy => self.buy.as_ref().map_err(Clone::clone),
            Trade::Sell => self.sell.as_ref().map_err(Clone::clone),
        }
    }

    pub fn has_tomorrow(&self) -> bool {
        !self.spot.tomorrow.is_empty()
    }

    pub fn today_slice(&self) -> &DaySlice {
        &self.spot.today
    }

    pub fn tomorrow_slice(&self) -> &DaySlice {
        &self.spot.tomorrow
    }

    pub fn current_price(&self, now: DateTime<Utc>) -> Option<Decimal> {
        self.spot.current_price(now)
    }

    pub fn is_in_cheapest_window(&self, block: BlockSize, now: DateTime<Utc>) -> Result<bool, BlockUnavailable> {
        self.spot.is_in_cheapest_window(block, now)
    }
}

/// What consumers observe for an entry
pub type ViewState = Result<Arc<FusedView>, ViewUnavailable>;

// ============= Coordinator =============

/// Keeps one entry's [`FusedView`] current
pub struct FusionCoordinator {
    name: String,
    config: EntryConfig,
    spot: Arc<SpotPriceCoordinator>,
    fx: Option<Arc<FxRateCoordinator>>,
    clock: Arc<dyn ClockScheduler>,
    current: RwLock<ViewState>,
    recompute_lock: Mutex<()>,
    boundary: Mutex<Option<TimerHandle>>,
    upstream: Mutex<Vec<Subscription>>,
    listeners: Listeners<ViewState>,
    stopped: AtomicBool,
}

impl FusionCoordinator {
    pub fn new(
        name: impl Into<String>,
        config: EntryConfig,
        spot: Arc<SpotPriceCoordinator>,
        fx: Option<Arc<FxRateCoordinator>>,
        clock: Arc<dyn ClockScheduler>,
    ) -> Arc<Self> {
        let initial = Err(ViewUnavailable::NeverFetched(SourceId::Spot(config.commodity)));
        Arc::new(Self {
            name: name.into(),
            config,
            spot,
            fx,
            clock,
            current: RwLock::new(initial),
            recompute_lock: Mutex::new(()),
            boundary: Mutex::new(None),
            upstream: Mutex::new(Vec::new()),
            listeners: Listeners::new(),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &EntryConfig {
        &self.config
    }

    /// Hook into upstream updates and the interval clock, then build the first view
    pub fn start(self: &Arc<Self>) {
        self.stopped.store(false, Ordering::SeqCst);
        for (trade, err) in self.config.transform_errors() {
            error!(entry = %self.name, %trade, error = %err, "❌ Invalid price transform");
        }

        let mut upstream = Vec::with_capacity(2);
        let weak = Arc::downgrade(self);
        upstream.push(self.spot.subscribe(move || {
            if let Some(fusion) = weak.upgrade() {
                fusion.recompute();
            }
        }));
        if let Some(fx) = &self.fx {
            let weak = Arc::downgrade(self);
            upstream.push(fx.subscribe(move || {
                if let Some(fusion) = weak.upgrade() {
                    fusion.recompute();
                }
            }));
        }
        *self.upstream.lock() = upstream;

        self.recompute();
        self.arm_boundary();
        info!(entry = %self.name, commodity = %self.config.commodity, "🚀 Fusion started");
    }

    /// Drop upstream hooks and cancel the interval timer
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.upstream.lock().clear();
        if let Some(handle) = self.boundary.lock().take() {
            handle.cancel();
        }
        self.listeners.clear();
        debug!(entry = %self.name, "Fusion stopped");
    }

    pub fn current(&self) -> ViewState {
        self.current.read().clone()
    }

    pub fn subscribe(&self, listener: impl Fn(&ViewState) + Send + Sync + 'static) -> Subscription {
        self.listeners.subscribe(listener)
    }

    /// Due time of the interval-boundary timer
    pub fn next_boundary(&self) -> Option<DateTime<Utc>> {
        self.boundary.lock().as_ref().map(TimerHandle::due)
    }

    fn health(&self) -> SourceHealth {
        SourceHealth {
            spot: self.spot.status(),
            fx: self
                .needs_fx()
                .then(|| self.fx.as_ref().map(|fx| fx.status()))
                .flatten(),
        }
    }

    fn needs_fx(&self) -> bool {
        self.config.needs_fx(self.spot.currency())
    }

    /// Rebuild the view from the latest upstream data and publish it
    pub fn recompute(&self) {
        let state = {
            let _guard = self.recompute_lock.lock();
            if self.stopped.load(Ordering::SeqCst) {
                return;
            }
            let state = self.build();
            let previous = std::mem::replace(&mut *self.current.write(), state.clone());
            match (&previous, &state) {
                (Ok(_), Err(reason)) => warn!(entry = %self.name, %reason, "⚠️ View unavailable"),
                (Err(_), Ok(view)) => info!(
                    entry = %self.name,
                    has_tomorrow = view.has_tomorrow(),
                    "✅ View available"
                ),
                (Ok(_), Ok(_)) | (Err(_), Err(_)) => {}
            }
            state
        };
        if let Ok(view) = &state {
            debug!(
                entry = %self.name,
                current = ?view.current_price(view.built_at),
                rate = %view.conversion_rate,
                "Fused view rebuilt"
            );
        }
        self.listeners.notify(&state);
    }

    fn build(&self) -> ViewState {
        let spot_id = SourceId::Spot(self.config.commodity);
        let Some(spot) = self.spot.rates() else {
            return Err(ViewUnavailable::from_status(spot_id, &self.spot.status()));
        };

        let fx = if self.needs_fx() {
            let Some(coordinator) = &self.fx else {
                return Err(ViewUnavailable::MissingFxRate(self.config.currency));
            };
            match coordinator.rates() {
                Some(snapshot) => Some(snapshot),
                None => return Err(ViewUnavailable::from_status(SourceId::Fx, &coordinator.status())),
            }
        } else {
            None
        };

        let inputs = FusionInputs {
            spot: &spot,
            spot_currency: self.spot.currency(),
            spot_unit: self.spot.unit(),
            fx: fx.as_deref(),
            now: self.clock.now(),
        };
        FusedView::build(&self.config, inputs, self.health()).map(Arc::new)
    }

    fn arm_boundary(self: &Arc<Self>) {
        if self.stopped.load(Ordering::SeqCst) {
            return;
        }
        let due = next_quarter_hour(self.config.timezone, self.clock.now());
        let weak = Arc::downgrade(self);
        let handle = self.clock.at(
            due,
            Box::new(move || {
                if let Some(fusion) = weak.upgrade() {
                    fusion.on_boundary();
                }
            }),
        );
        let mut slot = self.boundary.lock();
        if let Some(previous) = slot.replace(handle) {
            previous.cancel();
        }
    }

    fn on_boundary(self: &Arc<Self>) {
        // The fired timer is spent; forget it without cancelling
        drop(self.boundary.lock().take());
        self.recompute();
        self.arm_boundary();
    }
}

impl fmt::Debug for FusionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FusionCoordinator")
            .field("name", &self.name)
            .field("commodity", &self.config.commodity)
            .field("available", &self.current.read().is_ok())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{FnTransform, TariffTransform};
    use crate::error::TransformError;
    use chrono::{TimeDelta, TimeZone};
    use chrono_tz::Europe::Prague;
    use fluxion_spot_types::Commodity;
    use rust_decimal_macros::dec;

    fn local(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Prague.with_ymd_and_hms(2025, 1, d, h, m, 0).unwrap().with_timezone(&Utc)
    }

    /// Hourly prices for the 15th (0..24) and, optionally, the 16th
    fn table(with_tomorrow: bool) -> RateTable {
        let mut builder = RateTable::builder(Prague);
        let days = if with_tomorrow { 2 } else { 1 };
        for day in 0..days {
            for hour in 0..24u32 {
                let start = local(15, 0, 0) + TimeDelta::hours(i64::from(day * 24 + hour));
                let price = Decimal::from(100 + (hour * 7) % 24) + Decimal::from(day);
                builder.insert(Resolution::Hour, start, price);
            }
        }
        builder.build()
    }

    fn entry() -> EntryConfig {
        EntryConfig {
            resolution: Resolution::Hour,
            currency: Currency::CZK,
            unit: EnergyUnit::KWh,
            cheapest_blocks: vec![3],
            ..EntryConfig::new(Commodity::Electricity)
        }
    }

    fn fx() -> FxSnapshot {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        FxSnapshot {
            requested: date,
            effective: date,
            base: Currency::CZK,
            rates: BTreeMap::from([(Currency::CZK, Decimal::ONE), (Currency::EUR, dec!(25))]),
        }
    }

    fn health() -> SourceHealth {
        SourceHealth {
            spot: SourceStatus::Ok { at: local(15, 0, 0) },
            fx: Some(SourceStatus::Ok { at: local(15, 0, 0) }),
        }
    }

    fn inputs<'a>(spot: &'a RateTable, fx: Option<&'a FxSnapshot>, now: DateTime<Utc>) -> FusionInputs<'a> {
        FusionInputs {
            spot,
            spot_currency: Currency::EUR,
            spot_unit: EnergyUnit::MWh,
            fx,
            now,
        }
    }

    #[test]
    fn converts_currency_and_unit() {
        let spot = table(false);
        let fx = fx();
        let view = FusedView::build(&entry(), inputs(&spot, Some(&fx), local(15, 0, 30)), health()).unwrap();

        assert_eq!(view.conversion_rate, dec!(0.025));
        // Hour 0 costs 100 EUR/MWh = 2.5 CZK/kWh
        assert_eq!(view.current_price(local(15, 0, 30)), Some(dec!(2.5)));
        assert_eq!(view.fx_effective, Some(fx.requested));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let spot = table(true);
        let fx = fx();
        let config = entry();
        let now = local(15, 10, 0);
        let a = FusedView::build(&config, inputs(&spot, Some(&fx), now), health()).unwrap();
        let b = FusedView::build(&config, inputs(&spot, Some(&fx), now), health()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn identity_conversion_is_exact() {
        let spot = table(false);
        let config = EntryConfig {
            currency: Currency::EUR,
            unit: EnergyUnit::MWh,
            ..entry()
        };
        let view = FusedView::build(&config, inputs(&spot, None, local(15, 5, 0)), health()).unwrap();
        assert_eq!(view.conversion_rate, Decimal::ONE);
        let original: Vec<_> = spot.intervals(Resolution::Hour).map(|i| i.price).collect();
        let converted: Vec<_> = view.spot().table.intervals(Resolution::Hour).map(|i| i.price).collect();
        assert_eq!(original, converted);
    }

    #[test]
    fn missing_currency_is_unavailable() {
        let spot = table(false);
        let fx = fx();
        let config = EntryConfig {
            currency: Currency::new("PLN").unwrap(),
            ..entry()
        };
        let err = FusedView::build(&config, inputs(&spot, Some(&fx), local(15, 5, 0)), health()).unwrap_err();
        assert_eq!(err, ViewUnavailable::MissingFxRate(Currency::new("PLN").unwrap()));

        let err = FusedView::build(&entry(), inputs(&spot, None, local(15, 5, 0)), health()).unwrap_err();
        assert_eq!(err, ViewUnavailable::NeverFetched(SourceId::Fx));
    }

    #[test]
    fn failing_transform_only_degrades_its_direction() {
        let spot = table(false);
        let fx = fx();
        let config = EntryConfig {
            buy: Some(Arc::new(TariffTransform {
                addition: dec!(1),
                ..TariffTransform::default()
            })),
            sell: Some(Arc::new(FnTransform::new("broken", |_, _, _| {
                Err(TransformError::Failed("template error".to_owned()))
            }))),
            ..entry()
        };
        let now = local(15, 0, 30);
        let view = FusedView::build(&config, inputs(&spot, Some(&fx), now), health()).unwrap();

        assert_eq!(view.trade(Trade::Buy).unwrap().current_price(now), Some(dec!(3.5)));
        assert!(matches!(
            view.trade(Trade::Sell),
            Err(DirectionUnavailable::Transform { trade: Trade::Sell, .. })
        ));
        assert_eq!(view.current_price(now), Some(dec!(2.5)));
    }

    #[test]
    fn unconfigured_direction_is_reported() {
        let spot = table(false);
        let fx = fx();
        let view = FusedView::build(&entry(), inputs(&spot, Some(&fx), local(15, 0, 0)), health()).unwrap();
        assert_eq!(
            view.trade(Trade::Sell).unwrap_err(),
            DirectionUnavailable::NotConfigured(Trade::Sell)
        );
    }

    #[test]
    fn cross_midnight_only_when_enabled() {
        let mut builder = RateTable::builder(Prague);
        for hour in 0..48u32 {
            let start = local(15, 0, 0) + TimeDelta::hours(i64::from(hour));
            // Cheapest stretch straddles midnight: 22:00 today to 02:00 tomorrow
            let price = if (22..26).contains(&hour) { dec!(1) } else { dec!(50) };
            builder.insert(Resolution::Hour, start, price);
        }
        let spot = builder.build();
        let fx = fx();
        let now = local(15, 12, 0);

        let same_day = FusedView::build(&entry(), inputs(&spot, Some(&fx), now), health()).unwrap();
        let window = same_day.spot().cheapest_window(BlockSize::Hours(3)).unwrap();
        assert_eq!(window.start, local(15, 21, 0));
        assert_eq!(window.end, local(16, 0, 0));

        let config = EntryConfig {
            allow_cross_midnight: true,
            ..entry()
        };
        let crossing = FusedView::build(&config, inputs(&spot, Some(&fx), now), health()).unwrap();
        let window = crossing.spot().cheapest_window(BlockSize::Hours(3)).unwrap();
        assert_eq!(window.start, local(15, 22, 0));
        assert_eq!(window.end, local(16, 1, 0));

        // The single interval never crosses
        let single = crossing.spot().cheapest_window(BlockSize::SingleInterval).unwrap();
        assert_eq!(single.start, local(15, 22, 0));
        assert!(crossing.is_in_cheapest_window(BlockSize::Hours(3), local(16, 0, 30)).unwrap());
    }

    #[test]
    fn order_and_extremes() {
        let spot = table(true);
        let fx = fx();
        let now = local(15, 0, 10);
        let view = FusedView::build(&entry(), inputs(&spot, Some(&fx), now), health()).unwrap();
        let series = view.spot();

        // Hour 0 has the lowest price of the day (100 + 0)
        assert_eq!(series.current_order(now), Some(1));
        assert_eq!(series.cheapest_today().unwrap().start_utc, local(15, 0, 0));
        assert!(view.has_tomorrow());
        assert_eq!(series.tomorrow_orders().len(), 24);
        assert!(series.most_expensive_tomorrow().unwrap().price > series.cheapest_tomorrow().unwrap().price);
    }

    #[test]
    fn daily_price_falls_back_to_yesterday() {
        let day = |d: u32| local(d, 0, 0);
        let mut builder = RateTable::builder(Prague);
        builder.insert(Resolution::Day, day(14), dec!(40));
        let spot = builder.build();
        let config = EntryConfig {
            currency: Currency::EUR,
            unit: EnergyUnit::MWh,
            ..EntryConfig::new(Commodity::Gas)
        };
        let view = FusedView::build(&config, inputs(&spot, None, local(15, 8, 0)), health()).unwrap();
        assert_eq!(view.spot().daily_price_today(), Some(dec!(40)));
        assert_eq!(view.spot().daily_price_tomorrow(), None);
        assert!(!view.has_tomorrow());
    }
}
