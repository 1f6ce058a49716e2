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

//! Shared fixtures for the scenario tests

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Europe::Prague;
use fluxion_spot_core::{FxRates, FxSource, PriceSource, SourceError};
use fluxion_spot_types::{Commodity, Currency, RateTable, Resolution};
use parking_lot::Mutex;
use rust_decimal::Decimal;

pub fn prague(d: NaiveDate, h: u32, m: u32) -> DateTime<Utc> {
    Prague
        .from_local_datetime(&d.and_hms_opt(h, m, 0).unwrap())
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Electricity for whole Prague days starting at `first`: quarter-hours priced
/// `price(day_index, quarter_index)` plus the matching hourly series
pub fn electricity(first: NaiveDate, days: u32, price: impl Fn(u32, u32) -> Decimal) -> RateTable {
    let mut builder = RateTable::builder(Prague);
    for d in 0..days {
        let date = first + TimeDelta::days(i64::from(d));
        let start = prague(date, 0, 0);
        let end = prague(date + TimeDelta::days(1), 0, 0);
        let mut q = 0;
        let mut at = start;
        while at < end {
            let p = price(d, q);
            builder.insert(Resolution::QuarterHour, at, p);
            if q % 4 == 0 {
                builder.insert(Resolution::Hour, at, p);
            }
            at += TimeDelta::minutes(15);
            q += 1;
        }
    }
    builder.build()
}

/// Gas day prices starting at `first`
pub fn gas(first: NaiveDate, prices: &[Decimal]) -> RateTable {
    let mut builder = RateTable::builder(Prague);
    for (i, p) in prices.iter().enumerate() {
        let date = first + TimeDelta::days(i as i64);
        builder.insert(Resolution::Day, prague(date, 0, 0), *p);
    }
    builder.build()
}

/// Price source answering from a queue of scripted results, then repeating the last one
#[derive(Debug, Default)]
pub struct ScriptedPrices {
    queue: Mutex<VecDeque<Result<RateTable, SourceError>>>,
    last: Mutex<Option<Result<RateTable, SourceError>>>,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<(Commodity, NaiveDate, NaiveDate)>>,
}

impl ScriptedPrices {
    pub fn new(script: Vec<Result<RateTable, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(script.into()),
            ..Self::default()
        })
    }

    pub fn push(&self, result: Result<RateTable, SourceError>) {
        self.queue.lock().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedPrices {
    async fn fetch(&self, commodity: Commodity, start: NaiveDate, end: NaiveDate) -> Result<RateTable, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push((commodity, start, end));
        let next = self.queue.lock().pop_front();
        match next {
            Some(result) => {
                *self.last.lock() = Some(result.clone());
                result
            }
            None => self
                .last
                .lock()
                .clone()
                .unwrap_or_else(|| Err(SourceError::Transient("nothing scripted".to_owned()))),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// FX source with a fixed EUR rate on every day, or failing
#[derive(Debug)]
pub struct FixedFx {
    pub eur: Mutex<Option<Decimal>>,
    pub calls: AtomicUsize,
}

impl FixedFx {
    pub fn new(eur: Option<Decimal>) -> Arc<Self> {
        Arc::new(Self {
            eur: Mutex::new(eur),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl FxSource for FixedFx {
    fn base_currency(&self) -> Currency {
        Currency::CZK
    }

    async fn fetch_day(&self, _date: NaiveDate) -> Result<FxRates, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match *self.eur.lock() {
            Some(rate) => Ok(BTreeMap::from([(Currency::EUR, rate)])),
            None => Err(SourceError::Transient("cnb down".to_owned())),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Let spawned refresh tasks run to completion
pub async fn settle() {
    for _ in 0..200 {
        tokio::task::yield_now().await;
    }
}
