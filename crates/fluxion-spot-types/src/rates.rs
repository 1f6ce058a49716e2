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

//! Price tables and their per-day views.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;

use crate::market::Resolution;

// ============= Interval =============

/// One priced time slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub start_utc: DateTime<Utc>,
    /// Same instant in the timezone of the table that holds this interval
    pub start_local: DateTime<Tz>,
    pub price: Decimal,
}

impl Interval {
    pub fn new(start_utc: DateTime<Utc>, tz: Tz, price: Decimal) -> Self {
        Self {
            start_utc,
            start_local: start_utc.with_timezone(&tz),
            price,
        }
    }

    pub fn local_date(&self) -> NaiveDate {
        self.start_local.date_naive()
    }

    /// Exclusive end of the slot.
    ///
    /// A daily slot runs to the next local midnight, so it lasts 23 or 25 hours
    /// on daylight-saving transition days.
    pub fn end_utc(&self, resolution: Resolution) -> DateTime<Utc> {
        let fixed = self.start_utc + resolution.duration();
        match resolution {
            Resolution::Day => {
                let tz = self.start_local.timezone();
                self.local_date()
                    .succ_opt()
                    .and_then(|next| tz.from_local_datetime(&next.and_time(NaiveTime::MIN)).earliest())
                    .map_or(fixed, |midnight| midnight.with_timezone(&Utc))
            }
            Resolution::Hour | Resolution::QuarterHour => fixed,
        }
    }

    /// True when `instant` falls inside the slot
    pub fn covers(&self, resolution: Resolution, instant: DateTime<Utc>) -> bool {
        self.start_utc <= instant && instant < self.end_utc(resolution)
    }
}

// ============= Rate Table =============

type Series = BTreeMap<DateTime<Utc>, Interval>;

/// Immutable set of price series keyed by resolution, then by UTC start.
///
/// A new table is produced on every successful fetch and every conversion;
/// existing tables are never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateTable {
    tz: Tz,
    series: BTreeMap<Resolution, Series>,
}

/// Collects intervals for a [`RateTable`]. Later inserts for the same slot replace earlier ones.
#[derive(Debug, Clone)]
pub struct RateTableBuilder {
    tz: Tz,
    series: BTreeMap<Resolution, Series>,
}

impl RateTableBuilder {
    pub fn insert(&mut self, resolution: Resolution, start_utc: DateTime<Utc>, price: Decimal) -> &mut Self {
        self.series
            .entry(resolution)
            .or_default()
            .insert(start_utc, Interval::new(start_utc, self.tz, price));
        self
    }

    pub fn build(self) -> RateTable {
        RateTable {
            tz: self.tz,
            series: self.series,
        }
    }
}

impl RateTable {
    pub fn builder(tz: Tz) -> RateTableBuilder {
        RateTableBuilder {
            tz,
            series: BTreeMap::new(),
        }
    }

    pub fn empty(tz: Tz) -> Self {
        Self::builder(tz).build()
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn resolutions(&self) -> impl Iterator<Item = Resolution> + '_ {
        self.series.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(BTreeMap::is_empty)
    }

    /// Number of intervals at one resolution
    pub fn len(&self, resolution: Resolution) -> usize {
        self.series.get(&resolution).map_or(0, BTreeMap::len)
    }

    /// Intervals of one resolution in time order
    pub fn intervals(&self, resolution: Resolution) -> impl Iterator<Item = &Interval> + '_ {
        self.series.get(&resolution).into_iter().flat_map(BTreeMap::values)
    }

    /// True when an interval starts exactly at `start`
    pub fn has_price_at(&self, resolution: Resolution, start: DateTime<Utc>) -> bool {
        self.series
            .get(&resolution)
            .is_some_and(|s| s.contains_key(&start))
    }

    /// Interval covering `instant`, if any
    pub fn interval_at(&self, resolution: Resolution, instant: DateTime<Utc>) -> Option<&Interval> {
        let (_, interval) = self.series.get(&resolution)?.range(..=instant).next_back()?;
        interval.covers(resolution, instant).then_some(interval)
    }

    pub fn latest_start(&self, resolution: Resolution) -> Option<DateTime<Utc>> {
        self.series
            .get(&resolution)?
            .last_key_value()
            .map(|(start, _)| *start)
    }

    /// Intervals whose local date in `tz` equals `date`
    pub fn day_slice(&self, resolution: Resolution, date: NaiveDate, tz: Tz) -> DaySlice {
        let intervals = self
            .intervals(resolution)
            .filter(|i| i.start_utc.with_timezone(&tz).date_naive() == date)
            .map(|i| Interval::new(i.start_utc, tz, i.price))
            .collect();
        DaySlice {
            date,
            resolution,
            intervals,
        }
    }

    /// New table with every price replaced by `f(interval)`.
    ///
    /// Stops at the first error.
    pub fn map_prices<E, F>(&self, mut f: F) -> Result<RateTable, E>
    where
        F: FnMut(Resolution, &Interval) -> Result<Decimal, E>,
    {
        let mut series = BTreeMap::new();
        for (resolution, intervals) in &self.series {
            let mut mapped = Series::new();
            for (start, interval) in intervals {
                let price = f(*resolution, interval)?;
                mapped.insert(
                    *start,
                    Interval {
                        price,
                        ..interval.clone()
                    },
                );
            }
            series.insert(*resolution, mapped);
        }
        Ok(RateTable { tz: self.tz, series })
    }

    /// Same prices, local timestamps expressed in `tz`
    pub fn with_timezone(&self, tz: Tz) -> RateTable {
        let series = self
            .series
            .iter()
            .map(|(resolution, intervals)| {
                let relocated = intervals
                    .iter()
                    .map(|(start, i)| (*start, Interval::new(*start, tz, i.price)))
                    .collect();
                (*resolution, relocated)
            })
            .collect();
        RateTable { tz, series }
    }
}

// ============= Day Slice =============

/// Intervals of a single local calendar day, in time order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySlice {
    date: NaiveDate,
    resolution: Resolution,
    intervals: Vec<Interval>,
}

impl DaySlice {
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn first(&self) -> Option<&Interval> {
        self.intervals.first()
    }

    pub fn prices(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.intervals.iter().map(|i| i.price)
    }

    pub fn interval_at(&self, instant: DateTime<Utc>) -> Option<&Interval> {
        self.intervals
            .iter()
            .find(|i| i.covers(self.resolution, instant))
    }

    /// Lowest price; the earliest interval wins a tie
    pub fn cheapest(&self) -> Option<&Interval> {
        self.intervals
            .iter()
            .reduce(|best, i| if i.price < best.price { i } else { best })
    }

    /// Highest price; the earliest interval wins a tie
    pub fn most_expensive(&self) -> Option<&Interval> {
        self.intervals
            .iter()
            .reduce(|best, i| if i.price > best.price { i } else { best })
    }

    /// 1-based rank of the interval starting at `start` when the day is sorted by price.
    ///
    /// Equal prices keep time order, so the earlier interval ranks first.
    pub fn order_of(&self, start: DateTime<Utc>) -> Option<usize> {
        let target = self.intervals.iter().find(|i| i.start_utc == start)?;
        let ahead = self
            .intervals
            .iter()
            .filter(|i| {
                i.price < target.price || (i.price == target.price && i.start_utc < target.start_utc)
            })
            .count();
        Some(ahead + 1)
    }

    /// Rank of every interval, in time order
    pub fn orders(&self) -> Vec<(DateTime<Utc>, usize)> {
        let mut sorted: Vec<&Interval> = self.intervals.iter().collect();
        sorted.sort_by(|a, b| a.price.cmp(&b.price).then(a.start_utc.cmp(&b.start_utc)));
        let mut ranks: Vec<(DateTime<Utc>, usize)> = sorted
            .iter()
            .enumerate()
            .map(|(idx, i)| (i.start_utc, idx + 1))
            .collect();
        ranks.sort_by_key(|(start, _)| *start);
        ranks
    }

    /// `None` for an empty day or when the sum does not fit a `Decimal`
    pub fn mean(&self) -> Option<Decimal> {
        if self.intervals.is_empty() {
            return None;
        }
        self.prices()
            .try_fold(Decimal::ZERO, Decimal::checked_add)?
            .checked_div(Decimal::from(self.intervals.len()))
    }
}
