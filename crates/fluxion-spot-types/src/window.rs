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

//! Contiguous runs of intervals and the block sizes consumers ask for.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::market::Resolution;

/// Requested length of a cheapest block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockSize {
    /// One native interval
    SingleInterval,
    /// Whole hours, 1..=23
    Hours(u8),
}

impl BlockSize {
    /// Number of native intervals the block covers at `resolution`.
    ///
    /// `None` when the block cannot be expressed at that resolution (hour blocks on daily data).
    pub fn window_len(self, resolution: Resolution) -> Option<usize> {
        match self {
            BlockSize::SingleInterval => Some(1),
            BlockSize::Hours(hours) => resolution
                .intervals_per_hour()
                .map(|per_hour| per_hour * usize::from(hours)),
        }
    }
}

impl fmt::Display for BlockSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockSize::SingleInterval => f.write_str("interval"),
            BlockSize::Hours(hours) => write!(f, "{hours}h"),
        }
    }
}

/// A contiguous run of intervals. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub prices: Vec<Decimal>,
}

impl Window {
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// `None` when the total does not fit a `Decimal`
    pub fn sum(&self) -> Option<Decimal> {
        self.prices.iter().copied().try_fold(Decimal::ZERO, Decimal::checked_add)
    }

    pub fn mean(&self) -> Option<Decimal> {
        if self.prices.is_empty() {
            return None;
        }
        self.sum()?.checked_div(Decimal::from(self.prices.len()))
    }

    pub fn min(&self) -> Option<Decimal> {
        self.prices.iter().copied().min()
    }

    pub fn max(&self) -> Option<Decimal> {
        self.prices.iter().copied().max()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}
