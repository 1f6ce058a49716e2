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

//! Cheapest contiguous block search

use fluxion_spot_types::{Interval, Resolution, Window};
use rust_decimal::Decimal;

use crate::error::{InsufficientData, WindowError};

/// Find the run of `window_size` consecutive intervals with the lowest price sum.
///
/// `None` (or zero) means a single interval. `intervals` must be time-ordered
/// and gap-free at `resolution`. On equal sums the earliest run wins.
pub fn find_cheapest_window(
    intervals: &[Interval],
    window_size: Option<usize>,
    resolution: Resolution,
) -> Result<Window, WindowError> {
    let size = window_size.unwrap_or(1).max(1);
    if intervals.len() < size {
        return Err(InsufficientData {
            requested: size,
            available: intervals.len(),
        }
        .into());
    }
    let overflow = WindowError::Overflow(size);

    let mut sum = intervals[..size]
        .iter()
        .try_fold(Decimal::ZERO, |acc, i| acc.checked_add(i.price))
        .ok_or(overflow)?;
    let mut best_sum = sum;
    let mut best_start = 0;
    for start in 1..=intervals.len() - size {
        sum = sum
            .checked_add(intervals[start + size - 1].price)
            .and_then(|s| s.checked_sub(intervals[start - 1].price))
            .ok_or(overflow)?;
        if sum < best_sum {
            best_sum = sum;
            best_start = start;
        }
    }

    let run = &intervals[best_start..best_start + size];
    Ok(Window {
        start: run[0].start_utc,
        end: run[size - 1].end_utc(resolution),
        prices: run.iter().map(|i| i.price).collect(),
    })
}
