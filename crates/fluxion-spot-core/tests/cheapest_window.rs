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

//! Cheapest block search over a realistic day of prices

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use fluxion_spot_core::{InsufficientData, WindowError, find_cheapest_window};
use fluxion_spot_types::{Interval, Resolution};
use rust_decimal::Decimal;

const PRICES: [i64; 24] = [
    10, 12, 14, 11, 13, 15, 9, 11, 3, 1, 2, 4, 10, 12, 14, 13, 14, 19, 17, 18, 14, 15, 17, 11,
];

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap()
}

fn intervals(prices: &[i64], resolution: Resolution) -> Vec<Interval> {
    prices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let start = base() + resolution.duration() * i32::try_from(i).unwrap();
            Interval::new(start, chrono_tz::Europe::Prague, Decimal::from(*p))
        })
        .collect()
}

fn assert_window(resolution: Resolution, size: Option<usize>, expected: &[i64], offset: i32) {
    let all = intervals(&PRICES, resolution);
    let window = find_cheapest_window(&all, size, resolution).unwrap();

    let expected: Vec<Decimal> = expected.iter().map(|p| Decimal::from(*p)).collect();
    let step = resolution.duration();
    let len = i32::try_from(expected.len()).unwrap();
    assert_eq!(window.prices, expected, "size {size:?} at {resolution}");
    assert_eq!(window.start, base() + step * offset);
    assert_eq!(window.end, base() + step * (offset + len));
}

#[test]
fn hourly_blocks() {
    assert_window(Resolution::Hour, None, &[1], 9);
    assert_window(Resolution::Hour, Some(2), &[1, 2], 9);
    assert_window(Resolution::Hour, Some(3), &[3, 1, 2], 8);
    assert_window(Resolution::Hour, Some(4), &[3, 1, 2, 4], 8);
    assert_window(Resolution::Hour, Some(5), &[3, 1, 2, 4, 10], 8);
    assert_window(Resolution::Hour, Some(6), &[9, 11, 3, 1, 2, 4], 6);
}

#[test]
fn quarter_hour_blocks() {
    assert_window(Resolution::QuarterHour, None, &[1], 9);
    // One hour is four quarter-hours
    assert_window(Resolution::QuarterHour, Some(4), &[3, 1, 2, 4], 8);
    assert_window(Resolution::QuarterHour, Some(8), &[9, 11, 3, 1, 2, 4, 10, 12], 6);
}

#[test]
fn result_is_minimal_among_all_runs() {
    let all = intervals(&PRICES, Resolution::Hour);
    for size in 1..=PRICES.len() {
        let window = find_cheapest_window(&all, Some(size), Resolution::Hour).unwrap();
        let best = window.sum().unwrap();
        for run in PRICES.windows(size) {
            let sum: i64 = run.iter().sum();
            assert!(best <= Decimal::from(sum), "size {size}: {best} > {sum}");
        }
        assert_eq!(window.len(), size);
    }
}

#[test]
fn insufficient_data() {
    for resolution in [Resolution::Hour, Resolution::QuarterHour, Resolution::Day] {
        for size in [None, Some(1), Some(2), Some(8)] {
            let err = find_cheapest_window(&[], size, resolution).unwrap_err();
            assert!(matches!(err, WindowError::Insufficient(InsufficientData { available: 0, .. })));
        }

        let single = intervals(&[5], resolution);
        assert!(find_cheapest_window(&single, None, resolution).is_ok());
        assert_eq!(
            find_cheapest_window(&single, Some(2), resolution).unwrap_err(),
            WindowError::Insufficient(InsufficientData {
                requested: 2,
                available: 1
            })
        );
    }
}
