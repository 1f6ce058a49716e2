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

//! Local-time helpers that survive daylight-saving transitions

use chrono::{DateTime, NaiveDate, NaiveTime, Offset, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Interval boundary cadence of the fusion clock
const QUARTER_HOUR_SECS: i64 = 15 * 60;

/// UTC instant of a local wall-clock time.
///
/// An ambiguous time (clocks going back) resolves to its earlier occurrence. A
/// time that does not exist (clocks going forward) resolves to the first valid
/// instant after the gap.
pub fn local_to_utc(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = date.and_time(time);
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }
    // DST gaps are at most an hour long in every zone we deal with
    (1..=4)
        .map(|quarters| naive + TimeDelta::minutes(15 * quarters))
        .find_map(|shifted| tz.from_local_datetime(&shifted).earliest())
        .map_or_else(|| naive.and_utc(), |dt| dt.with_timezone(&Utc))
}

pub fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    local_to_utc(tz, date, NaiveTime::MIN)
}

pub fn local_date(tz: Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// First local quarter-hour mark (wall-clock minute 0/15/30/45 in `tz`) strictly after `instant`
pub fn next_quarter_hour(tz: Tz, instant: DateTime<Utc>) -> DateTime<Utc> {
    let offset = i64::from(instant.with_timezone(&tz).offset().fix().local_minus_utc());
    let local = instant.timestamp() + offset;
    let next = (local.div_euclid(QUARTER_HOUR_SECS) + 1) * QUARTER_HOUR_SECS - offset;
    DateTime::from_timestamp(next, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
