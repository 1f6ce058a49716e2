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

//! File-backed sources replaying already-parsed upstream data

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use fluxion_spot_core::{FxRates, FxSource, PriceSource, SourceError};
use fluxion_spot_types::{Commodity, Currency, RateTable, Resolution};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

/// One parsed price point as stored in `<data-dir>/<commodity>.json`
#[derive(Debug, Clone, Deserialize)]
pub struct PricePoint {
    pub start: DateTime<Utc>,
    pub resolution: Resolution,
    pub price: Decimal,
}

/// Serves price points from `<data-dir>/electricity.json` and `<data-dir>/gas.json`
#[derive(Debug, Clone)]
pub struct ReplayPrices {
    dir: PathBuf,
    timezone: Tz,
}

impl ReplayPrices {
    pub fn new(dir: PathBuf, timezone: Tz) -> Self {
        Self { dir, timezone }
    }
}

#[async_trait]
impl PriceSource for ReplayPrices {
    async fn fetch(&self, commodity: Commodity, start: NaiveDate, end: NaiveDate) -> Result<RateTable, SourceError> {
        let path = self.dir.join(format!("{commodity}.json"));
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SourceError::Transient(format!("{}: {e}", path.display())))?;
        let points: Vec<PricePoint> = serde_json::from_str(&raw)
            .map_err(|e| SourceError::MalformedResponse(format!("{}: {e}", path.display())))?;

        let mut builder = RateTable::builder(self.timezone);
        let mut kept = 0usize;
        for point in points {
            if !commodity.supports(point.resolution) {
                return Err(SourceError::MalformedResponse(format!(
                    "{} has no {} series",
                    commodity, point.resolution
                )));
            }
            let local = point.start.with_timezone(&self.timezone).date_naive();
            if (start..=end).contains(&local) {
                builder.insert(point.resolution, point.start, point.price);
                kept += 1;
            }
        }
        debug!(%commodity, kept, path = %path.display(), "Replayed price points");
        Ok(builder.build())
    }

    fn name(&self) -> &str {
        "replay"
    }
}

/// Serves exchange rates from `<dir>/<YYYY-MM-DD>.json`
#[derive(Debug, Clone)]
pub struct ReplayRates {
    dir: PathBuf,
    base: Currency,
}

impl ReplayRates {
    pub fn new(dir: PathBuf, base: Currency) -> Self {
        Self { dir, base }
    }
}

#[async_trait]
impl FxSource for ReplayRates {
    fn base_currency(&self) -> Currency {
        self.base
    }

    async fn fetch_day(&self, date: NaiveDate) -> Result<FxRates, SourceError> {
        let path = self.dir.join(format!("{}.json", date.format("%Y-%m-%d")));
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(SourceError::NoDataForDate(date)),
            Err(e) => return Err(SourceError::Transient(format!("{}: {e}", path.display()))),
        };
        let parsed: BTreeMap<String, Decimal> = serde_json::from_str(&raw)
            .map_err(|e| SourceError::MalformedResponse(format!("{}: {e}", path.display())))?;

        parsed
            .into_iter()
            .map(|(code, rate)| {
                let currency = Currency::new(&code).map_err(|e| SourceError::MalformedResponse(e.to_string()))?;
                Ok((currency, rate))
            })
            .collect()
    }

    fn name(&self) -> &str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Prague;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    #[tokio::test]
    async fn prices_filtered_by_local_date() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("electricity.json"),
            r#"[
                {"start": "2025-01-13T23:00:00Z", "resolution": "60min", "price": "80.5"},
                {"start": "2025-01-14T23:00:00Z", "resolution": "60min", "price": "81"},
                {"start": "2025-01-14T23:00:00Z", "resolution": "15min", "price": "79.25"},
                {"start": "2025-01-16T23:00:00Z", "resolution": "60min", "price": 90}
            ]"#,
        )
        .unwrap();
        let source = ReplayPrices::new(dir.path().to_path_buf(), Prague);

        let table = source.fetch(Commodity::Electricity, date(14), date(16)).await.unwrap();
        let hourly: Vec<_> = table.intervals(Resolution::Hour).map(|i| i.price).collect();
        assert_eq!(hourly, vec![dec!(80.5), dec!(81)]);
        assert_eq!(table.len(Resolution::QuarterHour), 1);
    }

    #[tokio::test]
    async fn missing_or_broken_price_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = ReplayPrices::new(dir.path().to_path_buf(), Prague);
        let err = source.fetch(Commodity::Gas, date(14), date(16)).await.unwrap_err();
        assert!(matches!(err, SourceError::Transient(_)));

        std::fs::write(dir.path().join("gas.json"), "not json").unwrap();
        let err = source.fetch(Commodity::Gas, date(14), date(16)).await.unwrap_err();
        assert!(matches!(err, SourceError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn fx_days() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("2025-01-10.json"), r#"{"EUR": "25.08", "usd": "24.1"}"#).unwrap();
        let source = ReplayRates::new(dir.path().to_path_buf(), Currency::CZK);

        let rates = source.fetch_day(date(10)).await.unwrap();
        assert_eq!(rates.get(&Currency::EUR), Some(&dec!(25.08)));
        assert_eq!(rates.get(&Currency::new("USD").unwrap()), Some(&dec!(24.1)));

        assert_eq!(
            source.fetch_day(date(11)).await.unwrap_err(),
            SourceError::NoDataForDate(date(11))
        );
    }
}
