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

//! Upstream collaborators. Wire formats live behind these traits.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use fluxion_spot_types::{Commodity, Currency, EnergyUnit, RateTable};
use rust_decimal::Decimal;

use crate::error::SourceError;

/// Day-ahead market price feed
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Parsed price points for `commodity` covering provider-local dates `start..=end`
    async fn fetch(&self, commodity: Commodity, start: NaiveDate, end: NaiveDate) -> Result<RateTable, SourceError>;

    /// Currency the feed quotes in
    fn currency(&self) -> Currency {
        Currency::EUR
    }

    /// Unit the feed quotes per
    fn unit(&self) -> EnergyUnit {
        EnergyUnit::MWh
    }

    /// Data source name for logging
    fn name(&self) -> &str;
}

/// Units of the base currency for one unit of each listed currency
pub type FxRates = BTreeMap<Currency, Decimal>;

/// Daily exchange-rate feed
#[async_trait]
pub trait FxSource: Send + Sync {
    /// Currency the rates are expressed in
    fn base_currency(&self) -> Currency;

    /// Rates published for `date`. `SourceError::NoDataForDate` when the provider
    /// publishes nothing that day (weekends, holidays).
    async fn fetch_day(&self, date: NaiveDate) -> Result<FxRates, SourceError>;

    fn name(&self) -> &str;
}

impl fmt::Debug for dyn PriceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PriceSource({})", self.name())
    }
}

impl fmt::Debug for dyn FxSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FxSource({})", self.name())
    }
}
