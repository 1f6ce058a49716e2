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

//! Market vocabulary: what is traded, at which granularity, in which currency and unit.

use std::fmt;
use std::str::FromStr;

use chrono::TimeDelta;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============= Resolution =============

/// Native time granularity of a price series
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "1day")]
    Day,
    #[serde(rename = "60min")]
    Hour,
    #[serde(rename = "15min")]
    QuarterHour,
}

impl Resolution {
    /// Nominal length of one interval. Daily slots end at local midnight instead, see `Interval::end_utc`.
    pub fn duration(self) -> TimeDelta {
        match self {
            Resolution::Day => TimeDelta::days(1),
            Resolution::Hour => TimeDelta::hours(1),
            Resolution::QuarterHour => TimeDelta::minutes(15),
        }
    }

    /// How many intervals make up one hour. `None` for resolutions coarser than an hour.
    pub fn intervals_per_hour(self) -> Option<usize> {
        match self {
            Resolution::Day => None,
            Resolution::Hour => Some(1),
            Resolution::QuarterHour => Some(4),
        }
    }

    /// Stable configuration name (`1day`, `60min`, `15min`)
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Day => "1day",
            Resolution::Hour => "60min",
            Resolution::QuarterHour => "15min",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Commodity =============

/// Traded commodity. Electricity and gas are polled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commodity {
    Electricity,
    Gas,
}

impl Commodity {
    /// Resolutions the upstream publishes for this commodity, finest first.
    ///
    /// Electricity carries the official hourly settlement price next to the
    /// quarter-hour series.
    pub fn native_resolutions(self) -> &'static [Resolution] {
        match self {
            Commodity::Electricity => &[Resolution::QuarterHour, Resolution::Hour],
            Commodity::Gas => &[Resolution::Day],
        }
    }

    pub fn finest_resolution(self) -> Resolution {
        match self {
            Commodity::Electricity => Resolution::QuarterHour,
            Commodity::Gas => Resolution::Day,
        }
    }

    pub fn supports(self, resolution: Resolution) -> bool {
        self.native_resolutions().contains(&resolution)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Commodity::Electricity => "electricity",
            Commodity::Gas => "gas",
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Currency =============

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid currency code '{0}': expected three ASCII letters")]
pub struct CurrencyError(pub String);

/// ISO-4217 currency code, always stored upper-case
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const EUR: Currency = Currency(*b"EUR");
    pub const CZK: Currency = Currency(*b"CZK");

    pub fn new(code: &str) -> Result<Self, CurrencyError> {
        let bytes = code.trim().as_bytes();
        match bytes {
            [a, b, c] if bytes.iter().all(u8::is_ascii_alphabetic) => Ok(Currency([
                a.to_ascii_uppercase(),
                b.to_ascii_uppercase(),
                c.to_ascii_uppercase(),
            ])),
            _ => Err(CurrencyError(code.to_owned())),
        }
    }

    pub fn code(&self) -> &str {
        // Only ASCII letters are ever stored.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CurrencyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = CurrencyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.code().to_owned()
    }
}

// ============= Energy Unit =============

/// Energy unit a price is quoted per
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyUnit {
    #[serde(rename = "kWh")]
    KWh,
    #[serde(rename = "MWh")]
    MWh,
}

impl EnergyUnit {
    fn kwh_per_unit(self) -> Decimal {
        match self {
            EnergyUnit::KWh => Decimal::ONE,
            EnergyUnit::MWh => Decimal::ONE_THOUSAND,
        }
    }

    /// Exact factor converting a price quoted per `source` into a price per `self`.
    ///
    /// 100 EUR/MWh is 0.1 EUR/kWh, so `KWh.scale_from(MWh)` is 1/1000.
    pub fn scale_from(self, source: EnergyUnit) -> Decimal {
        if self == source {
            return Decimal::ONE;
        }
        self.kwh_per_unit() / source.kwh_per_unit()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnergyUnit::KWh => "kWh",
            EnergyUnit::MWh => "MWh",
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============= Trade Direction =============

/// Which price a derived series represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trade {
    /// Converted market price
    Spot,
    /// Price paid when buying from the grid
    Buy,
    /// Price received when selling to the grid
    Sell,
}

impl Trade {
    pub const ALL: [Trade; 3] = [Trade::Spot, Trade::Buy, Trade::Sell];

    pub fn as_str(self) -> &'static str {
        match self {
            Trade::Spot => "spot",
            Trade::Buy => "buy",
            Trade::Sell => "sell",
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
