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

//! Buy/sell price transforms applied on top of the converted spot price

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::hhmm;
use crate::error::TransformError;

/// Turns a converted spot price into a trade price.
///
/// Receives the price per target unit, the interval start, and the entry's timezone.
pub trait PriceTransform: Send + Sync + fmt::Debug {
    fn apply(&self, value: Decimal, at: DateTime<Utc>, tz: Tz) -> Result<Decimal, TransformError>;

    /// Check the configuration once, before any price goes through it
    fn validate(&self) -> Result<(), TransformError> {
        Ok(())
    }
}

// ============= Tariff =============

/// Extra amount charged during a local wall-clock range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Surcharge {
    #[serde(with = "hhmm")]
    pub from: NaiveTime,
    /// Exclusive. A range with `to` before `from` wraps past midnight.
    #[serde(with = "hhmm")]
    pub to: NaiveTime,
    pub amount: Decimal,
}

impl Surcharge {
    pub fn applies_at(&self, local: NaiveTime) -> bool {
        if self.from < self.to {
            self.from <= local && local < self.to
        } else {
            local >= self.from || local < self.to
        }
    }
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

/// `value * multiplier + addition + surcharges`, e.g. a supplier margin plus
/// distribution fees that differ between low and high tariff hours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffTransform {
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
    #[serde(default)]
    pub addition: Decimal,
    #[serde(default)]
    pub surcharges: Vec<Surcharge>,
}

impl Default for TariffTransform {
    fn default() -> Self {
        Self {
            multiplier: Decimal::ONE,
            addition: Decimal::ZERO,
            surcharges: Vec::new(),
        }
    }
}

impl PriceTransform for TariffTransform {
    fn apply(&self, value: Decimal, at: DateTime<Utc>, tz: Tz) -> Result<Decimal, TransformError> {
        let local = at.with_timezone(&tz).time();
        let mut price = value
            .checked_mul(self.multiplier)
            .ok_or(TransformError::Overflow("multiplier"))?
            .checked_add(self.addition)
            .ok_or(TransformError::Overflow("addition"))?;
        for surcharge in self.surcharges.iter().filter(|s| s.applies_at(local)) {
            price = price
                .checked_add(surcharge.amount)
                .ok_or(TransformError::Overflow("surcharge"))?;
        }
        Ok(price)
    }

    fn validate(&self) -> Result<(), TransformError> {
        if let Some(empty) = self.surcharges.iter().find(|s| s.from == s.to) {
            return Err(TransformError::InvalidConfig(format!(
                "surcharge range {}-{} is empty",
                empty.from.format("%H:%M"),
                empty.to.format("%H:%M")
            )));
        }
        Ok(())
    }
}

// ============= Closure =============

type TransformFn = dyn Fn(Decimal, DateTime<Utc>, Tz) -> Result<Decimal, TransformError> + Send + Sync;

/// Transform backed by a closure
#[derive(Clone)]
pub struct FnTransform {
    name: String,
    f: Arc<TransformFn>,
}

impl FnTransform {
    pub fn new(
        name: impl Into<String>,
        f: impl Fn(Decimal, DateTime<Utc>, Tz) -> Result<Decimal, TransformError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }
}

impl fmt::Debug for FnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").field("name", &self.name).finish()
    }
}

impl PriceTransform for FnTransform {
    fn apply(&self, value: Decimal, at: DateTime<Utc>, tz: Tz) -> Result<Decimal, TransformError> {
        (self.f)(value, at, tz)
    }
}
