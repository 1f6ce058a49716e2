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

//! Configuration of one fused view

use std::sync::Arc;

use chrono_tz::Tz;
use fluxion_spot_types::{BlockSize, Commodity, Currency, EnergyUnit, Resolution, Trade};
use tracing::{error, warn};

use crate::error::{RegistryError, TransformError};
use crate::transform::PriceTransform;

/// Longest cheapest block, in hours
pub const MAX_BLOCK_HOURS: u8 = 23;

/// What one consumer wants to see: which series, converted to what, and which blocks to search
#[derive(Debug, Clone)]
pub struct EntryConfig {
    pub commodity: Commodity,
    pub resolution: Resolution,
    pub currency: Currency,
    pub unit: EnergyUnit,
    /// Timezone that defines "today" and "tomorrow"
    pub timezone: Tz,
    pub buy: Option<Arc<dyn PriceTransform>>,
    pub sell: Option<Arc<dyn PriceTransform>>,
    /// Requested cheapest block lengths in hours
    pub cheapest_blocks: Vec<u8>,
    /// Let blocks longer than one interval continue into tomorrow
    pub allow_cross_midnight: bool,
}

impl EntryConfig {
    /// Entry at the commodity's finest resolution, quoted in EUR/MWh, Prague time
    pub fn new(commodity: Commodity) -> Self {
        Self {
            commodity,
            resolution: commodity.finest_resolution(),
            currency: Currency::EUR,
            unit: EnergyUnit::MWh,
            timezone: chrono_tz::Europe::Prague,
            buy: None,
            sell: None,
            cheapest_blocks: Vec::new(),
            allow_cross_midnight: false,
        }
    }

    pub fn transform(&self, trade: Trade) -> Option<&Arc<dyn PriceTransform>> {
        match trade {
            Trade::Spot => None,
            Trade::Buy => self.buy.as_ref(),
            Trade::Sell => self.sell.as_ref(),
        }
    }

    /// Block sizes to search, single interval first, without duplicates.
    ///
    /// Out-of-range hour blocks and hour blocks on daily data are logged and
    /// skipped. A 1-hour block on hourly data is the single interval already.
    pub fn all_cheapest_blocks(&self) -> Vec<BlockSize> {
        let mut blocks = vec![BlockSize::SingleInterval];
        for &hours in &self.cheapest_blocks {
            if hours == 0 || hours > MAX_BLOCK_HOURS {
                error!(hours, "Invalid cheapest block size");
                continue;
            }
            let block = match self.resolution {
                Resolution::Day => {
                    warn!(hours, "Hour blocks are not available for daily prices");
                    continue;
                }
                Resolution::Hour if hours == 1 => BlockSize::SingleInterval,
                Resolution::Hour | Resolution::QuarterHour => BlockSize::Hours(hours),
            };
            if !blocks.contains(&block) {
                blocks.push(block);
            }
        }
        blocks
    }

    /// Whether prices must go through the exchange rate
    pub fn needs_fx(&self, source_currency: Currency) -> bool {
        self.currency != source_currency
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if !self.commodity.supports(self.resolution) {
            return Err(RegistryError::UnsupportedResolution {
                commodity: self.commodity,
                resolution: self.resolution,
            });
        }
        Ok(())
    }

    /// Validate configured transforms, reporting the first broken one per direction
    pub fn transform_errors(&self) -> Vec<(Trade, TransformError)> {
        [Trade::Buy, Trade::Sell]
            .into_iter()
            .filter_map(|trade| {
                let err = self.transform(trade)?.validate().err()?;
                Some((trade, err))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{Surcharge, TariffTransform};
    use chrono::NaiveTime;
    use rust_decimal::Decimal;

    #[test]
    fn blocks_at_quarter_hour() {
        let entry = EntryConfig {
            cheapest_blocks: vec![2, 0, 1, 2, 24, 4],
            ..EntryConfig::new(Commodity::Electricity)
        };
        assert_eq!(
            entry.all_cheapest_blocks(),
            vec![
                BlockSize::SingleInterval,
                BlockSize::Hours(2),
                BlockSize::Hours(1),
                BlockSize::Hours(4)
            ]
        );
    }

    #[test]
    fn one_hour_block_collapses_at_hour_resolution() {
        let entry = EntryConfig {
            resolution: Resolution::Hour,
            cheapest_blocks: vec![1, 3],
            ..EntryConfig::new(Commodity::Electricity)
        };
        assert_eq!(
            entry.all_cheapest_blocks(),
            vec![BlockSize::SingleInterval, BlockSize::Hours(3)]
        );
    }

    #[test]
    fn daily_entries_only_track_single_interval() {
        let entry = EntryConfig {
            cheapest_blocks: vec![2, 3],
            ..EntryConfig::new(Commodity::Gas)
        };
        assert_eq!(entry.all_cheapest_blocks(), vec![BlockSize::SingleInterval]);
    }

    #[test]
    fn gas_has_no_quarter_hours() {
        let entry = EntryConfig {
            resolution: Resolution::QuarterHour,
            ..EntryConfig::new(Commodity::Gas)
        };
        assert!(entry.validate().is_err());
        assert!(EntryConfig::new(Commodity::Gas).validate().is_ok());
    }

    #[test]
    fn broken_transform_is_reported() {
        let broken = TariffTransform {
            surcharges: vec![Surcharge {
                from: NaiveTime::MIN,
                to: NaiveTime::MIN,
                amount: Decimal::ONE,
            }],
            ..TariffTransform::default()
        };
        let entry = EntryConfig {
            sell: Some(Arc::new(broken)),
            buy: Some(Arc::new(TariffTransform::default())),
            ..EntryConfig::new(Commodity::Electricity)
        };
        let errors = entry.transform_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, Trade::Sell);
    }
}
