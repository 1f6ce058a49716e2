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

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveTime;
use chrono_tz::Tz;
use fluxion_spot_types::{Commodity, Currency, EnergyUnit, Resolution};
use serde::Deserialize;

use crate::entry::EntryConfig;
use crate::refresh::RefreshPolicy;
use crate::spot_coordinator::PublicationPolicy;
use crate::transform::{PriceTransform, TariffTransform};

/// `HH:MM` wall-clock times
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(raw.trim(), FORMAT)
            .map_err(|e| D::Error::custom(format!("invalid time '{raw}', expected HH:MM: {e}")))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub entries: Vec<EntryFileConfig>,
}

/// Market publication and polling settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_publication_time", with = "hhmm")]
    pub publication_time: NaiveTime,
    #[serde(default = "default_jitter_secs")]
    pub jitter_secs: u64,
    #[serde(default = "default_late_retry_secs")]
    pub late_retry_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Unset keeps exponential backoff uncapped
    #[serde(default)]
    pub max_retry_delay_secs: Option<u64>,
}

/// One `[[entries]]` table
#[derive(Debug, Clone, Deserialize)]
pub struct EntryFileConfig {
    pub id: String,
    pub commodity: Commodity,
    /// Defaults to the commodity's finest resolution
    #[serde(default)]
    pub resolution: Option<Resolution>,
    #[serde(default = "default_currency")]
    pub currency: Currency,
    #[serde(default = "default_unit")]
    pub unit: EnergyUnit,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub cheapest_blocks: Vec<u8>,
    #[serde(default)]
    pub allow_cross_midnight: bool,
    #[serde(default)]
    pub buy: Option<TariffTransform>,
    #[serde(default)]
    pub sell: Option<TariffTransform>,
}

/// Resolved provider settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProviderSettings {
    pub publication: PublicationPolicy,
    pub refresh: RefreshPolicy,
}

fn default_timezone() -> String {
    "Europe/Prague".to_owned()
}

fn default_publication_time() -> NaiveTime {
    NaiveTime::from_hms_opt(13, 10, 0).unwrap_or(NaiveTime::MIN)
}

fn default_jitter_secs() -> u64 {
    120
}

fn default_late_retry_secs() -> u64 {
    120
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_currency() -> Currency {
    Currency::EUR
}

fn default_unit() -> EnergyUnit {
    EnergyUnit::MWh
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            publication_time: default_publication_time(),
            jitter_secs: default_jitter_secs(),
            late_retry_secs: default_late_retry_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_retry_delay_secs: None,
        }
    }
}

fn parse_timezone(raw: &str, field: &str) -> Result<Tz> {
    raw.parse::<Tz>()
        .map_err(|e| anyhow::anyhow!("{field}: unknown timezone '{raw}': {e}"))
}

impl ProviderConfig {
    pub fn settings(&self) -> Result<ProviderSettings> {
        Ok(ProviderSettings {
            publication: PublicationPolicy {
                timezone: parse_timezone(&self.timezone, "provider.timezone")?,
                publication_time: self.publication_time,
                max_jitter: Duration::from_secs(self.jitter_secs),
                late_retry: Duration::from_secs(self.late_retry_secs),
            },
            refresh: RefreshPolicy {
                fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
                max_retry_delay: self.max_retry_delay_secs.map(Duration::from_secs),
            },
        })
    }
}

impl EntryFileConfig {
    pub fn to_entry_config(&self) -> Result<EntryConfig> {
        let timezone = parse_timezone(&self.timezone, &format!("entries.{}.timezone", self.id))?;
        let buy = self.buy.clone().map(|t| Arc::new(t) as Arc<dyn PriceTransform>);
        let sell = self.sell.clone().map(|t| Arc::new(t) as Arc<dyn PriceTransform>);
        Ok(EntryConfig {
            commodity: self.commodity,
            resolution: self.resolution.unwrap_or(self.commodity.finest_resolution()),
            currency: self.currency,
            unit: self.unit,
            timezone,
            buy,
            sell,
            cheapest_blocks: self.cheapest_blocks.clone(),
            allow_cross_midnight: self.allow_cross_midnight,
        })
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.provider.settings()?;
        if self.provider.fetch_timeout_secs == 0 {
            bail!("provider.fetch_timeout_secs must be greater than zero");
        }
        if self.provider.max_retry_delay_secs == Some(0) {
            bail!("provider.max_retry_delay_secs must be greater than zero when set");
        }

        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            if entry.id.trim().is_empty() {
                bail!("entries.id must not be empty");
            }
            if !seen.insert(entry.id.as_str()) {
                bail!("duplicate entry id '{}'", entry.id);
            }
            let resolved = entry.to_entry_config()?;
            resolved
                .validate()
                .with_context(|| format!("entry '{}'", entry.id))?;
        }
        Ok(())
    }

    /// Entries keyed by id, in file order
    pub fn entry_configs(&self) -> Result<Vec<(String, EntryConfig)>> {
        self.entries
            .iter()
            .map(|e| Ok((e.id.clone(), e.to_entry_config()?)))
            .collect()
    }
}
