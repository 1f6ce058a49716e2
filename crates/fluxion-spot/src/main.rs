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

//! FluxION spot price service
//!
//! Loads entry definitions from a TOML file, keeps the shared coordinators
//! running and logs every fused view change until interrupted.

mod replay;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use fluxion_spot_core::{AppConfig, CoordinatorRegistry, Subscription, SystemClock, ViewState};
use fluxion_spot_types::{Commodity, Currency, Trade};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::replay::{ReplayPrices, ReplayRates};

#[derive(Parser, Debug)]
#[command(name = "fluxion-spot")]
#[command(author, version, about = "Day-ahead spot price service", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Directory holding `<commodity>.json` price files and `fx/<date>.json` rate files
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Base currency of the exchange rate files
    #[arg(long, default_value = "CZK")]
    fx_base: Currency,

    /// Interval of the periodic source status report, in seconds
    #[arg(long, default_value_t = 900)]
    status_every: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting default subscriber failed")?;

    let cli = Cli::parse();
    info!("🚀 Starting FluxION spot price service");

    let config = AppConfig::from_file(&cli.config)?;
    let settings = config.provider.settings()?;
    info!(
        config = %cli.config.display(),
        entries = config.entries.len(),
        timezone = %settings.publication.timezone,
        "✅ Configuration loaded"
    );

    let clock = Arc::new(SystemClock::current()?);
    let prices = Arc::new(ReplayPrices::new(cli.data_dir.clone(), settings.publication.timezone));
    let rates = Arc::new(ReplayRates::new(cli.data_dir.join("fx"), cli.fx_base));
    let registry = CoordinatorRegistry::new(clock, settings, prices, rates);

    let mut subscriptions: Vec<Subscription> = Vec::new();
    for (id, entry) in config.entry_configs()? {
        registry
            .add_entry(&id, entry)
            .with_context(|| format!("Cannot register entry '{id}'"))?;
        let entry_id = id.clone();
        subscriptions.push(registry.watch_fused_view(&id, move |state| log_view(&entry_id, state))?);
        info!(entry = %id, "➕ Entry registered");
    }
    if subscriptions.is_empty() {
        warn!("⚠️ No entries configured, nothing to do");
    }

    let mut status = tokio::time::interval(Duration::from_secs(cli.status_every.max(1)));
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl+C")?;
                info!("🛑 Shutdown requested");
                break;
            }
            _ = status.tick() => report_status(&registry),
        }
    }

    drop(subscriptions);
    registry.shutdown();
    info!("✅ Stopped");
    Ok(())
}

fn report_status(registry: &CoordinatorRegistry) {
    for commodity in [Commodity::Electricity, Commodity::Gas] {
        if let Some(spot) = registry.spot(commodity) {
            info!(
                %commodity,
                status = ?spot.status(),
                freshness = ?spot.freshness(),
                next = ?spot.next_wakeup(),
                "💰 Spot source"
            );
        }
    }
    if let Some(fx) = registry.fx() {
        info!(status = ?fx.status(), next = ?fx.next_wakeup(), "💱 Exchange rates");
    }
}

fn log_view(id: &str, state: &ViewState) {
    let view = match state {
        Ok(view) => view,
        Err(reason) => {
            warn!(entry = %id, %reason, "⚠️ View unavailable");
            return;
        }
    };

    let now = Utc::now();
    let spot = view.spot();
    info!(
        entry = %id,
        today = %view.today,
        currency = %view.currency,
        unit = %view.unit,
        current = ?spot.current_price(now),
        order = ?spot.current_order(now),
        has_tomorrow = view.has_tomorrow(),
        degraded = view.health.is_degraded(),
        "💰 View updated"
    );
    for (block, window) in &spot.cheapest {
        match window {
            Ok(window) => info!(
                entry = %id,
                %block,
                start = %window.start.with_timezone(&view.timezone),
                end = %window.end.with_timezone(&view.timezone),
                mean = ?window.mean(),
                "Cheapest window"
            ),
            Err(e) => warn!(entry = %id, %block, error = %e, "No cheapest window"),
        }
    }
    for trade in [Trade::Buy, Trade::Sell] {
        if let Ok(series) = view.trade(trade) {
            info!(entry = %id, %trade, current = ?series.current_price(now), "Trade price");
        }
    }
}
