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

//! Spot price aggregation and scheduling engine.
//!
//! Two source coordinators poll day-ahead prices and exchange rates with
//! retry/backoff; fusion coordinators combine them into converted,
//! transformed and window-annotated views per configured entry.

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod fusion;
pub mod fx_coordinator;
pub mod listeners;
pub mod refresh;
pub mod registry;
pub mod sources;
pub mod spot_coordinator;
pub mod time_utils;
pub mod transform;
pub mod window;

// Re-export common types for convenience
pub use clock::{ClockScheduler, ManualClock, SystemClock, TimerHandle};
pub use config::{AppConfig, ProviderSettings};
pub use entry::EntryConfig;
pub use error::{
    BlockUnavailable, DirectionUnavailable, InsufficientData, RegistryError, SourceError, TransformError,
    WindowError,
};
pub use fusion::{FusedView, FusionCoordinator, SourceHealth, TradeSeries, ViewState, ViewUnavailable};
pub use fx_coordinator::{FxRateCoordinator, FxSnapshot};
pub use listeners::Subscription;
pub use refresh::{RefreshPolicy, SourceId, SourceStatus};
pub use registry::CoordinatorRegistry;
pub use sources::{FxRates, FxSource, PriceSource};
pub use spot_coordinator::{Freshness, PublicationPolicy, SpotPriceCoordinator};
pub use transform::{FnTransform, PriceTransform, TariffTransform};
pub use window::find_cheapest_window;
