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

//! Process-wide ownership of coordinators.
//!
//! Entries share one spot coordinator per commodity and a single FX
//! coordinator; both are created on first use and torn down with their last
//! entry.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use fluxion_spot_types::Commodity;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::clock::ClockScheduler;
use crate::config::ProviderSettings;
use crate::entry::EntryConfig;
use crate::error::RegistryError;
use crate::fusion::{FusionCoordinator, ViewState};
use crate::fx_coordinator::FxRateCoordinator;
use crate::listeners::Subscription;
use crate::sources::{FxSource, PriceSource};
use crate::spot_coordinator::SpotPriceCoordinator;

#[derive(Default)]
struct RegistryInner {
    spot: BTreeMap<Commodity, Arc<SpotPriceCoordinator>>,
    fx: Option<Arc<FxRateCoordinator>>,
    entries: BTreeMap<String, Arc<FusionCoordinator>>,
}

pub struct CoordinatorRegistry {
    clock: Arc<dyn ClockScheduler>,
    settings: ProviderSettings,
    prices: Arc<dyn PriceSource>,
    rates: Arc<dyn FxSource>,
    inner: Mutex<RegistryInner>,
}

impl CoordinatorRegistry {
    pub fn new(
        clock: Arc<dyn ClockScheduler>,
        settings: ProviderSettings,
        prices: Arc<dyn PriceSource>,
        rates: Arc<dyn FxSource>,
    ) -> Self {
        Self {
            clock,
            settings,
            prices,
            rates,
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Register an entry and start whatever coordinators it needs
    pub fn add_entry(&self, id: &str, config: EntryConfig) -> Result<Arc<FusionCoordinator>, RegistryError> {
        config.validate()?;
        let fusion = {
            let mut inner = self.inner.lock();
            if inner.entries.contains_key(id) {
                return Err(RegistryError::DuplicateEntry(id.to_owned()));
            }

            let spot = Arc::clone(inner.spot.entry(config.commodity).or_insert_with(|| {
                let coordinator = Arc::new(SpotPriceCoordinator::new(
                    config.commodity,
                    Arc::clone(&self.prices),
                    Arc::clone(&self.clock),
                    self.settings.publication,
                    self.settings.refresh,
                ));
                coordinator.start();
                coordinator
            }));

            let fx = if config.needs_fx(spot.currency()) {
                Some(Arc::clone(inner.fx.get_or_insert_with(|| {
                    let coordinator = Arc::new(FxRateCoordinator::new(
                        Arc::clone(&self.rates),
                        self.settings.publication.timezone,
                        Arc::clone(&self.clock),
                        self.settings.refresh,
                    ));
                    coordinator.start();
                    coordinator
                })))
            } else {
                None
            };

            let fusion = FusionCoordinator::new(id, config, spot, fx, Arc::clone(&self.clock));
            inner.entries.insert(id.to_owned(), Arc::clone(&fusion));
            fusion
        };
        fusion.start();
        info!(entry = id, "➕ Entry added");
        Ok(fusion)
    }

    /// Tear down an entry, and its source coordinators when nothing else uses them
    pub fn remove_entry(&self, id: &str) -> Result<(), RegistryError> {
        let (fusion, released) = {
            let mut inner = self.inner.lock();
            let fusion = inner
                .entries
                .remove(id)
                .ok_or_else(|| RegistryError::UnknownEntry(id.to_owned()))?;

            let commodity = fusion.config().commodity;
            let mut released: Vec<Box<dyn FnOnce() + Send>> = Vec::new();
            let spot_in_use = inner.entries.values().any(|e| e.config().commodity == commodity);
            if let Some(spot) = (!spot_in_use).then(|| inner.spot.remove(&commodity)).flatten() {
                released.push(Box::new(move || spot.stop()));
            }
            let fx_in_use = inner.entries.values().any(|e| {
                inner
                    .spot
                    .get(&e.config().commodity)
                    .is_some_and(|spot| e.config().needs_fx(spot.currency()))
            });
            if !fx_in_use {
                if let Some(fx) = inner.fx.take() {
                    released.push(Box::new(move || fx.stop()));
                }
            }
            (fusion, released)
        };

        fusion.stop();
        for release in released {
            release();
        }
        info!(entry = id, "➖ Entry removed");
        Ok(())
    }

    pub fn entry(&self, id: &str) -> Result<Arc<FusionCoordinator>, RegistryError> {
        self.inner
            .lock()
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownEntry(id.to_owned()))
    }

    pub fn entry_ids(&self) -> Vec<String> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    pub fn spot(&self, commodity: Commodity) -> Option<Arc<SpotPriceCoordinator>> {
        self.inner.lock().spot.get(&commodity).cloned()
    }

    pub fn fx(&self) -> Option<Arc<FxRateCoordinator>> {
        self.inner.lock().fx.clone()
    }

    pub fn current_fused_view(&self, id: &str) -> Result<ViewState, RegistryError> {
        Ok(self.entry(id)?.current())
    }

    pub fn on_fused_view_changed(
        &self,
        id: &str,
        listener: impl Fn(&ViewState) + Send + Sync + 'static,
    ) -> Result<Subscription, RegistryError> {
        Ok(self.entry(id)?.subscribe(listener))
    }

    /// Subscribe, then hand `listener` the state the entry is already in
    pub fn watch_fused_view(
        &self,
        id: &str,
        listener: impl Fn(&ViewState) + Send + Sync + 'static,
    ) -> Result<Subscription, RegistryError> {
        let fusion = self.entry(id)?;
        let listener = Arc::new(listener);
        let subscription = fusion.subscribe({
            let listener = Arc::clone(&listener);
            move |state| (*listener)(state)
        });
        (*listener)(&fusion.current());
        Ok(subscription)
    }

    /// Fetch `commodity` now instead of waiting for its timer
    pub async fn request_immediate_refresh(&self, commodity: Commodity) -> Result<(), RegistryError> {
        let spot = self
            .spot(commodity)
            .ok_or(RegistryError::UnknownCommodity(commodity))?;
        if let Err(e) = spot.refresh_now().await {
            warn!(%commodity, error = %e, "Requested refresh failed, retry scheduled");
        }
        Ok(())
    }

    /// Stop every coordinator and forget all entries
    pub fn shutdown(&self) {
        let inner = std::mem::take(&mut *self.inner.lock());
        for fusion in inner.entries.values() {
            fusion.stop();
        }
        for spot in inner.spot.values() {
            spot.stop();
        }
        if let Some(fx) = &inner.fx {
            fx.stop();
        }
        info!(entries = inner.entries.len(), "🛑 Coordinators shut down");
    }
}

impl fmt::Debug for CoordinatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CoordinatorRegistry")
            .field("entries", &inner.entries.keys().collect::<Vec<_>>())
            .field("spot", &inner.spot.keys().collect::<Vec<_>>())
            .field("fx", &inner.fx.is_some())
            .finish_non_exhaustive()
    }
}
