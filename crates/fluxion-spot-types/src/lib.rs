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

//! Data model shared by the spot price engine and its consumers.
//!
//! Everything here is plain data: no timers, no I/O. Tables are built once and
//! replaced wholesale, never edited in place.

pub mod market;
pub mod rates;
pub mod window;

pub use market::{Commodity, Currency, CurrencyError, EnergyUnit, Resolution, Trade};
pub use rates::{DaySlice, Interval, RateTable, RateTableBuilder};
pub use window::{BlockSize, Window};
