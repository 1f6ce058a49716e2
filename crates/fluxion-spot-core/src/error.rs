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

//! Error taxonomy of the spot price engine.
//!
//! Nothing here is fatal: fetch faults become retries, transform and window
//! faults make one derived value unavailable.

use std::time::Duration;

use chrono::NaiveDate;
use fluxion_spot_types::{BlockSize, Commodity, Trade};
use thiserror::Error;

/// Fault reported by a price or FX source. Every variant is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network fault, upstream 5xx, or "temporarily unavailable"
    #[error("source temporarily unavailable: {0}")]
    Transient(String),

    /// Upstream answered with something that could not be understood
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no data published for {0}")]
    NoDataForDate(NaiveDate),

    #[error("fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The fetch task failed in a way the source did not report (e.g. a panic)
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl SourceError {
    /// Faults that may mean the upstream contract changed are logged as errors, the rest as warnings.
    pub fn is_severe(&self) -> bool {
        match self {
            SourceError::MalformedResponse(_) | SourceError::Unexpected(_) => true,
            SourceError::Transient(_) | SourceError::NoDataForDate(_) | SourceError::Timeout(_) => {
                false
            }
        }
    }
}

/// A configured price transform could not produce a value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("invalid transform configuration: {0}")]
    InvalidConfig(String),

    #[error("arithmetic overflow while applying {0}")]
    Overflow(&'static str),

    #[error("transform failed: {0}")]
    Failed(String),
}

/// Not enough contiguous intervals for the requested window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("insufficient data: need {requested} intervals, have {available}")]
pub struct InsufficientData {
    pub requested: usize,
    pub available: usize,
}

/// Why the cheapest-window search produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error(transparent)]
    Insufficient(#[from] InsufficientData),

    /// A run of prices sums past the `Decimal` range
    #[error("price sum of a {0}-interval window overflowed")]
    Overflow(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown entry '{0}'")]
    UnknownEntry(String),

    #[error("entry '{0}' already exists")]
    DuplicateEntry(String),

    #[error("{commodity} has no {resolution} series")]
    UnsupportedResolution {
        commodity: Commodity,
        resolution: fluxion_spot_types::Resolution,
    },

    #[error("no coordinator for {0}")]
    UnknownCommodity(Commodity),
}

/// Why one trade direction of a fused view has no table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectionUnavailable {
    #[error("no {0} transform configured")]
    NotConfigured(Trade),

    #[error("{trade} transform failed: {error}")]
    Transform { trade: Trade, error: TransformError },
}

/// Why one cheapest block has no window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockUnavailable {
    #[error("block {0} is not tracked by this entry")]
    NotRequested(BlockSize),

    #[error(transparent)]
    Search(#[from] WindowError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_split() {
        assert!(SourceError::MalformedResponse("bad xml".to_owned()).is_severe());
        assert!(SourceError::Unexpected("panic".to_owned()).is_severe());
        assert!(!SourceError::Timeout(Duration::from_secs(30)).is_severe());
        assert!(!SourceError::Transient("503".to_owned()).is_severe());
    }

    #[test]
    fn timeout_message_shows_seconds() {
        let msg = SourceError::Timeout(Duration::from_secs(30)).to_string();
        assert_eq!(msg, "fetch timed out after 30s");
    }
}
