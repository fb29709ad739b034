//! Source-agnostic market snapshot handed to the tracker and formatter.

use std::time::SystemTime;

use crate::reserve::UtilizationReading;

/// One watched asset's state within a snapshot.
#[derive(Debug, Clone)]
pub struct MarketEntry {
    /// Stable identity across cycles: lower-cased token address for API
    /// sources, a fixed identifier for page-scrape sources.
    pub key: String,
    /// Display name shown in notifications and status lines.
    pub name: String,
    /// Where an operator can act on the asset: address or page URL.
    pub link: String,
    /// Derived utilization for this cycle.
    pub reading: UtilizationReading,
}

/// Point-in-time view of every watched asset for one source.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub entries: Vec<MarketEntry>,
    pub fetched_at: SystemTime,
    /// True when this snapshot was served from cache after a failed fetch.
    pub stale: bool,
}

impl MarketSnapshot {
    /// A freshly fetched snapshot.
    pub fn fresh(entries: Vec<MarketEntry>) -> Self {
        Self {
            entries,
            fetched_at: SystemTime::now(),
            stale: false,
        }
    }

    /// Whole minutes since this snapshot was fetched.
    pub fn age_minutes(&self) -> u64 {
        self.fetched_at
            .elapsed()
            .map(|age| age.as_secs() / 60)
            .unwrap_or(0)
    }
}
