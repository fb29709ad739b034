//! Concrete [`MarketSource`] implementations for the two upstreams.

use async_trait::async_trait;
use tracing::{debug, warn};

use capwatch_api::{HyperLendClient, HypurrFiClient, PageStatus};

use crate::config::Watchlist;
use crate::math::WAD;
use crate::reserve::{compute_utilization, UtilizationReading};
use crate::snapshot::{MarketEntry, MarketSnapshot};
use crate::source::{MarketSource, SourceError};

/// HyperLend markets API source, filtered to the watchlist.
pub struct HyperLendSource {
    client: HyperLendClient,
    watchlist: Watchlist,
}

impl HyperLendSource {
    pub fn new(client: HyperLendClient, watchlist: Watchlist) -> Self {
        Self { client, watchlist }
    }
}

#[async_trait]
impl MarketSource for HyperLendSource {
    fn label(&self) -> &str {
        "HyperLend"
    }

    async fn fetch(&self) -> Result<MarketSnapshot, SourceError> {
        let reserves = self.client.fetch_reserves().await?;

        let entries: Vec<MarketEntry> = reserves
            .iter()
            .filter(|r| self.watchlist.should_track(&r.underlying_asset, &r.symbol))
            .filter_map(|r| {
                let Some(reading) = compute_utilization(r) else {
                    warn!(
                        asset = %r.underlying_asset,
                        "reserve magnitudes overflow, skipping record"
                    );
                    return None;
                };
                let key = r.underlying_asset.to_lowercase();
                Some(MarketEntry {
                    name: self.watchlist.display_name(&r.underlying_asset, &r.symbol),
                    link: key.clone(),
                    key,
                    reading,
                })
            })
            .collect();

        if entries.is_empty() {
            warn!(
                reserves = reserves.len(),
                "no watched assets in markets response"
            );
        } else {
            debug!(watched = entries.len(), "built market snapshot");
        }

        Ok(MarketSnapshot::fresh(entries))
    }
}

/// HypurrFi page-scrape source tracking a single pooled market.
pub struct HypurrFiSource {
    client: HypurrFiClient,
    url: String,
    key: String,
    name: String,
}

impl HypurrFiSource {
    pub fn new(client: HypurrFiClient, url: String, key: String, name: String) -> Self {
        Self {
            client,
            url,
            key,
            name,
        }
    }
}

#[async_trait]
impl MarketSource for HypurrFiSource {
    fn label(&self) -> &str {
        "HypurrFi"
    }

    async fn fetch(&self) -> Result<MarketSnapshot, SourceError> {
        let status = self.client.fetch_page(&self.url).await?;

        let reading = reading_from_page(&status);
        if reading.utilization_wad.is_none() {
            warn!(url = %self.url, "borrow figures not found on page");
        }

        Ok(MarketSnapshot::fresh(vec![MarketEntry {
            key: self.key.clone(),
            name: self.name.clone(),
            link: self.url.clone(),
            reading,
        }]))
    }
}

/// Turn a scraped page status into a reading. Scraping is best-effort:
/// missing figures mean no cap data, not a failed cycle.
fn reading_from_page(status: &PageStatus) -> UtilizationReading {
    match (status.borrowed, status.cap) {
        (Some(borrowed), Some(cap)) => {
            let mut reading = UtilizationReading::from_tokens(borrowed, cap);
            // Page shows the capped banner even when the displayed numbers
            // lag slightly. Trust the banner.
            if status.is_capped {
                if let Some(util) = reading.utilization_wad.as_mut() {
                    *util = (*util).max(WAD);
                }
            }
            reading
        }
        _ if status.is_capped => {
            // No figures but the capped banner is up: the transition latch
            // still needs to see a capped cycle.
            let mut reading = UtilizationReading::no_data();
            reading.utilization_wad = Some(WAD);
            reading
        }
        _ => UtilizationReading::no_data(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    #[test]
    fn test_page_with_figures() {
        let reading = reading_from_page(&PageStatus {
            borrowed: Some(800.0),
            cap: Some(1000.0),
            is_capped: false,
        });
        assert_eq!(
            reading.utilization_wad,
            Some(U256::from(800_000_000_000_000_000u64))
        );
    }

    #[test]
    fn test_capped_flag_overrides_stale_numbers() {
        // Page shows 990/1000 but also the capped banner.
        let reading = reading_from_page(&PageStatus {
            borrowed: Some(990.0),
            cap: Some(1000.0),
            is_capped: true,
        });
        assert!(reading.utilization_wad.unwrap() >= WAD);
        // Headroom figures stay as displayed.
        assert!((reading.available_tokens() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_figures_mean_no_data() {
        let reading = reading_from_page(&PageStatus {
            borrowed: None,
            cap: Some(1000.0),
            is_capped: false,
        });
        assert_eq!(reading.utilization_wad, None);
        assert_eq!(reading.borrowed_wad, U256::ZERO);
    }

    #[test]
    fn test_capped_banner_without_figures_still_counts_as_capped() {
        let reading = reading_from_page(&PageStatus {
            borrowed: None,
            cap: None,
            is_capped: true,
        });
        assert_eq!(reading.utilization_wad, Some(WAD));
        assert_eq!(reading.cap_wad, U256::ZERO);
    }
}
