//! Monitor configuration with TOML profiles and env overrides.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML profile named
//! by `CAPWATCH_PROFILE`, then individual environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Default watchlist: the three LST markets that cap out in practice.
const DEFAULT_WATCHLIST: [(&str, &str); 3] = [
    ("0xd8fc8f0b03eba61f64d08b0bef69d80916e5dda9", "beHYPE"),
    ("0x94e8396e0869c9f2200760af0621afd240e1cf38", "wstHYPE"),
    ("0xfd739d4e423301ce9385c1fb8850539d657c296d", "kHYPE"),
];

/// One watched asset with a display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedAsset {
    pub address: String,
    pub name: String,
}

/// Which assets the monitor cares about.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Watchlist {
    /// Symbols tracked regardless of address.
    #[serde(default)]
    pub symbols: Vec<String>,

    /// Addresses tracked regardless of symbol, with display names.
    #[serde(default)]
    pub named: Vec<NamedAsset>,
}

impl Default for Watchlist {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_WATCHLIST.iter().map(|(_, s)| s.to_string()).collect(),
            named: DEFAULT_WATCHLIST
                .iter()
                .map(|(addr, name)| NamedAsset {
                    address: addr.to_string(),
                    name: name.to_string(),
                })
                .collect(),
        }
    }
}

impl Watchlist {
    /// Whether a reserve belongs on the watchlist, by symbol or address.
    /// Addresses compare case-insensitively.
    pub fn should_track(&self, address: &str, symbol: &str) -> bool {
        let addr = address.to_lowercase();
        self.symbols.iter().any(|s| s == symbol)
            || self.named.iter().any(|a| a.address.to_lowercase() == addr)
    }

    /// Best display name for an asset: configured name, then API symbol,
    /// then a truncated address.
    pub fn display_name(&self, address: &str, symbol: &str) -> String {
        let addr = address.to_lowercase();
        if let Some(named) = self.named.iter().find(|a| a.address.to_lowercase() == addr) {
            return named.name.clone();
        }
        if !symbol.is_empty() {
            return symbol.to_string();
        }
        truncate_address(address)
    }
}

fn truncate_address(address: &str) -> String {
    if address.len() > 10 {
        format!("{}…{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

/// All monitor parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Scrape-source poll interval (seconds).
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,

    /// API-source refresh interval (seconds).
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,

    /// Hysteresis margin below full utilization before a market counts
    /// as free again (fraction, e.g. 0.005 = 0.5%).
    #[serde(default = "default_free_slot_delta")]
    pub free_slot_delta: f64,

    /// Minimum gap between free-slot alerts for one asset on the API
    /// source (minutes).
    #[serde(default = "default_free_slot_cooldown_min")]
    pub free_slot_cooldown_min: u64,

    /// Minimum gap between free-slot alerts on the scrape source (seconds).
    #[serde(default = "default_scrape_cooldown_secs")]
    pub scrape_cooldown_secs: u64,

    /// Minimum whole tokens of headroom before a scrape-source free slot
    /// is worth alerting on.
    #[serde(default = "default_min_free_tokens")]
    pub min_free_tokens: f64,

    /// How long a cached snapshot may substitute for a failed fetch
    /// (seconds).
    #[serde(default = "default_stale_secs")]
    pub stale_secs: u64,

    /// HyperLend API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// HyperLend chain identifier.
    #[serde(default = "default_chain")]
    pub chain: String,

    /// HypurrFi chain id used in pooled-market page URLs.
    #[serde(default = "default_hypurr_chain_id")]
    pub hypurr_chain_id: String,

    /// Asset address whose HypurrFi page is scraped.
    #[serde(default = "default_asset_addr")]
    pub asset_addr: String,

    /// Assets tracked on the API source.
    #[serde(default)]
    pub watchlist: Watchlist,
}

fn default_poll_secs() -> u64 {
    20
}
fn default_refresh_secs() -> u64 {
    600
}
fn default_free_slot_delta() -> f64 {
    0.005
}
fn default_free_slot_cooldown_min() -> u64 {
    5
}
fn default_scrape_cooldown_secs() -> u64 {
    60
}
fn default_min_free_tokens() -> f64 {
    5.0
}
fn default_stale_secs() -> u64 {
    300
}
fn default_api_base() -> String {
    "https://api.hyperlend.finance".to_string()
}
fn default_chain() -> String {
    "hyperEvm".to_string()
}
fn default_hypurr_chain_id() -> String {
    "999".to_string()
}
fn default_asset_addr() -> String {
    "0xd8fc8f0b03eba61f64d08b0bef69d80916e5dda9".to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_secs: default_poll_secs(),
            refresh_secs: default_refresh_secs(),
            free_slot_delta: default_free_slot_delta(),
            free_slot_cooldown_min: default_free_slot_cooldown_min(),
            scrape_cooldown_secs: default_scrape_cooldown_secs(),
            min_free_tokens: default_min_free_tokens(),
            stale_secs: default_stale_secs(),
            api_base: default_api_base(),
            chain: default_chain(),
            hypurr_chain_id: default_hypurr_chain_id(),
            asset_addr: default_asset_addr(),
            watchlist: Watchlist::default(),
        }
    }
}

impl MonitorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load: optional TOML profile from `CAPWATCH_PROFILE`, then apply
    /// environment overrides on top.
    pub fn load() -> Self {
        let mut config = match std::env::var("CAPWATCH_PROFILE") {
            Ok(path) => match Self::from_file(&path) {
                Ok(config) => config,
                Err(e) => {
                    warn!(path = %path, error = %e, "failed to load profile, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        env_override("POLL_SECONDS", &mut self.poll_secs);
        env_override("HL_REFRESH_SECONDS", &mut self.refresh_secs);
        env_override("FREE_SLOT_DELTA", &mut self.free_slot_delta);
        env_override("FREE_SLOT_COOLDOWN_MIN", &mut self.free_slot_cooldown_min);
        env_override("SCRAPE_COOLDOWN_SECS", &mut self.scrape_cooldown_secs);
        env_override("MIN_FREE_TOKENS", &mut self.min_free_tokens);
        env_override("STALE_SECS", &mut self.stale_secs);
        env_override("HYPERLEND_API_BASE", &mut self.api_base);
        env_override("HYPURR_CHAIN_ID", &mut self.hypurr_chain_id);
        env_override("ASSET_ADDR", &mut self.asset_addr);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
    pub fn free_slot_cooldown(&self) -> Duration {
        Duration::from_secs(self.free_slot_cooldown_min * 60)
    }
    pub fn scrape_cooldown(&self) -> Duration {
        Duration::from_secs(self.scrape_cooldown_secs)
    }
    pub fn stale_tolerance(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }

    /// HypurrFi pooled-market page URL for the configured asset.
    pub fn hypurr_url(&self) -> String {
        format!(
            "https://app.hypurr.fi/markets/pooled/{}/{}",
            self.hypurr_chain_id, self.asset_addr
        )
    }

    /// Log the effective configuration.
    pub fn log_config(&self) {
        info!(
            poll_secs = self.poll_secs,
            refresh_secs = self.refresh_secs,
            stale_secs = self.stale_secs,
            "Monitor timing"
        );
        info!(
            free_slot_delta = self.free_slot_delta,
            cooldown_min = self.free_slot_cooldown_min,
            scrape_cooldown_secs = self.scrape_cooldown_secs,
            min_free_tokens = self.min_free_tokens,
            "Alert thresholds"
        );
        info!(
            api_base = %self.api_base,
            chain = %self.chain,
            hypurr_url = %self.hypurr_url(),
            watched = self.watchlist.named.len(),
            "Data sources"
        );
    }
}

fn env_override<T: std::str::FromStr>(var: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => warn!(var, value = %raw, "ignoring unparseable env override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.poll_secs, 20);
        assert_eq!(config.refresh_secs, 600);
        assert_eq!(config.free_slot_delta, 0.005);
        assert_eq!(config.stale_secs, 300);
        assert_eq!(config.watchlist.named.len(), 3);
    }

    #[test]
    fn test_duration_accessors() {
        let config = MonitorConfig::default();
        assert_eq!(config.free_slot_cooldown(), Duration::from_secs(300));
        assert_eq!(config.scrape_cooldown(), Duration::from_secs(60));
        assert_eq!(config.poll_interval(), Duration::from_secs(20));
    }

    #[test]
    fn test_hypurr_url() {
        let config = MonitorConfig::default();
        assert_eq!(
            config.hypurr_url(),
            "https://app.hypurr.fi/markets/pooled/999/0xd8fc8f0b03eba61f64d08b0bef69d80916e5dda9"
        );
    }

    #[test]
    fn test_watchlist_tracks_by_symbol_or_address() {
        let watchlist = Watchlist::default();
        assert!(watchlist.should_track("0x0", "beHYPE"));
        assert!(watchlist.should_track("0xD8FC8F0B03EBA61F64D08B0BEF69D80916E5DDA9", "renamed"));
        assert!(!watchlist.should_track("0x0", "USDC"));
    }

    #[test]
    fn test_display_name_fallbacks() {
        let watchlist = Watchlist::default();
        assert_eq!(
            watchlist.display_name("0xd8fc8f0b03eba61f64d08b0bef69d80916e5dda9", "whatever"),
            "beHYPE"
        );
        assert_eq!(watchlist.display_name("0x0", "kHYPE"), "kHYPE");
        assert_eq!(
            watchlist.display_name("0x1234567890abcdef1234567890abcdef12345678", ""),
            "0x1234…5678"
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = MonitorConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: MonitorConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.poll_secs, config.poll_secs);
        assert_eq!(parsed.watchlist.named.len(), 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let parsed: MonitorConfig = toml::from_str("poll_secs = 5").unwrap();
        assert_eq!(parsed.poll_secs, 5);
        assert_eq!(parsed.refresh_secs, 600);
        assert_eq!(parsed.watchlist.named.len(), 3);
    }
}
