//! HyperLend markets API client.
//!
//! Reserve records arrive as loosely-typed JSON (numbers show up both as
//! strings and as numerics, fields go missing between deployments), so this
//! is the one boundary where tolerant parsing happens. Everything returned
//! from here is fully typed.

use std::time::Duration;

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Attempts against the markets endpoint before giving up.
const MARKETS_RETRIES: u32 = 5;
/// Attempts against the rates liveness probe.
const PROBE_RETRIES: u32 = 3;
/// Initial retry backoff, doubled after each failed attempt.
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// One reserve's raw on-chain state as reported by the markets endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketReserve {
    /// Underlying token address. Unique key within a snapshot.
    #[serde(default)]
    pub underlying_asset: String,

    /// Display symbol (e.g., "beHYPE").
    #[serde(default)]
    pub symbol: String,

    /// Token decimals. Defaults to 18 when the API omits it.
    #[serde(default = "default_decimals", deserialize_with = "de_decimals")]
    pub decimals: u8,

    /// Borrow cap in whole token units. Zero means uncapped.
    #[serde(default, deserialize_with = "de_amount")]
    pub borrow_cap: U256,

    /// Scaled variable debt in base units.
    #[serde(default, deserialize_with = "de_amount")]
    pub total_scaled_variable_debt: U256,

    /// Variable borrow index, ray-scaled (1e27). Defaults to RAY (index 1.0).
    #[serde(default = "ray", deserialize_with = "de_index")]
    pub variable_borrow_index: U256,

    /// Stable-rate principal debt in base units.
    #[serde(default, deserialize_with = "de_amount")]
    pub total_principal_stable_debt: U256,
}

fn default_decimals() -> u8 {
    18
}

fn ray() -> U256 {
    U256::from(10u128.pow(27))
}

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    reserves: Vec<serde_json::Value>,
}

/// HyperLend markets API client with retry/backoff.
#[derive(Debug, Clone)]
pub struct HyperLendClient {
    client: reqwest::Client,
    base_url: String,
    chain: String,
}

impl HyperLendClient {
    /// Create a client for the given API base URL and chain identifier.
    pub fn new(base_url: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chain: chain.into(),
        }
    }

    /// Fetch all reserve records for the configured chain.
    ///
    /// Retries transient failures with exponential backoff. On exhaustion,
    /// probes the rates endpoint purely for diagnostics (its response is
    /// discarded) and surfaces the original error. A reserve record that
    /// fails to parse is skipped with a warning; the rest still come back.
    pub async fn fetch_reserves(&self) -> Result<Vec<MarketReserve>, ApiError> {
        let url = format!("{}/data/markets", self.base_url);
        let query = [("chain", self.chain.as_str())];

        let response: MarketsResponse = match self
            .get_json_with_retries(&url, &query, MARKETS_RETRIES, Duration::from_secs(15))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                self.probe_rates().await;
                return Err(e);
            }
        };

        let total = response.reserves.len();
        let mut reserves = Vec::with_capacity(total);
        for raw in response.reserves {
            match serde_json::from_value::<MarketReserve>(raw) {
                Ok(reserve) => reserves.push(reserve),
                Err(e) => warn!(error = %e, "skipping malformed reserve record"),
            }
        }

        debug!(total, parsed = reserves.len(), "fetched market reserves");
        Ok(reserves)
    }

    /// Hit the rates endpoint to tell an API-wide outage apart from a
    /// markets-endpoint failure. The response body is never used as data
    /// and the probe's own failure is swallowed.
    async fn probe_rates(&self) {
        let url = format!("{}/data/markets/rates", self.base_url);
        let query = [("chain", self.chain.as_str())];

        match self
            .get_json_with_retries::<serde_json::Value>(
                &url,
                &query,
                PROBE_RETRIES,
                Duration::from_secs(10),
            )
            .await
        {
            Ok(_) => {
                warn!("markets endpoint failing but rates endpoint responds; cache will be served if fresh enough")
            }
            Err(e) => warn!(error = %e, "markets and rates endpoints both unreachable"),
        }
    }

    async fn get_json_with_retries<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        retries: u32,
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.get_json(url, query, timeout).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retriable() && attempt < retries => {
                    debug!(
                        url,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "retrying upstream request"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<T, ApiError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                ApiError::Decode(e.to_string())
            } else {
                ApiError::Transport(e)
            }
        })
    }
}

// Tolerant field deserializers. The API emits amounts both as decimal
// strings and as JSON numbers, and omits fields entirely on some markets.

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Num(serde_json::Number),
}

fn amount_from_raw<E: serde::de::Error>(raw: Option<RawAmount>, fallback: U256) -> Result<U256, E> {
    match raw {
        Some(RawAmount::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(fallback)
            } else {
                trimmed.parse::<U256>().map_err(E::custom)
            }
        }
        Some(RawAmount::Num(n)) => {
            if let Some(v) = n.as_u64() {
                Ok(U256::from(v))
            } else if let Some(f) = n.as_f64() {
                if f.is_finite() && f >= 0.0 {
                    Ok(U256::from(f as u128))
                } else {
                    Err(E::custom("amount is negative or non-finite"))
                }
            } else {
                Err(E::custom("unrepresentable amount"))
            }
        }
        None => Ok(fallback),
    }
}

fn de_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let raw = Option::<RawAmount>::deserialize(deserializer)?;
    amount_from_raw(raw, U256::ZERO)
}

fn de_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let raw = Option::<RawAmount>::deserialize(deserializer)?;
    amount_from_raw(raw, ray())
}

fn de_decimals<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    match Option::<RawAmount>::deserialize(deserializer)? {
        Some(RawAmount::Text(s)) => s.trim().parse::<u8>().map_err(serde::de::Error::custom),
        Some(RawAmount::Num(n)) => n
            .as_u64()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| serde::de::Error::custom("decimals out of range")),
        None => Ok(default_decimals()),
    }
}
