//! Market-data source abstraction and the stale-cache fallback.
//!
//! Both upstreams (JSON API and page scrape) sit behind [`MarketSource`]
//! so the tracker, monitor loop, and status path never know which kind of
//! source fed them. [`CachingSource`] wraps a source with the single-slot
//! snapshot cache: the last successful snapshot is served, marked stale,
//! when a fetch fails within the configured tolerance.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use crate::snapshot::MarketSnapshot;
use capwatch_api::ApiError;

/// Why a cycle got no market data.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure or upstream 5xx; already retried by the client.
    #[error("transient upstream failure: {0}")]
    Transient(String),

    /// Upstream rejected the request outright (4xx etc).
    #[error("upstream rejected request: HTTP {0}")]
    Status(u16),

    /// Upstream answered but the payload was unusable.
    #[error("unparseable upstream data: {0}")]
    Parse(String),

    /// Fetch failed and the cached snapshot is too old to serve.
    #[error("no fresh data and no acceptable cached snapshot")]
    Unavailable,
}

impl From<ApiError> for SourceError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Transport(inner) => SourceError::Transient(inner.to_string()),
            ApiError::Status(status) if status.is_server_error() => {
                SourceError::Transient(format!("HTTP {status}"))
            }
            ApiError::Status(status) => SourceError::Status(status.as_u16()),
            ApiError::Decode(msg) => SourceError::Parse(msg),
        }
    }
}

/// A market-data upstream producing watched-asset snapshots.
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Human-readable source name used in logs and messages.
    fn label(&self) -> &str;

    /// Fetch the current market state. Implementations own their retry
    /// policy; callers own cache fallback.
    async fn fetch(&self) -> Result<MarketSnapshot, SourceError>;
}

struct CachedSnapshot {
    snapshot: MarketSnapshot,
    fetched: Instant,
}

/// Single-slot snapshot cache over a [`MarketSource`].
///
/// The slot is replaced whole on every successful fetch (last-write-wins,
/// never merged), so readers can never observe a torn snapshot.
pub struct CachingSource {
    inner: Box<dyn MarketSource>,
    slot: RwLock<Option<CachedSnapshot>>,
    stale_after: Duration,
}

impl CachingSource {
    pub fn new(inner: Box<dyn MarketSource>, stale_after: Duration) -> Self {
        Self {
            inner,
            slot: RwLock::new(None),
            stale_after,
        }
    }

    pub fn label(&self) -> &str {
        self.inner.label()
    }

    /// Fetch fresh data, falling back to the cached snapshot (marked
    /// `stale`) when the fetch fails and the cache is within tolerance.
    pub async fn fetch_or_cached(&self) -> Result<MarketSnapshot, SourceError> {
        match self.inner.fetch().await {
            Ok(snapshot) => {
                *self.slot.write() = Some(CachedSnapshot {
                    snapshot: snapshot.clone(),
                    fetched: Instant::now(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                if let Some(cached) = self.slot.read().as_ref() {
                    if cached.fetched.elapsed() <= self.stale_after {
                        let mut snapshot = cached.snapshot.clone();
                        snapshot.stale = true;
                        return Ok(snapshot);
                    }
                }
                // The specific failure already got logged by the client;
                // keep the taxonomy but collapse stale-cache misses.
                match e {
                    SourceError::Transient(_) | SourceError::Status(_) => {
                        Err(SourceError::Unavailable)
                    }
                    other => Err(other),
                }
            }
        }
    }

    /// Current view for the on-demand status path: the cached snapshot
    /// while it is within tolerance, otherwise a fresh fetch (which may
    /// itself fall back to cache).
    pub async fn current(&self) -> Result<MarketSnapshot, SourceError> {
        if let Some(snapshot) = self.fresh_cached() {
            return Ok(snapshot);
        }
        self.fetch_or_cached().await
    }

    fn fresh_cached(&self) -> Option<MarketSnapshot> {
        let slot = self.slot.read();
        let cached = slot.as_ref()?;
        (cached.fetched.elapsed() <= self.stale_after).then(|| cached.snapshot.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MarketEntry;
    use crate::reserve::UtilizationReading;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Source that replays a scripted sequence of results, then repeats
    /// the final one.
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<MarketSnapshot, SourceError>>>,
        fallback: fn() -> Result<MarketSnapshot, SourceError>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<MarketSnapshot, SourceError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback: || Err(SourceError::Transient("exhausted".into())),
            }
        }
    }

    #[async_trait]
    impl MarketSource for ScriptedSource {
        fn label(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self) -> Result<MarketSnapshot, SourceError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| (self.fallback)())
        }
    }

    fn snapshot_with_one_entry() -> MarketSnapshot {
        MarketSnapshot::fresh(vec![MarketEntry {
            key: "0xabc".into(),
            name: "TEST".into(),
            link: "0xabc".into(),
            reading: UtilizationReading::from_tokens(500.0, 1000.0),
        }])
    }

    #[tokio::test]
    async fn test_success_populates_cache() {
        let source = CachingSource::new(
            Box::new(ScriptedSource::new(vec![Ok(snapshot_with_one_entry())])),
            Duration::from_secs(300),
        );

        let snapshot = source.fetch_or_cached().await.unwrap();
        assert!(!snapshot.stale);
        assert_eq!(snapshot.entries.len(), 1);
        assert!(source.fresh_cached().is_some());
    }

    #[tokio::test]
    async fn test_failure_serves_cache_within_tolerance() {
        let source = CachingSource::new(
            Box::new(ScriptedSource::new(vec![
                Ok(snapshot_with_one_entry()),
                Err(SourceError::Transient("boom".into())),
            ])),
            Duration::from_secs(300),
        );

        source.fetch_or_cached().await.unwrap();
        let snapshot = source.fetch_or_cached().await.unwrap();
        assert!(snapshot.stale);
        assert_eq!(snapshot.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_beyond_tolerance_is_unavailable() {
        // zero tolerance: any cached snapshot is already too old
        let source = CachingSource::new(
            Box::new(ScriptedSource::new(vec![
                Ok(snapshot_with_one_entry()),
                Err(SourceError::Transient("boom".into())),
            ])),
            Duration::ZERO,
        );

        source.fetch_or_cached().await.unwrap();
        let err = source.fetch_or_cached().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable));
    }

    #[tokio::test]
    async fn test_failure_with_empty_cache_propagates() {
        let source = CachingSource::new(
            Box::new(ScriptedSource::new(vec![Err(SourceError::Parse(
                "garbled".into(),
            ))])),
            Duration::from_secs(300),
        );

        let err = source.fetch_or_cached().await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[tokio::test]
    async fn test_fresh_success_clears_staleness() {
        let source = CachingSource::new(
            Box::new(ScriptedSource::new(vec![
                Ok(snapshot_with_one_entry()),
                Err(SourceError::Transient("boom".into())),
                Ok(snapshot_with_one_entry()),
            ])),
            Duration::from_secs(300),
        );

        assert!(!source.fetch_or_cached().await.unwrap().stale);
        assert!(source.fetch_or_cached().await.unwrap().stale);
        assert!(!source.fetch_or_cached().await.unwrap().stale);
    }

    #[tokio::test]
    async fn test_current_prefers_fresh_cache_without_fetching() {
        let source = CachingSource::new(
            Box::new(ScriptedSource::new(vec![Ok(snapshot_with_one_entry())])),
            Duration::from_secs(300),
        );

        source.fetch_or_cached().await.unwrap();
        // scripted source would now fail; current() must not hit it
        let snapshot = source.current().await.unwrap();
        assert!(!snapshot.stale);
    }
}
