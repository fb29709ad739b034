//! Capped-to-free transition detection with hysteresis and cooldown.
//!
//! The tracker latches each asset's capped state across cycles. An alert
//! fires only on the capped-to-free edge, and only once utilization drops
//! through the hysteresis threshold, so a market oscillating around 100%
//! does not spam.

use std::time::{Duration, Instant};

use alloy::primitives::U256;
use dashmap::DashMap;
use tracing::debug;

use crate::math::{f64_to_wad, WAD};
use crate::reserve::UtilizationReading;

/// When and how eagerly a source's assets may alert.
#[derive(Debug, Clone)]
pub struct TrackerPolicy {
    /// Utilization at or below `WAD - delta` counts as free again.
    free_threshold_wad: U256,
    /// Minimum gap between alerts for one asset.
    cooldown: Duration,
    /// Minimum WAD-scaled headroom an alert must represent, when set.
    min_headroom_wad: Option<U256>,
}

impl TrackerPolicy {
    /// Policy with a hysteresis margin (fraction of full utilization)
    /// and a per-asset cooldown.
    pub fn new(delta: f64, cooldown: Duration) -> Self {
        Self {
            free_threshold_wad: WAD.saturating_sub(f64_to_wad(delta)),
            cooldown,
            min_headroom_wad: None,
        }
    }

    /// Additionally require at least this many whole tokens of headroom
    /// before alerting.
    pub fn with_min_headroom(mut self, tokens: f64) -> Self {
        self.min_headroom_wad = Some(f64_to_wad(tokens));
        self
    }

    /// Whether this policy gates alerts on available headroom.
    pub fn requires_headroom(&self) -> bool {
        self.min_headroom_wad.is_some()
    }
}

#[derive(Debug, Default)]
struct AssetState {
    was_capped: bool,
    last_notified: Option<Instant>,
}

/// A free slot just opened on this asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeSlotEvent {
    pub key: String,
}

/// Per-source transition tracker.
pub struct CapTracker {
    states: DashMap<String, AssetState>,
    policy: TrackerPolicy,
}

impl CapTracker {
    pub fn new(policy: TrackerPolicy) -> Self {
        Self {
            states: DashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> &TrackerPolicy {
        &self.policy
    }

    /// Feed one asset's reading for this cycle. Returns an event when a
    /// free slot opened and passed every gate.
    pub fn observe(&self, key: &str, reading: &UtilizationReading) -> Option<FreeSlotEvent> {
        self.observe_at(key, reading, Instant::now())
    }

    /// [`observe`](Self::observe) with an injected clock.
    pub fn observe_at(
        &self,
        key: &str,
        reading: &UtilizationReading,
        now: Instant,
    ) -> Option<FreeSlotEvent> {
        // Unknown utilization never touches the latch: a scrape hiccup must
        // not fabricate a capped-to-free edge.
        let util = reading.utilization_wad?;

        let mut state = self.states.entry(key.to_string()).or_default();
        let was_capped = state.was_capped;
        let capped_now = util >= WAD;
        state.was_capped = capped_now;

        if !was_capped || capped_now {
            return None;
        }
        if util > self.policy.free_threshold_wad {
            // Freed, but still inside the hysteresis band. The latch is
            // already cleared, so this edge is consumed silently.
            debug!(key, "cap released within hysteresis band, suppressing");
            return None;
        }
        if let Some(min_headroom) = self.policy.min_headroom_wad {
            if reading.available_wad() < min_headroom {
                debug!(key, "free slot below headroom floor, suppressing");
                return None;
            }
        }
        if let Some(last) = state.last_notified {
            if now.duration_since(last) < self.policy.cooldown {
                debug!(key, "free slot within cooldown, suppressing");
                return None;
            }
        }

        state.last_notified = Some(now);
        Some(FreeSlotEvent {
            key: key.to_string(),
        })
    }
}
