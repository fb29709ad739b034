//! Borrow-cap monitor core logic.
//!
//! This crate provides the monitor's domain layer:
//! - Exact U256 utilization arithmetic (WAD/RAY fixed point)
//! - Source abstraction with a stale-cache fallback
//! - Capped-to-free transition tracking with hysteresis and cooldowns
//! - Resilient per-source monitor loops
//! - Status and alert rendering

pub mod config;
pub mod math;
mod monitor;
mod reserve;
mod snapshot;
mod source;
mod sources;
pub mod status;
mod tracker;

pub use config::{MonitorConfig, NamedAsset, Watchlist};
pub use monitor::{run_monitor, run_notifier, Notification};
pub use reserve::{compute_utilization, UtilizationReading};
pub use snapshot::{MarketEntry, MarketSnapshot};
pub use source::{CachingSource, MarketSource, SourceError};
pub use sources::{HyperLendSource, HypurrFiSource};
pub use tracker::{CapTracker, FreeSlotEvent, TrackerPolicy};
