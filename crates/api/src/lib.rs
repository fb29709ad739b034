//! HTTP clients for external services used by the borrow-cap monitor.
//!
//! This crate provides:
//! - HyperLend: markets API with retry/backoff and a rates liveness probe
//! - HypurrFi: asset-page scrape for pooled markets without a JSON API
//! - Telegram: notification delivery and command long-polling

mod error;
mod hyperlend;
mod hypurrfi;
mod telegram;

pub use error::ApiError;
pub use hyperlend::{HyperLendClient, MarketReserve};
pub use hypurrfi::{parse_compact_amount, HypurrFiClient, PageStatus};
pub use telegram::{Chat, Message, TelegramClient, TelegramError, Update};
