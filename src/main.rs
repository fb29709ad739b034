//! Borrow-Cap Monitor
//!
//! Watches lending markets whose borrow caps fill up and alerts the moment
//! a capped market frees a slot. Two independent sources:
//! - HyperLend markets API (watchlist of assets, slow refresh)
//! - HypurrFi pooled-market page scrape (single asset, fast poll)
//!
//! Alerts and the /status command surface go through Telegram.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use capwatch_api::{HyperLendClient, HypurrFiClient, TelegramClient};
use capwatch_core::{
    run_monitor, run_notifier, status, CachingSource, CapTracker, HyperLendSource, HypurrFiSource,
    MonitorConfig, TrackerPolicy,
};

/// Environment variable names.
mod env {
    pub const TELEGRAM_BOT_TOKEN: &str = "TELEGRAM_BOT_TOKEN";
    pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,capwatch_core=debug,capwatch_api=debug")),
        )
        .init();

    let config = MonitorConfig::load();
    config.log_config();

    let telegram = Arc::new(load_telegram());
    if !telegram.is_configured() {
        warn!("TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID unset; alerts go to the log only");
    }

    // API source: full watchlist, slow refresh, time-based cooldown only.
    let hyperlend = Arc::new(CachingSource::new(
        Box::new(HyperLendSource::new(
            HyperLendClient::new(config.api_base.clone(), config.chain.clone()),
            config.watchlist.clone(),
        )),
        config.stale_tolerance(),
    ));
    let hyperlend_tracker = Arc::new(CapTracker::new(TrackerPolicy::new(
        config.free_slot_delta,
        config.free_slot_cooldown(),
    )));

    // Scrape source: one asset, fast poll, headroom-gated alerts.
    let asset_name = config
        .watchlist
        .display_name(&config.asset_addr, "");
    let hypurrfi = Arc::new(CachingSource::new(
        Box::new(HypurrFiSource::new(
            HypurrFiClient::new(),
            config.hypurr_url(),
            config.asset_addr.to_lowercase(),
            asset_name,
        )),
        config.stale_tolerance(),
    ));
    let hypurrfi_tracker = Arc::new(CapTracker::new(
        TrackerPolicy::new(config.free_slot_delta, config.scrape_cooldown())
            .with_min_headroom(config.min_free_tokens),
    ));

    let (alert_tx, alert_rx) = mpsc::channel(64);

    let mut handles = Vec::new();
    handles.push(tokio::spawn(run_notifier(telegram.clone(), alert_rx)));
    handles.push(tokio::spawn(run_monitor(
        hyperlend.clone(),
        hyperlend_tracker.clone(),
        config.refresh_interval(),
        alert_tx.clone(),
    )));
    handles.push(tokio::spawn(run_monitor(
        hypurrfi.clone(),
        hypurrfi_tracker.clone(),
        config.poll_interval(),
        alert_tx,
    )));

    info!("monitors running, entering command loop");
    let status_sources = vec![
        (hyperlend, hyperlend_tracker),
        (hypurrfi, hypurrfi_tracker),
    ];
    run_command_loop(telegram, status_sources, config).await;

    for handle in handles {
        handle.await?;
    }
    Ok(())
}

fn load_telegram() -> TelegramClient {
    let token = std::env::var(env::TELEGRAM_BOT_TOKEN).unwrap_or_default();
    let chat_id = std::env::var(env::TELEGRAM_CHAT_ID)
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(0);
    TelegramClient::new(token, chat_id)
}

/// Long-poll Telegram for /start, /help, and /status. The status path is
/// read-only: it renders the sources' current view without feeding the
/// trackers.
async fn run_command_loop(
    telegram: Arc<TelegramClient>,
    sources: Vec<(Arc<CachingSource>, Arc<CapTracker>)>,
    config: MonitorConfig,
) {
    if !telegram.is_configured() {
        info!("telegram unconfigured, command surface disabled");
        // Monitors keep running; park this task forever.
        std::future::pending::<()>().await;
    }

    let mut offset = 0i64;
    loop {
        let updates = match telegram.poll_updates(offset, 50).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "update poll failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(text) = message.text.as_deref() else { continue };

            let reply = match text.trim() {
                "/start" | "/help" => status::help_text().to_string(),
                "/status" => render_status(&sources, &config).await,
                _ => continue,
            };
            if let Err(e) = telegram.send_message_to(message.chat.id, &reply).await {
                warn!(error = %e, "failed to send command reply");
            }
        }
    }
}

async fn render_status(
    sources: &[(Arc<CachingSource>, Arc<CapTracker>)],
    config: &MonitorConfig,
) -> String {
    let mut sections = Vec::with_capacity(sources.len());
    for (source, tracker) in sources {
        let section = match source.current().await {
            Ok(snapshot) => status::render_source(
                source.label(),
                &snapshot,
                config.free_slot_delta,
                tracker.policy().requires_headroom(),
            ),
            Err(e) => format!("📊 {} — unavailable ({e})", source.label()),
        };
        sections.push(section);
    }
    sections.join("\n\n")
}

fn print_banner() {
    println!(
        r#"
   ___  __ _ _ ____      ____ _| |_ ___| |__
  / __|/ _` | '_ \ \ /\ / / _` | __/ __| '_ \
 | (__| (_| | |_) \ V  V / (_| | || (__| | | |
  \___|\__,_| .__/ \_/\_/ \__,_|\__\___|_| |_|
            |_|         borrow-cap monitor
"#
    );
}
