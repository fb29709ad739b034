//! Resilient monitor loop: one task per source, alerts through a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use capwatch_api::TelegramClient;

use crate::source::CachingSource;
use crate::status::render_free_slot;
use crate::tracker::CapTracker;

/// Outbound alert text, produced by monitor loops and consumed by the
/// notifier task.
#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
}

/// Run one source's monitor cycle forever.
///
/// A cycle fetches a snapshot (cache fallback included), feeds every entry
/// through the tracker, and emits an alert per free-slot event. Any failure
/// is logged and the loop sleeps until the next cycle; nothing here
/// terminates the task.
pub async fn run_monitor(
    source: Arc<CachingSource>,
    tracker: Arc<CapTracker>,
    period: Duration,
    alerts: mpsc::Sender<Notification>,
) {
    let label = source.label().to_string();
    info!(source = %label, period_secs = period.as_secs(), "monitor started");

    let startup = Notification {
        text: format!(
            "✅ {} monitor active (cycle every {}s).",
            label,
            period.as_secs()
        ),
    };
    if alerts.send(startup).await.is_err() {
        error!(source = %label, "alert channel closed before first cycle");
        return;
    }

    loop {
        run_cycle(&source, &tracker, &label, &alerts).await;
        tokio::time::sleep(period).await;
    }
}

async fn run_cycle(
    source: &CachingSource,
    tracker: &CapTracker,
    label: &str,
    alerts: &mpsc::Sender<Notification>,
) {
    let snapshot = match source.fetch_or_cached().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(source = %label, error = %e, "cycle skipped, no data");
            return;
        }
    };
    if snapshot.stale {
        warn!(
            source = %label,
            age_min = snapshot.age_minutes(),
            "serving cached snapshot"
        );
    }

    let show_headroom = tracker.policy().requires_headroom();
    for entry in &snapshot.entries {
        if let Some(event) = tracker.observe(&entry.key, &entry.reading) {
            info!(source = %label, asset = %entry.name, "free slot detected");
            let notification = Notification {
                text: render_free_slot(label, entry, show_headroom),
            };
            if alerts.send(notification).await.is_err() {
                error!(source = %label, key = %event.key, "alert channel closed, dropping alert");
            }
        }
    }
}

/// Drain the alert channel into Telegram. Delivery failures are logged and
/// the alert is dropped; the monitor loops never block on Telegram.
pub async fn run_notifier(telegram: Arc<TelegramClient>, mut alerts: mpsc::Receiver<Notification>) {
    while let Some(notification) = alerts.recv().await {
        if let Err(e) = telegram.send_message(&notification.text).await {
            error!(error = %e, "failed to deliver alert");
        }
    }
    info!("alert channel closed, notifier stopped");
}
