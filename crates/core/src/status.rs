//! Human-readable rendering of snapshots and free-slot alerts.

use alloy::primitives::U256;

use crate::math::{f64_to_wad, WAD};
use crate::reserve::UtilizationReading;
use crate::snapshot::{MarketEntry, MarketSnapshot};

/// Severity flag for a utilization level: red at or above full, yellow
/// from the hysteresis threshold up, green below it.
pub fn severity_flag(util_wad: U256, delta: f64) -> &'static str {
    let threshold = WAD.saturating_sub(f64_to_wad(delta));
    if util_wad >= WAD {
        "🟥"
    } else if util_wad >= threshold {
        "🟨"
    } else {
        "🟩"
    }
}

/// Compact a token amount: `950.00`, `200.00K`, `3.20M`, `1.50B`, `2.10T`.
pub fn compact(value: f64) -> String {
    const SUFFIXES: [&str; 4] = ["K", "M", "B", "T"];

    if !value.is_finite() || value.abs() < 1000.0 {
        return format!("{value:.2}");
    }

    let magnitude = value.abs().log10().floor() as usize;
    let tier = ((magnitude / 3).min(SUFFIXES.len())).max(1);
    let scaled = value / 10f64.powi((tier * 3) as i32);
    format!("{scaled:.2}{}", SUFFIXES[tier - 1])
}

/// One asset's line in a status report. `show_headroom` appends the
/// available amount, used by sources whose alerts are gated on headroom.
pub fn render_entry(entry: &MarketEntry, delta: f64, show_headroom: bool) -> String {
    match entry.reading.utilization_wad {
        Some(util) => {
            let pct = crate::math::wad_to_f64(util) * 100.0;
            let headroom = if show_headroom {
                format!(
                    " | Available ≈ {}",
                    compact(entry.reading.available_tokens())
                )
            } else {
                String::new()
            };
            format!(
                "{} {} — {:.2}% | Borrow {} / Cap {}{}\n   {}",
                severity_flag(util, delta),
                entry.name,
                pct,
                compact(entry.reading.borrowed_tokens()),
                compact(entry.reading.cap_tokens()),
                headroom,
                entry.link,
            )
        }
        None => format!("• {}: no cap data", entry.name),
    }
}

/// Full status report for one source.
pub fn render_source(
    label: &str,
    snapshot: &MarketSnapshot,
    delta: f64,
    show_headroom: bool,
) -> String {
    let mut out = format!(
        "📊 {} — updated {} min ago{}",
        label,
        snapshot.age_minutes(),
        if snapshot.stale { " (cache)" } else { "" },
    );
    if snapshot.entries.is_empty() {
        out.push_str("\n• no watched markets in snapshot");
    }
    for entry in &snapshot.entries {
        out.push('\n');
        out.push_str(&render_entry(entry, delta, show_headroom));
    }
    out
}

/// Free-slot alert message. `show_headroom` adds the available amount,
/// used by sources whose alerts are gated on headroom.
pub fn render_free_slot(label: &str, entry: &MarketEntry, show_headroom: bool) -> String {
    let reading = &entry.reading;
    let mut out = format!(
        "🟢 {} borrow slot opened on {}!\nBorrow {} / Cap {} ({})",
        entry.name,
        label,
        compact(reading.borrowed_tokens()),
        compact(reading.cap_tokens()),
        render_pct(reading),
    );
    if show_headroom {
        out.push_str(&format!(
            "\nAvailable ≈ {} tokens",
            compact(reading.available_tokens())
        ));
    }
    out.push_str(&format!("\n{}", entry.link));
    out
}

fn render_pct(reading: &UtilizationReading) -> String {
    match reading.utilization() {
        Some(util) => format!("{:.2}%", util * 100.0),
        None => "n/a".to_string(),
    }
}

/// Reply to /start and /help.
pub fn help_text() -> &'static str {
    "👋 Borrow-cap monitor.\n\
     Alerts fire when a capped market frees up.\n\n\
     Commands:\n\
     /status — current utilization of every watched market\n\
     /help — this message"
}
