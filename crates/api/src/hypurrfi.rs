//! HypurrFi asset-page scraper.
//!
//! HypurrFi pooled markets expose no JSON API, so borrow data is lifted off
//! the asset page itself: find a label in the visible text, parse the
//! compact-suffix number that follows it. The heuristics are best-effort by
//! nature; on a page redesign they return `None` and the caller treats the
//! cycle as having no cap data.

use std::sync::LazyLock;
use std::time::Duration;

use regex_lite::Regex;

use crate::error::ApiError;

/// Labels preceding the total-borrowed figure, tried in order.
const BORROWED_LABELS: [&str; 2] = ["Total borrowed", "Total Borrows"];
/// Labels preceding the borrow-cap figure, tried in order.
const CAP_LABELS: [&str; 2] = ["Borrow cap", "Borrow Cap"];
/// Raw-markup phrases that mean the market is fully capped.
const CAPPED_PHRASES: [&str; 2] = ["Cannot be borrowed", "Borrow cap reached"];

/// How much visible text after a label is scanned for a number.
const LABEL_WINDOW: usize = 160;

static AMOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)([KMBT])?\b").unwrap());

/// Borrow state scraped from one asset page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageStatus {
    /// Total borrowed, in whole tokens. `None` when the label or number
    /// could not be found.
    pub borrowed: Option<f64>,
    /// Borrow cap, in whole tokens.
    pub cap: Option<f64>,
    /// Whether the page advertises the market as fully capped.
    pub is_capped: bool,
}

/// HypurrFi page client.
#[derive(Debug, Clone)]
pub struct HypurrFiClient {
    client: reqwest::Client,
}

impl HypurrFiClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch an asset page and extract its borrow status.
    pub async fn fetch_page(&self, url: &str) -> Result<PageStatus, ApiError> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status));
        }

        let html = response.text().await?;
        Ok(parse_page(&html))
    }
}

impl Default for HypurrFiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract borrow status from raw page markup.
pub fn parse_page(html: &str) -> PageStatus {
    let text = visible_text(html);
    PageStatus {
        borrowed: field_after_label(&text, &BORROWED_LABELS),
        cap: field_after_label(&text, &CAP_LABELS),
        is_capped: CAPPED_PHRASES.iter().any(|phrase| html.contains(phrase)),
    }
}

/// Parse a compact-suffix amount: `200K`, `3.2M`, or a plain decimal.
/// Thousands separators are tolerated.
pub fn parse_compact_amount(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    let caps = AMOUNT_RE.captures(&cleaned)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let multiplier = match caps.get(2).map(|m| m.as_str()) {
        Some("K") => 1e3,
        Some("M") => 1e6,
        Some("B") => 1e9,
        Some("T") => 1e12,
        _ => 1.0,
    };
    Some(value * multiplier)
}

fn field_after_label(text: &str, labels: &[&str]) -> Option<f64> {
    for label in labels {
        if let Some(idx) = text.find(label) {
            let segment: String = text[idx + label.len()..]
                .chars()
                .take(LABEL_WINDOW)
                .collect();
            return parse_compact_amount(&segment);
        }
    }
    None
}

/// Strip tags and collapse whitespace, approximating the page's visible text.
fn visible_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut in_tag = false;
    let mut last_was_space = true;

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                if !last_was_space {
                    out.push(' ');
                    last_was_space = true;
                }
            }
            '>' => in_tag = false,
            _ if in_tag => {}
            c if c.is_whitespace() => {
                if !last_was_space {
                    out.push(' ');
                    last_was_space = true;
                }
            }
            c => {
                out.push(c);
                last_was_space = false;
            }
        }
    }

    out.trim().to_string()
}
