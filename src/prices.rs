// src/prices.rs
//! Price digest for a fixed coin set (CoinGecko `simple/price` shape).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::time::Duration;

use crate::ingest::char_len;
use crate::POST_CHAR_LIMIT;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coin {
    /// Canonical identifier used by the market-data API, e.g. "bitcoin".
    pub id: String,
    /// Display ticker, e.g. "BTC".
    pub ticker: String,
}

impl Coin {
    pub fn new(id: &str, ticker: &str) -> Self {
        Self {
            id: id.to_string(),
            ticker: ticker.to_string(),
        }
    }
}

pub fn default_coins() -> Vec<Coin> {
    vec![
        Coin::new("bitcoin", "BTC"),
        Coin::new("ethereum", "ETH"),
        Coin::new("solana", "SOL"),
        Coin::new("ripple", "XRP"),
        Coin::new("binancecoin", "BNB"),
        Coin::new("tron", "TRX"),
    ]
}

/// `1234567.891` -> `1,234,567.89`
pub fn format_usd(v: f64) -> String {
    let fixed = format!("{:.2}", v.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if v < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

/// USD prices from a `{ "<id>": { "usd": <number> }, ... }` body. Entries
/// without a finite `usd` number are dropped.
pub fn parse_quotes(body: &str) -> Result<HashMap<String, f64>> {
    let raw: HashMap<String, Json> = serde_json::from_str(body).context("parsing price json")?;
    Ok(raw
        .into_iter()
        .filter_map(|(id, v)| {
            let usd = v.get("usd")?.as_f64()?;
            usd.is_finite().then_some((id, usd))
        })
        .collect())
}

/// One `TICKER: $price` line per coin present in `quotes`, in coin-set order.
pub fn render_lines(coins: &[Coin], quotes: &HashMap<String, f64>) -> Vec<String> {
    coins
        .iter()
        .filter_map(|c| {
            quotes
                .get(&c.id)
                .map(|p| format!("{}: ${}", c.ticker, format_usd(*p)))
        })
        .collect()
}

/// Header + lines, dropping trailing whole lines that would break the cap.
/// `None` when no line is renderable.
pub fn render_digest(header: &str, lines: &[String]) -> Option<String> {
    if lines.is_empty() {
        return None;
    }
    let mut out = header.trim().to_string();
    let mut kept = 0usize;
    for line in lines {
        let sep = if out.is_empty() { 0 } else { 1 };
        if char_len(&out) + sep + char_len(line) > POST_CHAR_LIMIT {
            break;
        }
        if sep == 1 {
            out.push('\n');
        }
        out.push_str(line);
        kept += 1;
    }
    (kept > 0).then_some(out)
}

pub struct PriceSnapshot {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    coins: Vec<Coin>,
    header: String,
}

impl PriceSnapshot {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        timeout: Duration,
        coins: Vec<Coin>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
            coins,
            header: String::new(),
        }
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    async fn fetch_quotes(&self) -> Result<HashMap<String, f64>> {
        let ids = self
            .coins
            .iter()
            .map(|c| c.id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .timeout(self.timeout)
            .send()
            .await
            .context("price http get()")?
            .error_for_status()
            .context("price non-2xx")?
            .text()
            .await
            .context("price http .text()")?;
        parse_quotes(&body)
    }

    /// The rendered digest, or `None` on any error or when no coin is priced.
    pub async fn snapshot(&self) -> Option<String> {
        let quotes = match self.fetch_quotes().await {
            Ok(q) => q,
            Err(e) => {
                tracing::warn!(error = ?e, "price snapshot failed");
                return None;
            }
        };
        let lines = render_lines(&self.coins, &quotes);
        if lines.len() < self.coins.len() {
            tracing::debug!(
                priced = lines.len(),
                requested = self.coins.len(),
                "some coins missing from price response"
            );
        }
        render_digest(&self.header, &lines)
    }
}
