//! STEEM/USDT 24h ticker from an external exchange.
//!
//! The exchange does not send CORS headers, so requests go through public
//! proxy prefixes, tried in order until one answers.

use crate::net::http_client;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TICKER_URL: &str = "https://api.poloniex.com/markets/STEEM_USDT/ticker24h";

pub const DEFAULT_PROXIES: &[&str] = &[
    "https://api.codetabs.com/v1/proxy?quest=",
    "https://cors-anywhere.herokuapp.com/",
    "https://api.allorigins.win/raw?url=",
];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ticker24h {
    pub symbol: String,
    pub open: String,
    pub low: String,
    pub high: String,
    pub close: String,
    pub quantity: String,
    pub amount: String,
    pub trade_count: u64,
    pub start_time: u64,
    pub close_time: u64,
    pub display_name: String,
    pub daily_change: String,
    pub bid: String,
    pub bid_quantity: String,
    pub ask: String,
    pub ask_quantity: String,
    pub ts: u64,
    pub mark_price: String,
}

impl Ticker24h {
    /// Daily change as a percentage, when the exchange sent a parseable one
    pub fn daily_change_pct(&self) -> Option<f64> {
        self.daily_change.parse::<f64>().ok().map(|c| c * 100.0)
    }
}

/// Full request URL for one proxy prefix
pub fn proxied_url(proxy: &str, target: &str) -> String {
    format!("{proxy}{}", urlencoding::encode(target))
}

async fn fetch_via(proxy: &str, target: &str, timeout_ms: u64) -> Result<Ticker24h> {
    let res = http_client()
        .get(proxied_url(proxy, target))
        .header("Accept", "application/json")
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await?;
    if !res.status().is_success() {
        return Err(anyhow!("http {}", res.status()));
    }
    Ok(res.json::<Ticker24h>().await?)
}

/// Try every proxy in order; the first success wins. When all fail the
/// last failure is returned.
pub async fn fetch_ticker<S: AsRef<str>>(
    proxies: &[S],
    target: &str,
    timeout_ms: u64,
) -> Result<Ticker24h> {
    let mut last_err = None;
    for proxy in proxies {
        let proxy = proxy.as_ref();
        log::debug!("[ticker] trying proxy {proxy}");
        match fetch_via(proxy, target, timeout_ms).await {
            Ok(t) => return Ok(t),
            Err(e) => {
                log::warn!("[ticker] proxy {proxy} failed: {e:#}");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| anyhow!("no ticker proxies configured")))
}
