//! Explorer REST client.
//!
//! Endpoints return JSON; the shapes the core relies on are typed here, the
//! rest are handed out as `serde_json::Value` for display.

use crate::interpret::VestsConverter;
use crate::net::{http_client, send_with_backoff};
use crate::operation::RawOperation;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockListing {
    pub block_num: u64,
    pub timestamp: String,
    #[serde(default)]
    pub previous: String,
    #[serde(default)]
    pub witness: String,
    #[serde(default)]
    pub transactions_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlocksPage {
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub total_blocks: u64,
    pub blocks: Vec<BlockListing>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TpsStats {
    pub tps_1h: f64,
    pub tps_1d: f64,
    pub tps_1w: f64,
    pub tps_1m: f64,
    pub tps_1y: f64,
    pub tps_all_time: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub trx_id: String,
    pub block: u64,
    #[serde(default)]
    pub trx_in_block: u64,
    #[serde(default)]
    pub op_in_trx: u64,
    #[serde(default)]
    pub virtual_op: u64,
    pub timestamp: String,
    pub op: RawOperation,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccountHistoryPage {
    pub account: String,
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub next_start: i64,
    /// `[sequence, entry]` pairs, oldest first as served
    pub history: Vec<(u64, HistoryEntry)>,
}

impl AccountHistoryPage {
    /// Entries newest first, as the explorer lists them
    pub fn newest_first(&self) -> Vec<&HistoryEntry> {
        let mut entries: Vec<(u64, &HistoryEntry)> =
            self.history.iter().map(|(seq, e)| (*seq, e)).collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, e)| e).collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketPrice {
    pub symbol: String,
    pub last_price: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub open_24h: f64,
    pub close_24h: f64,
    pub volume_24h: f64,
    pub change_24h: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    pub steem: f64,
    pub sbd: f64,
    pub price: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub bids: Vec<OrderBookEntry>,
    #[serde(default)]
    pub asks: Vec<OrderBookEntry>,
}

impl OrderBook {
    /// Lowest ask minus highest bid, when both sides have depth
    pub fn spread(&self) -> Option<f64> {
        let best_bid = self.bids.iter().map(|e| e.price).reduce(f64::max)?;
        let best_ask = self.asks.iter().map(|e| e.price).reduce(f64::min)?;
        Some(best_ask - best_bid)
    }
}

#[derive(Clone, Debug)]
pub struct ExplorerApi {
    base_url: String,
    timeout: Duration,
    retries: u8,
}

impl ExplorerApi {
    pub fn new(base_url: impl Into<String>, timeout_ms: u64, retries: u8) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            timeout: Duration::from_millis(timeout_ms),
            retries,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `path` starts with `/` and may carry a query string
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        log::debug!("[api] GET {url}");
        let rb = http_client().get(&url).timeout(self.timeout);
        let res = send_with_backoff(rb, path, self.retries).await?;
        let status = res.status();
        if !status.is_success() {
            return Err(anyhow!("GET {path} failed: http {status}"));
        }
        res.json::<T>()
            .await
            .with_context(|| format!("GET {path}: unexpected response body"))
    }

    pub async fn blocks(&self, limit: u32, last_block_num: Option<u64>) -> Result<BlocksPage> {
        let mut path = format!("/blocks_api/getBlocks?limit={limit}&with_transactions=false");
        if let Some(n) = last_block_num {
            path.push_str(&format!("&last_block_num={n}"));
        }
        self.get_json(&path).await
    }

    pub async fn block_details(&self, block_num: u64) -> Result<Value> {
        self.get_json(&format!("/blocks_api/getBlockDetails?block_num={block_num}"))
            .await
    }

    pub async fn transaction(&self, transaction_id: &str) -> Result<Value> {
        self.get_json(&format!(
            "/blocks_api/getTransactions?transaction_id={}",
            urlencoding::encode(transaction_id)
        ))
        .await
    }

    pub async fn tps(&self) -> Result<TpsStats> {
        self.get_json("/blocks_api/getTPS").await
    }

    pub async fn account(&self, name: &str) -> Result<Value> {
        self.get_json(&format!(
            "/accounts_api/getAccount/{}",
            urlencoding::encode(name)
        ))
        .await
    }

    /// `start = -1` asks for the most recent entries
    pub async fn account_history(
        &self,
        name: &str,
        limit: u32,
        start: i64,
    ) -> Result<AccountHistoryPage> {
        self.get_json(&format!(
            "/accounts_api/getAccountHistory/{}?limit={limit}&start={start}",
            urlencoding::encode(name)
        ))
        .await
    }

    pub async fn post(&self, author: &str, permlink: &str) -> Result<Value> {
        self.get_json(&format!(
            "/posts_api/getPost?author={}&permlink={}",
            urlencoding::encode(author),
            urlencoding::encode(permlink)
        ))
        .await
    }

    pub async fn market_price(&self) -> Result<MarketPrice> {
        self.get_json("/market_api/get_price").await
    }

    pub async fn order_book(&self) -> Result<OrderBook> {
        self.get_json("/market_api/get_order_book").await
    }

    pub async fn recent_trades(&self, limit: u32) -> Result<Value> {
        self.get_json(&format!("/market_api/get_recent_trades?limit={limit}"))
            .await
    }

    pub async fn ohlc(&self, bucket_size: u32, hours: u32) -> Result<Value> {
        self.get_json(&format!(
            "/market_api/ohlc?bucket_size={bucket_size}&hours={hours}"
        ))
        .await
    }

    pub async fn open_orders(&self, account: &str) -> Result<Value> {
        self.get_json(&format!(
            "/market_api/get_open_orders?account={}",
            urlencoding::encode(account)
        ))
        .await
    }

    pub async fn proposals(&self) -> Result<Value> {
        self.get_json("/governance_api/governance_api/sps_proposals")
            .await
    }

    pub async fn witnesses(&self) -> Result<Value> {
        self.get_json("/governance_api/governance_api/witnesses")
            .await
    }

    /// Remote VESTS → STEEM conversion at the current rate
    pub async fn convert_vests(&self, vests: f64) -> Result<f64> {
        let v: Value = self
            .get_json(&format!("/blocks_api/convertVestsToSteem?vests={vests}"))
            .await?;
        parse_conversion(&v)
    }
}

fn parse_conversion(v: &Value) -> Result<f64> {
    match &v["steem"] {
        Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("conversion out of range")),
        Value::String(s) => s
            .parse()
            .map_err(|_| anyhow!("conversion result '{s}' is not a number")),
        other => Err(anyhow!("conversion response without steem field: {other}")),
    }
}

#[async_trait]
impl VestsConverter for ExplorerApi {
    async fn vests_to_sp(&self, vests: f64) -> Result<f64> {
        self.convert_vests(vests).await
    }
}

/// Total number of accounts, straight from a Steem JSON-RPC node
pub async fn account_count(rpc_url: &str, timeout_ms: u64, retries: u8) -> Result<u64> {
    let body = json!({
        "jsonrpc": "2.0",
        "method": "condenser_api.get_account_count",
        "params": [],
        "id": 1
    });
    let rb = http_client()
        .post(rpc_url)
        .json(&body)
        .timeout(Duration::from_millis(timeout_ms));
    let res = send_with_backoff(rb, "get_account_count", retries).await?;
    if !res.status().is_success() {
        return Err(anyhow!("http {}", res.status()));
    }
    let v: Value = res.json().await?;
    rpc_result_u64(&v)
}

fn rpc_result_u64(v: &Value) -> Result<u64> {
    if let Some(err) = v.get("error") {
        let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("rpc error");
        return Err(anyhow!("rpc {code} {msg}"));
    }
    v.get("result")
        .and_then(Value::as_u64)
        .ok_or_else(|| anyhow!("invalid rpc payload (no result)"))
}
