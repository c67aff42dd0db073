//! Ecosystem application listing, a static JSON document hosted elsewhere.

use crate::net::{http_client, send_with_backoff};
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_ECOSYSTEM_URL: &str =
    "https://raw.githubusercontent.com/blazeapps007/BlazeDB/refs/heads/Blazed/Ecosystem.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DAppStatus {
    Active,
    Beta,
    Development,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DApp {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub icon: String,
    pub status: DAppStatus,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub developer: String,
}

pub async fn fetch_ecosystem(url: &str, timeout_ms: u64, retries: u8) -> Result<Vec<DApp>> {
    let rb = http_client()
        .get(url)
        .timeout(Duration::from_millis(timeout_ms));
    let res = send_with_backoff(rb, "ecosystem", retries).await?;
    if !res.status().is_success() {
        return Err(anyhow!("Failed to fetch ecosystem data: http {}", res.status()));
    }
    Ok(res.json().await?)
}

/// Apps grouped by category, categories sorted, listing order kept inside
pub fn by_category(apps: &[DApp]) -> BTreeMap<&str, Vec<&DApp>> {
    let mut out: BTreeMap<&str, Vec<&DApp>> = BTreeMap::new();
    for app in apps {
        out.entry(app.category.as_str()).or_default().push(app);
    }
    out
}
