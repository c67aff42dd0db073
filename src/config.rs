use crate::ecosystem::DEFAULT_ECOSYSTEM_URL;
use crate::feed::DEFAULT_KEEP_BLOCKS;
use crate::interpret::Markup;
use crate::ticker::{DEFAULT_PROXIES, DEFAULT_TICKER_URL};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

pub const DEFAULT_API_URL: &str = "https://blazerapi.museminted.com";
pub const DEFAULT_WS_URL: &str = "wss://blazerapi.museminted.com/ws";
pub const DEFAULT_RPC_URL: &str = "https://api.steemit.com";

#[derive(Subcommand, Clone, Debug, PartialEq)]
pub enum Command {
    /// Follow new blocks over the WebSocket feed
    Watch,
    /// Print an account's recent history as sentences
    History {
        account: String,
        /// Number of entries to fetch (1-1000)
        #[arg(long, default_value_t = 30)]
        limit: u32,
    },
    /// Interpret one operation given as JSON, e.g. '["vote", {...}]'
    Op { json: String },
    /// TPS, account count and the STEEM ticker
    Stats {
        /// Keep polling TPS every N seconds (5-3600), printing changes only
        #[arg(long)]
        every: Option<u64>,
    },
    /// List ecosystem applications by category
    Ecosystem,
}

/// steemx - Steem blockchain explorer client
///
/// Configuration priority: CLI args > Environment variables > Defaults
#[derive(Parser, Debug)]
#[command(name = "steemx")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Steem blockchain explorer client", long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Explorer REST API base URL
    #[arg(long, env = "API_URL")]
    pub api_url: Option<String>,

    /// Explorer WebSocket URL (block and props push feed)
    #[arg(long, env = "WS_URL")]
    pub ws_url: Option<String>,

    /// Steem JSON-RPC node URL
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Ecosystem listing JSON URL
    #[arg(long, env = "ECOSYSTEM_URL")]
    pub ecosystem_url: Option<String>,

    /// Exchange ticker URL
    #[arg(long, env = "TICKER_URL")]
    pub ticker_url: Option<String>,

    /// Comma-separated CORS proxy prefixes, tried in order
    #[arg(long, env = "TICKER_PROXIES")]
    pub ticker_proxies: Option<String>,

    /// Delay before reconnecting a dropped WebSocket, ms (100-60000)
    #[arg(long, env = "RECONNECT_DELAY_MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Coalescing window for incoming blocks, ms (10-5000)
    #[arg(long, env = "DRAIN_DELAY_MS")]
    pub drain_delay_ms: Option<u64>,

    /// "time ago" refresh interval, seconds (1-3600)
    #[arg(long, env = "TIME_REFRESH_SECS")]
    pub time_refresh_secs: Option<u64>,

    /// Number of recent blocks to show (1-1000)
    #[arg(long, env = "KEEP_BLOCKS")]
    pub keep_blocks: Option<usize>,

    /// HTTP request timeout, ms (1000-60000)
    #[arg(long, env = "HTTP_TIMEOUT_MS")]
    pub http_timeout_ms: Option<u64>,

    /// Retry attempts for failed HTTP requests (0-10)
    #[arg(long, env = "HTTP_RETRIES")]
    pub http_retries: Option<u8>,

    /// Reference rendering: plain or html
    #[arg(long, env = "MARKUP", value_parser = clap::value_parser!(Markup))]
    pub markup: Option<Markup>,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub command: Command,
    pub api_url: String,
    pub ws_url: String,
    pub rpc_url: String,
    pub ecosystem_url: String,
    pub ticker_url: String,
    pub ticker_proxies: Vec<String>,
    pub reconnect_delay_ms: u64,
    pub drain_delay_ms: u64,
    pub time_refresh_secs: u64,
    pub keep_blocks: usize,
    pub http_timeout_ms: u64,
    pub http_retries: u8,
    pub markup: Markup,
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

/// Parse a comma-separated list, dropping blanks
fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Load configuration from CLI args and environment variables
pub fn load() -> Result<Config> {
    from_args(CliArgs::parse())
}

/// Apply defaults and validation to parsed arguments. clap already folds
/// the environment into `args` through the `env` attributes.
pub fn from_args(args: CliArgs) -> Result<Config> {
    let api_url = args.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
    validate_url(&api_url, "API_URL")?;

    let ws_url = args.ws_url.unwrap_or_else(|| DEFAULT_WS_URL.to_string());
    validate_url(&ws_url, "WS_URL")?;

    let rpc_url = args.rpc_url.unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
    validate_url(&rpc_url, "RPC_URL")?;

    let ecosystem_url = args
        .ecosystem_url
        .unwrap_or_else(|| DEFAULT_ECOSYSTEM_URL.to_string());
    validate_url(&ecosystem_url, "ECOSYSTEM_URL")?;

    let ticker_url = args
        .ticker_url
        .unwrap_or_else(|| DEFAULT_TICKER_URL.to_string());
    validate_url(&ticker_url, "TICKER_URL")?;

    let ticker_proxies = args
        .ticker_proxies
        .map(|s| parse_list(&s))
        .unwrap_or_else(|| DEFAULT_PROXIES.iter().map(|p| p.to_string()).collect());
    for proxy in &ticker_proxies {
        validate_url(proxy, "TICKER_PROXIES")?;
    }

    let reconnect_delay_ms = validate_in_range(
        args.reconnect_delay_ms.unwrap_or(5000),
        100,
        60000,
        "RECONNECT_DELAY_MS",
    )?;
    let drain_delay_ms =
        validate_in_range(args.drain_delay_ms.unwrap_or(100), 10, 5000, "DRAIN_DELAY_MS")?;
    let time_refresh_secs = validate_in_range(
        args.time_refresh_secs.unwrap_or(60),
        1,
        3600,
        "TIME_REFRESH_SECS",
    )?;
    let keep_blocks = validate_in_range(
        args.keep_blocks.unwrap_or(DEFAULT_KEEP_BLOCKS),
        1,
        1000,
        "KEEP_BLOCKS",
    )?;
    let http_timeout_ms = validate_in_range(
        args.http_timeout_ms.unwrap_or(8000),
        1000,
        60000,
        "HTTP_TIMEOUT_MS",
    )?;
    let http_retries = validate_in_range(args.http_retries.unwrap_or(2), 0, 10, "HTTP_RETRIES")?;

    match &args.command {
        Some(Command::History { limit, .. }) => {
            validate_in_range(*limit, 1, 1000, "--limit")?;
        }
        Some(Command::Stats { every: Some(secs) }) => {
            validate_in_range(*secs, 5, 3600, "--every")?;
        }
        _ => {}
    }

    Ok(Config {
        command: args.command.unwrap_or(Command::Watch),
        api_url,
        ws_url,
        rpc_url,
        ecosystem_url,
        ticker_url,
        ticker_proxies,
        reconnect_delay_ms,
        drain_delay_ms,
        time_refresh_secs,
        keep_blocks,
        http_timeout_ms,
        http_retries,
        markup: args.markup.unwrap_or_default(),
    })
}

/// Validate URL format (basic check)
fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }

    if url.starts_with("ws://")
        || url.starts_with("wss://")
        || url.starts_with("http://")
        || url.starts_with("https://")
    {
        Ok(())
    } else {
        Err(anyhow!(
            "{name} must start with ws://, wss://, http://, or https://"
        ))
    }
}

impl Config {
    pub fn log_summary(&self) {
        log::info!("steemx configuration:");
        log::info!("  API URL: {}", self.api_url);
        log::info!("  WebSocket URL: {}", self.ws_url);
        log::info!("  RPC URL: {}", self.rpc_url);
        log::info!(
            "  Reconnect: {}ms, drain: {}ms, time refresh: {}s",
            self.reconnect_delay_ms,
            self.drain_delay_ms,
            self.time_refresh_secs
        );
        log::info!("  Keep Blocks: {}", self.keep_blocks);
        log::info!(
            "  HTTP: timeout {}ms, retries {}",
            self.http_timeout_ms,
            self.http_retries
        );
        log::info!("  Ticker proxies: {}", self.ticker_proxies.len());
    }

    /// Options for the real-time feed session
    #[cfg(feature = "native")]
    pub fn feed_options(&self) -> crate::source_ws::FeedOptions {
        crate::source_ws::FeedOptions {
            ws_url: self.ws_url.clone(),
            reconnect_delay: std::time::Duration::from_millis(self.reconnect_delay_ms),
            drain_delay: std::time::Duration::from_millis(self.drain_delay_ms),
            time_refresh: std::time::Duration::from_secs(self.time_refresh_secs),
            keep_blocks: self.keep_blocks,
        }
    }
}
