// Native binary for steemx - command-line explorer client

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;

use steemx::{
    api::{account_count, ExplorerApi},
    config::{load, Command, Config},
    ecosystem::{by_category, fetch_ecosystem},
    interpret::Interpreter,
    operation::{Operation, RawOperation},
    poll::{run_poller, PollEvent},
    source_ws::FeedSession,
    ticker::fetch_ticker,
    util_text::format_thousands,
};

/// Conversions in flight while interpreting a history page
const HISTORY_CONCURRENCY: usize = 8;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (safe to ignore if not found)
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = load().context("Failed to load configuration")?;
    cfg.log_summary();

    let api = Arc::new(ExplorerApi::new(
        cfg.api_url.clone(),
        cfg.http_timeout_ms,
        cfg.http_retries,
    ));

    match &cfg.command {
        Command::Watch => watch(&cfg).await,
        Command::History { account, limit } => history(&cfg, api, account, *limit).await,
        Command::Op { json } => {
            let raw: RawOperation =
                serde_json::from_str(json).context("operation must be [type, payload] JSON")?;
            if let Ok(op) = Operation::parse(&raw) {
                log::debug!(
                    "{} (virtual: {}) accounts: {}",
                    op.name(),
                    op.is_virtual(),
                    op.accounts().join(", ")
                );
            }
            let interpreter = Interpreter::new(api, cfg.markup);
            println!("{}", interpreter.interpret(&raw).await);
            Ok(())
        }
        Command::Stats { every: None } => stats(&cfg, &api).await,
        Command::Stats { every: Some(secs) } => poll_tps(api, *secs).await,
        Command::Ecosystem => ecosystem(&cfg).await,
    }
}

async fn watch(cfg: &Config) -> Result<()> {
    let session = FeedSession::start(cfg.feed_options());
    let mut rx = session.subscribe();
    let mut newest = 0u64;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = rx.borrow_and_update().clone();
                if let Some(err) = &snap.error {
                    if !snap.is_connected() {
                        eprintln!("[{:?}] {err}", snap.state);
                    }
                }
                for block in snap.blocks.iter().rev().filter(|b| b.number > newest) {
                    println!(
                        "#{:<10} {:>4} ops  {:<8} {}",
                        block.number,
                        block.operation_count,
                        block.time_ago,
                        block.op_types.join(", ")
                    );
                }
                if let Some(top) = snap.blocks.first() {
                    newest = newest.max(top.number);
                }
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

async fn history(cfg: &Config, api: Arc<ExplorerApi>, account: &str, limit: u32) -> Result<()> {
    let page = api
        .account_history(account, limit, -1)
        .await
        .with_context(|| format!("Failed to fetch history for @{account}"))?;
    let entries = page.newest_first();
    let ops: Vec<RawOperation> = entries.iter().map(|e| e.op.clone()).collect();

    let interpreter = Interpreter::new(api, cfg.markup);
    let lines = interpreter.interpret_all(&ops, HISTORY_CONCURRENCY).await;
    for (entry, line) in entries.iter().zip(lines) {
        println!("{:<10} {:<20} {}", entry.block, entry.timestamp, line);
    }
    Ok(())
}

async fn stats(cfg: &Config, api: &ExplorerApi) -> Result<()> {
    let (tps, accounts, ticker) = tokio::join!(
        api.tps(),
        account_count(&cfg.rpc_url, cfg.http_timeout_ms, cfg.http_retries),
        fetch_ticker(cfg.ticker_proxies.as_slice(), &cfg.ticker_url, cfg.http_timeout_ms),
    );

    match tps {
        Ok(t) => println!(
            "TPS  1h {:.2}  1d {:.2}  1w {:.2}  all {:.2}",
            t.tps_1h, t.tps_1d, t.tps_1w, t.tps_all_time
        ),
        Err(e) => log::error!("Failed to fetch TPS: {e:#}"),
    }
    match accounts {
        Ok(n) => println!("Accounts  {}", format_thousands(n)),
        Err(e) => log::error!("Failed to fetch account count: {e:#}"),
    }
    match ticker {
        Ok(t) => {
            let change = t
                .daily_change_pct()
                .map(|c| format!("{c:+.2}%"))
                .unwrap_or_else(|| "-".into());
            println!("STEEM/USDT  {}  {change}", t.close);
        }
        Err(e) => log::error!("Failed to fetch STEEM price: {e:#}"),
    }
    Ok(())
}

async fn poll_tps(api: Arc<ExplorerApi>, secs: u64) -> Result<()> {
    let (tx, mut rx) = unbounded_channel();
    let poller = tokio::spawn(async move {
        run_poller(
            "TPS",
            Duration::from_secs(secs),
            move || {
                let api = api.clone();
                async move { api.tps().await }
            },
            tx,
        )
        .await
    });

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = rx.recv() => match event {
                Some(PollEvent::Changed(t)) => println!(
                    "TPS  1h {:.2}  1d {:.2}  1w {:.2}  all {:.2}",
                    t.tps_1h, t.tps_1d, t.tps_1w, t.tps_all_time
                ),
                Some(PollEvent::Failed(msg)) => eprintln!("{msg}"),
                None => break,
            },
        }
    }

    poller.abort();
    Ok(())
}

async fn ecosystem(cfg: &Config) -> Result<()> {
    let apps = fetch_ecosystem(&cfg.ecosystem_url, cfg.http_timeout_ms, cfg.http_retries)
        .await
        .context("Failed to load ecosystem data")?;
    for (category, apps) in by_category(&apps) {
        println!("{category}");
        for app in apps {
            let status = format!("{:?}", app.status);
            println!("  {:<24} {:<12} {}", app.name, status, app.url);
        }
    }
    Ok(())
}
