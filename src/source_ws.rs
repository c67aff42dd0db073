//! WebSocket block feed session
//!
//! This module is only available on native targets.
//!
//! One task owns the socket, the drain deadline and the time-ago interval.
//! Views read the latest [`FeedSnapshot`] from a `watch` channel. Dropping
//! (or shutting down) the [`FeedSession`] aborts the task, which closes the
//! socket and releases every timer with it.

use crate::feed::{BlockSummary, FeedNormalizer, Ingest, DEFAULT_KEEP_BLOCKS};
use crate::types::NetworkProperties;
use chrono::Utc;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Duration, Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tungstenite::protocol::Message;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug)]
pub struct FeedOptions {
    pub ws_url: String,
    /// Constant delay between a drop and the next connect attempt
    pub reconnect_delay: Duration,
    /// Coalescing window: blocks arriving within it are merged together
    pub drain_delay: Duration,
    pub time_refresh: Duration,
    pub keep_blocks: usize,
}

impl FeedOptions {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect_delay: Duration::from_secs(5),
            drain_delay: Duration::from_millis(100),
            time_refresh: Duration::from_secs(60),
            keep_blocks: DEFAULT_KEEP_BLOCKS,
        }
    }
}

/// Everything a view needs to render the live feed
#[derive(Clone, Debug, Default, Serialize)]
pub struct FeedSnapshot {
    pub blocks: Vec<BlockSummary>,
    pub state: ConnectionState,
    pub error: Option<String>,
    pub properties: Option<NetworkProperties>,
    /// Connect attempts made so far, the first one included
    pub attempts: u64,
}

impl FeedSnapshot {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

pub struct FeedSession {
    handle: JoinHandle<()>,
    rx: watch::Receiver<FeedSnapshot>,
}

impl FeedSession {
    /// Spawn the connection task. Must be called inside a Tokio runtime.
    pub fn start(opts: FeedOptions) -> Self {
        let (tx, rx) = watch::channel(FeedSnapshot::default());
        let handle = tokio::spawn(run_feed(opts, tx));
        Self { handle, rx }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.rx.clone()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.rx.borrow().clone()
    }

    /// Stop the session and wait until the socket and timers are gone
    pub async fn shutdown(mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
        log::info!("[ws] feed session stopped");
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Why a connection ended
enum Ended {
    Closed,
    Failed(String),
}

async fn run_feed(opts: FeedOptions, tx: watch::Sender<FeedSnapshot>) {
    let mut normalizer = FeedNormalizer::new(opts.keep_blocks);
    let mut refresh = interval(opts.time_refresh);
    refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
    refresh.tick().await;

    loop {
        tx.send_modify(|s| {
            s.state = ConnectionState::Connecting;
            s.attempts += 1;
        });
        log::info!("[ws] connecting to {}", opts.ws_url);

        let ended = match connect_async(&opts.ws_url).await {
            Ok((ws, _)) => {
                log::info!("[ws] connected");
                tx.send_modify(|s| {
                    s.state = ConnectionState::Connected;
                    s.error = None;
                });
                pump(ws, &mut normalizer, &mut refresh, &opts, &tx).await
            }
            Err(e) => Ended::Failed(format!("Failed to connect to WebSocket: {e}")),
        };

        // Blocks still waiting for their drain are not lost with the socket
        let changed = normalizer.drain(Utc::now());
        tx.send_modify(|s| {
            s.state = ConnectionState::Disconnected;
            if changed {
                s.blocks = normalizer.feed().blocks().to_vec();
            }
            if let Ended::Failed(reason) = &ended {
                s.error = Some(reason.clone());
            }
        });
        match &ended {
            Ended::Closed => log::info!("[ws] disconnected"),
            Ended::Failed(reason) => log::warn!("[ws] {reason}"),
        }
        log::info!(
            "[ws] reconnecting in {}ms",
            opts.reconnect_delay.as_millis()
        );

        let wake = Instant::now() + opts.reconnect_delay;
        loop {
            tokio::select! {
                _ = sleep_until(wake) => break,
                _ = refresh.tick() => publish_time_ago(&mut normalizer, &tx),
            }
        }
    }
}

async fn pump<S>(
    mut ws: S,
    normalizer: &mut FeedNormalizer,
    refresh: &mut tokio::time::Interval,
    opts: &FeedOptions,
    tx: &watch::Sender<FeedSnapshot>,
) -> Ended
where
    S: futures_util::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let mut drain_at: Option<Instant> = None;

    loop {
        // Evaluated even while the branch is disabled, so never unwrap here
        let deadline = drain_at.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            msg = ws.next() => match msg {
                Some(Ok(Message::Text(text))) => match normalizer.push_text(&text) {
                    Ingest::Queued => {
                        if drain_at.is_none() {
                            drain_at = Some(Instant::now() + opts.drain_delay);
                        }
                    }
                    Ingest::Properties => {
                        let props = normalizer.properties().cloned();
                        tx.send_modify(|s| s.properties = props);
                    }
                    Ingest::Dropped => {}
                },
                Some(Ok(Message::Close(frame))) => {
                    log::debug!("[ws] close frame: {frame:?}");
                    return Ended::Closed;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Ended::Failed(format!("WebSocket connection error: {e}")),
                None => return Ended::Closed,
            },
            _ = sleep_until(deadline), if drain_at.is_some() => {
                drain_at = None;
                if normalizer.drain(Utc::now()) {
                    let blocks = normalizer.feed().blocks().to_vec();
                    let newest = blocks.first().map(|b| b.number).unwrap_or(0);
                    log::debug!("[ws] feed updated, newest #{newest}");
                    tx.send_modify(|s| s.blocks = blocks);
                }
            },
            _ = refresh.tick() => publish_time_ago(normalizer, tx),
        }
    }
}

fn publish_time_ago(normalizer: &mut FeedNormalizer, tx: &watch::Sender<FeedSnapshot>) {
    if normalizer.feed().is_empty() {
        return;
    }
    normalizer.refresh_time_ago(Utc::now());
    let blocks = normalizer.feed().blocks().to_vec();
    tx.send_modify(|s| s.blocks = blocks);
}
