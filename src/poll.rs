//! Interval polling with unchanged-snapshot suppression.
//!
//! REST views (TPS, market price, order book) refresh on a timer. Most
//! refreshes return exactly what was already shown, so results are compared
//! by their serialized form and only changes are forwarded.

use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};

/// Remembers the serialized form of the last value; last write wins
#[derive(Debug, Default)]
pub struct SnapshotCache {
    last: Option<String>,
}

impl SnapshotCache {
    /// Returns true when `value` differs from the previous one
    pub fn update<T: Serialize>(&mut self, value: &T) -> bool {
        let Ok(snapshot) = serde_json::to_string(value) else {
            return true;
        };
        if self.last.as_deref() == Some(snapshot.as_str()) {
            return false;
        }
        self.last = Some(snapshot);
        true
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent<T> {
    Changed(T),
    Failed(String),
}

/// Poll `fetch` every `interval` until the receiver goes away.
pub async fn run_poller<T, F, Fut>(
    label: &str,
    interval: Duration,
    mut fetch: F,
    tx: UnboundedSender<PollEvent<T>>,
) where
    T: Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut cache = SnapshotCache::default();
    log::info!("[poll] {label} every {}ms", interval.as_millis());

    loop {
        let event = match fetch().await {
            Ok(value) => {
                if cache.update(&value) {
                    log::debug!("[poll] {label} changed");
                    Some(PollEvent::Changed(value))
                } else {
                    log::debug!("[poll] {label} unchanged, skipping update");
                    None
                }
            }
            Err(e) => {
                log::error!("[poll] {label} failed: {e:#}");
                Some(PollEvent::Failed(format!("Failed to fetch {label}")))
            }
        };

        if let Some(event) = event {
            if tx.send(event).is_err() {
                log::debug!("[poll] {label} receiver dropped, stopping");
                return;
            }
        } else if tx.is_closed() {
            return;
        }

        sleep(interval).await;
    }
}
