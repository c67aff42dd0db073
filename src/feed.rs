//! Real-time block feed normalization.
//!
//! Pure state shared by the WebSocket session: push frames are parsed and
//! queued, then drained in one batch into a bounded, newest-first list of
//! block summaries with no duplicate block numbers.

use crate::types::{BlockData, NetworkProperties, WsPayload};
use crate::util_text::format_time_ago;
use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_KEEP_BLOCKS: usize = 16;

/// Render-ready block row
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BlockSummary {
    pub number: u64,
    pub timestamp: DateTime<Utc>,
    pub operation_count: u64,
    pub op_types: Vec<String>,
    pub operation_type_counts: BTreeMap<String, u64>,
    pub accounts: Vec<String>,
    pub time_ago: String,
    pub id: String,
}

/// Server timestamps are UTC without a zone suffix; RFC 3339 is accepted too
pub fn parse_block_ts(ts: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| anyhow!("invalid block timestamp '{ts}': {e}"))
}

impl BlockSummary {
    pub fn from_data(data: BlockData, now: DateTime<Utc>) -> Result<Self> {
        let timestamp = parse_block_ts(&data.ts)?;
        Ok(Self {
            number: data.height,
            timestamp,
            operation_count: data.op_count,
            op_types: data.op_types,
            operation_type_counts: data.op_counts,
            accounts: data.accounts,
            time_ago: format_time_ago(timestamp, now),
            id: format!("{}-{}", data.height, data.ts),
        })
    }
}

/// Bounded newest-first list of block summaries
#[derive(Clone, Debug)]
pub struct BlockFeed {
    blocks: Vec<BlockSummary>,
    keep: usize,
}

impl Default for BlockFeed {
    fn default() -> Self {
        Self::new(DEFAULT_KEEP_BLOCKS)
    }
}

impl BlockFeed {
    pub fn new(keep: usize) -> Self {
        Self {
            blocks: Vec::with_capacity(keep),
            keep: keep.max(1),
        }
    }

    pub fn blocks(&self) -> &[BlockSummary] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Merge a batch. Numbers already shown (or repeated within the batch)
    /// are skipped, the result is ordered by number descending and cut to
    /// the cap. Returns false when nothing new was added.
    pub fn merge(&mut self, batch: Vec<BlockSummary>) -> bool {
        let mut seen: HashSet<u64> = self.blocks.iter().map(|b| b.number).collect();
        let fresh: Vec<BlockSummary> = batch
            .into_iter()
            .filter(|b| seen.insert(b.number))
            .collect();
        if fresh.is_empty() {
            return false;
        }

        let mut merged = Vec::with_capacity(self.blocks.len() + fresh.len());
        merged.extend(fresh);
        merged.extend(self.blocks.iter().cloned());
        merged.sort_by(|a, b| b.number.cmp(&a.number));
        merged.truncate(self.keep);

        if merged == self.blocks {
            return false;
        }
        self.blocks = merged;
        true
    }

    /// Recompute every `time_ago` against `now`; order and membership stay
    pub fn refresh_time_ago(&mut self, now: DateTime<Utc>) {
        for b in &mut self.blocks {
            b.time_ago = format_time_ago(b.timestamp, now);
        }
    }
}

/// What happened to one incoming frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ingest {
    /// Block queued for the next drain
    Queued,
    /// Network properties replaced
    Properties,
    /// Unparseable or unrelated frame, dropped
    Dropped,
}

/// Parses push frames, queues blocks and drains them into a [`BlockFeed`]
#[derive(Debug, Default)]
pub struct FeedNormalizer {
    queue: Vec<BlockData>,
    feed: BlockFeed,
    properties: Option<NetworkProperties>,
}

impl FeedNormalizer {
    pub fn new(keep: usize) -> Self {
        Self {
            queue: Vec::new(),
            feed: BlockFeed::new(keep),
            properties: None,
        }
    }

    pub fn push_text(&mut self, text: &str) -> Ingest {
        match serde_json::from_str::<WsPayload>(text) {
            Ok(WsPayload::Block { block }) => {
                self.queue.push(block);
                Ingest::Queued
            }
            Ok(WsPayload::Props { props }) => {
                self.properties = Some(props);
                Ingest::Properties
            }
            Err(e) => {
                log::warn!("[feed] dropping unparseable frame: {e}");
                Ingest::Dropped
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Turn everything queued into summaries and merge them in one step.
    /// Returns true when the visible list changed.
    pub fn drain(&mut self, now: DateTime<Utc>) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        let batch: Vec<BlockSummary> = self
            .queue
            .drain(..)
            .filter_map(|data| {
                let height = data.height;
                match BlockSummary::from_data(data, now) {
                    Ok(b) => Some(b),
                    Err(e) => {
                        log::warn!("[feed] dropping block {height}: {e:#}");
                        None
                    }
                }
            })
            .collect();
        self.feed.merge(batch)
    }

    pub fn refresh_time_ago(&mut self, now: DateTime<Utc>) {
        self.feed.refresh_time_ago(now);
    }

    pub fn feed(&self) -> &BlockFeed {
        &self.feed
    }

    pub fn properties(&self) -> Option<&NetworkProperties> {
        self.properties.as_ref()
    }
}
