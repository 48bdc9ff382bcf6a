//! Recorded feeds and replay ordering
//!
//! A feed is a recorded sequence of updates; each update is the list of
//! market snapshots delivered at one moment. Feeds whose markets belong to
//! the same event are replayed together, interleaved by publish time with
//! ties broken by feed order, so that strategies trading across related
//! markets see them in the order they happened. Feeds without an event
//! (or alone in theirs) replay one after another.
//!
//! Recorded files hold one JSON array of `MarketBook` per line.

use crate::core::StreamId;
use crate::data::MarketBook;
use anyhow::{Context, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalFeed {
    pub stream_id: StreamId,
    /// Where the feed came from (file name, test label)
    pub source: String,
    pub updates: Vec<Vec<MarketBook>>,
}

impl HistoricalFeed {
    pub fn new(stream_id: StreamId, source: impl Into<String>, updates: Vec<Vec<MarketBook>>) -> Self {
        Self {
            stream_id,
            source: source.into(),
            updates,
        }
    }

    /// Load a JSON-lines recording
    pub fn from_path(stream_id: StreamId, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("Failed to open feed {}", path.display()))?;
        let feed = Self::from_reader(stream_id, path.display().to_string(), file)?;
        info!(source = %feed.source, updates = feed.updates.len(), "feed loaded");
        Ok(feed)
    }

    pub fn from_reader(stream_id: StreamId, source: impl Into<String>, reader: impl Read) -> Result<Self> {
        let source = source.into();
        let mut updates = Vec::new();
        for (index, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read {source} line {}", index + 1))?;
            if line.trim().is_empty() {
                continue;
            }
            let books: Vec<MarketBook> = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse {source} line {}", index + 1))?;
            updates.push(books);
        }
        Ok(Self {
            stream_id,
            source,
            updates,
        })
    }

    /// Event of the first snapshot that carries one
    pub fn event_key(&self) -> Option<&str> {
        self.updates
            .iter()
            .flatten()
            .find_map(|book| book.event_id.as_deref())
    }

    pub fn snapshot_count(&self) -> usize {
        self.updates.iter().map(Vec::len).sum()
    }
}

/// Publish time of an update: its earliest snapshot
fn update_time(update: &[MarketBook]) -> u64 {
    update.iter().map(|b| b.publish_time_ms).min().unwrap_or(0)
}

/// Position of one update within a set of feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRef {
    pub feed: usize,
    pub update: usize,
    /// Replay group the update belongs to; the clock restarts per group
    pub group: usize,
}

/// Order in which every update of `feeds` is replayed
///
/// Feeds are grouped by event key in order of first appearance; a group of
/// one (or feeds without an event) replays sequentially, a larger group is
/// merged by `(publish time, feed index)`. Groups are numbered in replay
/// order.
pub fn replay_order(feeds: &[HistoricalFeed]) -> Vec<UpdateRef> {
    let mut groups: Vec<(Option<&str>, Vec<usize>)> = Vec::new();
    for (index, feed) in feeds.iter().enumerate() {
        match feed.event_key() {
            Some(key) => match groups.iter_mut().find(|(k, _)| *k == Some(key)) {
                Some((_, members)) => members.push(index),
                None => groups.push((Some(key), vec![index])),
            },
            None => groups.push((None, vec![index])),
        }
    }

    let mut order = Vec::with_capacity(feeds.iter().map(|f| f.updates.len()).sum());
    for (group, (key, members)) in groups.into_iter().enumerate() {
        if members.len() == 1 {
            let feed = members[0];
            order.extend((0..feeds[feed].updates.len()).map(|update| UpdateRef { feed, update, group }));
            continue;
        }
        debug!(event = ?key, feeds = members.len(), "merging event feeds");
        merge_group(feeds, &members, group, &mut order);
    }
    order
}

fn merge_group(feeds: &[HistoricalFeed], members: &[usize], group: usize, order: &mut Vec<UpdateRef>) {
    // min-heap on (publish time, feed index, update index)
    let mut heap = BinaryHeap::new();
    for &feed in members {
        if let Some(first) = feeds[feed].updates.first() {
            heap.push(Reverse((update_time(first), feed, 0usize)));
        }
    }
    while let Some(Reverse((_, feed, update))) = heap.pop() {
        order.push(UpdateRef { feed, update, group });
        let next = update + 1;
        if let Some(books) = feeds[feed].updates.get(next) {
            heap.push(Reverse((update_time(books), feed, next)));
        }
    }
}
