//! In-memory state store
//!
//! Multi-version concurrency control over a single ordered map. Every commit
//! takes the write lock, checks that nothing it read has moved, then applies
//! its writes under the next block height.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ops::Bound;

use async_trait::async_trait;
use parking_lot::RwLock;
use quorate_common::{QuorateError, Result};
use tracing::{debug, info, warn};

use crate::store::{KeyValue, RangeRead, ReadWriteSet, StateStore, Version, VersionedValue};

/// Number of recent writing transaction ids remembered for replay refusal
pub const DEFAULT_TX_WINDOW: usize = 4096;

/// Ids of the most recent writing transactions, oldest evicted first
struct TxWindow {
    capacity: usize,
    ids: HashSet<String>,
    order: VecDeque<String>,
}

impl TxWindow {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            ids: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    fn contains(&self, tx_id: &str) -> bool {
        self.ids.contains(tx_id)
    }

    fn record(&mut self, tx_id: &str) {
        if self.capacity == 0 || !self.ids.insert(tx_id.to_string()) {
            return;
        }
        self.order.push_back(tx_id.to_string());
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }
}

struct Inner {
    entries: BTreeMap<String, VersionedValue>,
    height: Version,
    committed: TxWindow,
}

impl Inner {
    fn new(tx_window: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            height: 0,
            committed: TxWindow::new(tx_window),
        }
    }

    fn scan(&self, start: &str, end: &str) -> Vec<KeyValue> {
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else if start >= end {
            return Vec::new();
        } else {
            Bound::Excluded(end)
        };

        self.entries
            .range::<str, _>((Bound::Included(start), upper))
            .map(|(key, v)| KeyValue {
                key: key.clone(),
                value: v.value.clone(),
                version: v.version,
            })
            .collect()
    }

    /// First key whose state differs from what the transaction saw
    fn find_conflict(&self, rw_set: &ReadWriteSet) -> Option<String> {
        for (key, seen) in &rw_set.reads {
            let current = self.entries.get(key).map(|v| v.version);
            if current != *seen {
                return Some(key.clone());
            }
        }

        for range in &rw_set.range_reads {
            if let Some(key) = self.range_conflict(range) {
                return Some(key);
            }
        }

        None
    }

    fn range_conflict(&self, range: &RangeRead) -> Option<String> {
        let current: Vec<(String, Version)> = self
            .scan(&range.start, &range.end)
            .into_iter()
            .map(|kv| (kv.key, kv.version))
            .collect();

        if current == range.observed {
            return None;
        }

        // Report the first divergent key, or the range start for a pure deletion
        current
            .iter()
            .zip(range.observed.iter())
            .find(|(now, then)| now != then)
            .map(|(now, _)| now.0.clone())
            .or_else(|| current.get(range.observed.len()).map(|(k, _)| k.clone()))
            .or_else(|| Some(range.start.clone()))
    }
}

/// State store kept entirely in process memory
pub struct InMemoryStateStore {
    inner: RwLock<Inner>,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::with_tx_window(DEFAULT_TX_WINDOW)
    }
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that remembers the last `tx_window` writing transaction ids
    pub fn with_tx_window(tx_window: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::new(tx_window)),
        }
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write a raw value outside any transaction, bumping the height
    pub fn seed(&self, key: impl Into<String>, value: Vec<u8>) -> Version {
        let mut inner = self.inner.write();
        inner.height += 1;
        let version = inner.height;
        inner
            .entries
            .insert(key.into(), VersionedValue { value, version });
        version
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>> {
        Ok(self.inner.read().entries.get(key).cloned())
    }

    async fn range(&self, start: &str, end: &str) -> Result<Vec<KeyValue>> {
        Ok(self.inner.read().scan(start, end))
    }

    async fn commit(&self, tx_id: &str, rw_set: ReadWriteSet) -> Result<Version> {
        let mut inner = self.inner.write();

        if inner.committed.contains(tx_id) {
            return Err(QuorateError::Storage(format!(
                "transaction {tx_id} already committed"
            )));
        }

        if let Some(key) = inner.find_conflict(&rw_set) {
            warn!(tx_id = %tx_id, key = ?key, "MVCC read conflict");
            return Err(QuorateError::ConflictRetry { key });
        }

        if rw_set.is_read_only() {
            debug!(tx_id = %tx_id, "Read-only transaction validated");
            return Ok(inner.height);
        }

        inner.committed.record(tx_id);

        inner.height += 1;
        let version = inner.height;
        let writes = rw_set.writes.len();
        for (key, value) in rw_set.writes {
            match value {
                Some(value) => {
                    inner.entries.insert(key, VersionedValue { value, version });
                }
                None => {
                    inner.entries.remove(&key);
                }
            }
        }

        info!(tx_id = %tx_id, height = version, writes, "Transaction committed");
        Ok(version)
    }

    async fn height(&self) -> Version {
        self.inner.read().height
    }
}
