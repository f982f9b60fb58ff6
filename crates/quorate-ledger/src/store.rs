//! State store seam

use std::collections::BTreeMap;

use async_trait::async_trait;
use quorate_common::Result;

/// Block height at which a key was last written
pub type Version = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: Vec<u8>,
    pub version: Version,
}

/// Keys and versions a range scan observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeRead {
    pub start: String,
    pub end: String,
    pub observed: Vec<(String, Version)>,
}

/// Everything a unit of work read and intends to write
#[derive(Debug, Clone, Default)]
pub struct ReadWriteSet {
    /// Version seen per key, `None` when the key was absent
    pub reads: BTreeMap<String, Option<Version>>,
    pub range_reads: Vec<RangeRead>,
    /// `None` deletes the key
    pub writes: BTreeMap<String, Option<Vec<u8>>>,
}

impl ReadWriteSet {
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Trait for versioned state backends
///
/// `commit` must validate the read set and apply the writes atomically with
/// respect to other commits.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Committed value and version of a key
    async fn get(&self, key: &str) -> Result<Option<VersionedValue>>;

    /// Committed entries in `[start, end)`, ascending. An empty `end` is unbounded.
    async fn range(&self, start: &str, end: &str) -> Result<Vec<KeyValue>>;

    /// Validate and apply a transaction, returning the resulting height
    async fn commit(&self, tx_id: &str, rw_set: ReadWriteSet) -> Result<Version>;

    /// Current block height
    async fn height(&self) -> Version;
}
