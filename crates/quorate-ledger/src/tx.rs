//! Units of work
//!
//! Every workflow operation runs inside one [`TxContext`]: it reads committed
//! state, buffers its writes, and commits once at the end.

use std::sync::Arc;

use quorate_common::{QuorateError, Result};
use tracing::debug;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::key::{partial_key_range, MIN_UNICODE_RUNE};
use crate::memory::InMemoryStateStore;
use crate::query::{QueryMetadata, Selector, StateIterator};
use crate::store::{RangeRead, ReadWriteSet, StateStore, Version};

/// Entry point for opening transactions against a store
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(store: Arc<dyn StateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Fresh in-memory store with the system clock
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStateStore::new()), Arc::new(SystemClock))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Open a unit of work with a new transaction id and timestamp
    pub fn begin(&self) -> TxContext {
        TxContext {
            store: Arc::clone(&self.store),
            tx_id: Uuid::now_v7().to_string(),
            timestamp: self.clock.now_seconds(),
            rw_set: ReadWriteSet::default(),
            issued_ids: 0,
        }
    }
}

/// One transaction: read tracking, buffered writes, single commit
pub struct TxContext {
    store: Arc<dyn StateStore>,
    tx_id: String,
    timestamp: i64,
    rw_set: ReadWriteSet,
    issued_ids: u32,
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(QuorateError::invalid("key must not be empty"));
    }
    Ok(())
}

impl TxContext {
    pub fn tx_id(&self) -> &str {
        &self.tx_id
    }

    /// Unix seconds, fixed for the whole transaction
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Deterministic identifier derived from the transaction id. Each call
    /// within the same transaction yields a different id.
    pub fn new_document_id(&mut self) -> String {
        self.issued_ids += 1;
        let hash = blake3::hash(format!("{}:{}", self.tx_id, self.issued_ids).as_bytes());
        hash.to_hex()[..32].to_string()
    }

    pub async fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        let found = self.store.get(key).await?;
        self.rw_set
            .reads
            .entry(key.to_string())
            .or_insert(found.as_ref().map(|v| v.version));
        Ok(found.map(|v| v.value))
    }

    pub fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        self.rw_set.writes.insert(key.to_string(), Some(value));
        Ok(())
    }

    pub fn del_state(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.rw_set.writes.insert(key.to_string(), None);
        Ok(())
    }

    /// Scan `[start, end)`; the observed keys are revalidated at commit
    pub async fn get_state_by_range(&mut self, start: &str, end: &str) -> Result<StateIterator> {
        let rows = self.store.range(start, end).await?;
        self.rw_set.range_reads.push(RangeRead {
            start: start.to_string(),
            end: end.to_string(),
            observed: rows.iter().map(|kv| (kv.key.clone(), kv.version)).collect(),
        });
        debug!(tx_id = %self.tx_id, rows = rows.len(), "Range scan");
        Ok(StateIterator::new(rows))
    }

    pub async fn get_state_by_partial_composite_key(
        &mut self,
        object_type: &str,
        attributes: &[&str],
    ) -> Result<StateIterator> {
        let (start, end) = partial_key_range(object_type, attributes)?;
        self.get_state_by_range(&start, &end).await
    }

    /// Rich query over a table. Not revalidated at commit.
    pub async fn get_query_result(&self, selector: &Selector) -> Result<StateIterator> {
        let (start, end) = partial_key_range(&selector.table, &[])?;
        let rows: Vec<_> = self
            .store
            .range(&start, &end)
            .await?
            .into_iter()
            .filter(|kv| selector.matches_bytes(&kv.value))
            .collect();
        debug!(tx_id = %self.tx_id, table = %selector.table, rows = rows.len(), "Query");
        Ok(StateIterator::new(rows))
    }

    /// Rich query returning at most `page_size` rows after `bookmark`
    pub async fn get_query_result_with_pagination(
        &self,
        selector: &Selector,
        page_size: usize,
        bookmark: &str,
    ) -> Result<(StateIterator, QueryMetadata)> {
        if page_size == 0 {
            return Err(QuorateError::invalid("page size must be positive"));
        }

        let (table_start, end) = partial_key_range(&selector.table, &[])?;
        let start = if bookmark.is_empty() {
            table_start
        } else {
            if !(bookmark >= table_start.as_str() && bookmark < end.as_str()) {
                return Err(QuorateError::invalid(format!(
                    "bookmark does not belong to table {}",
                    selector.table
                )));
            }
            // Smallest key strictly greater than the bookmark
            let mut next = bookmark.to_string();
            next.push(MIN_UNICODE_RUNE);
            next
        };

        let mut rows = Vec::with_capacity(page_size.min(64));
        for kv in self.store.range(&start, &end).await? {
            if selector.matches_bytes(&kv.value) {
                rows.push(kv);
                if rows.len() == page_size {
                    break;
                }
            }
        }

        let bookmark = if rows.len() == page_size {
            rows.last().map(|kv| kv.key.clone()).unwrap_or_default()
        } else {
            String::new()
        };
        let metadata = QueryMetadata {
            fetched_records_count: rows.len(),
            bookmark,
        };
        debug!(
            tx_id = %self.tx_id,
            table = %selector.table,
            fetched = metadata.fetched_records_count,
            "Paginated query"
        );
        Ok((StateIterator::new(rows), metadata))
    }

    /// Buffered writes not yet committed
    pub fn pending_writes(&self) -> usize {
        self.rw_set.writes.len()
    }

    /// Validate reads and apply writes. Consumes the transaction.
    pub async fn commit(self) -> Result<Version> {
        self.store.commit(&self.tx_id, self.rw_set).await
    }
}

impl std::fmt::Debug for TxContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxContext")
            .field("tx_id", &self.tx_id)
            .field("timestamp", &self.timestamp)
            .field("reads", &self.rw_set.reads.len())
            .field("writes", &self.rw_set.writes.len())
            .finish()
    }
}
