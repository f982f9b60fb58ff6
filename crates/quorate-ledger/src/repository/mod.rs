//! Typed repositories over the ledger
//!
//! Each repository owns one table's key layout and JSON encoding. Single
//! record reads and the scans that feed vote counting treat an undecodable
//! value as a storage error. Paged listings skip it with a warning and keep
//! going.

pub mod approval;
pub mod identity;
pub mod proposal;

pub use approval::{ApprovalRepository, LedgerApprovalRepository};
pub use identity::{IdentityRepository, LedgerIdentityRepository};
pub use proposal::{LedgerProposalRepository, ProposalRepository};

use quorate_common::{QuorateError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::query::{Page, QueryMetadata, StateIterator};

pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| QuorateError::Storage(format!("encode failed: {e}")))
}

pub(crate) fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| QuorateError::Storage(format!("corrupt record at {key:?}: {e}")))
}

/// Decode every row, failing on the first that does not decode
pub(crate) fn decode_all<T: DeserializeOwned>(rows: StateIterator) -> Result<Vec<T>> {
    rows.map(|kv| decode(&kv.key, &kv.value)).collect()
}

/// Decode every row, dropping the ones that fail. Returns the skip count.
pub(crate) fn decode_rows<T: DeserializeOwned>(rows: StateIterator) -> (Vec<T>, usize) {
    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for kv in rows {
        match serde_json::from_slice(&kv.value) {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(key = ?kv.key, error = %e, "Skipping undecodable record");
            }
        }
    }
    (records, skipped)
}

pub(crate) fn decode_page<T: DeserializeOwned>(
    rows: StateIterator,
    metadata: QueryMetadata,
) -> Page<T> {
    let (records, skipped) = decode_rows(rows);
    Page {
        records,
        bookmark: metadata.bookmark,
        skipped,
    }
}

pub(crate) fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(QuorateError::invalid(format!("{field} must not be empty")));
    }
    Ok(())
}
