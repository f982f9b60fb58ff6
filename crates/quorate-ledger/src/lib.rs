//! # Quorate Ledger
//!
//! Versioned key-value state with optimistic units of work.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                        Ledger                         │
//! │   begin() ──► TxContext { tx_id, timestamp, rw-set }  │
//! ├───────────────────┬───────────────────────────────────┤
//! │   Repositories    │  get/put/range/query/paginate      │
//! │ Proposal Approval │  reads record versions            │
//! │ Identity          │  writes are buffered              │
//! ├───────────────────┴───────────────────────────────────┤
//! │                StateStore (async trait)               │
//! │   commit(tx_id, rw-set): validate versions, apply     │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! A transaction reads committed state only; its own writes become visible
//! once `commit` succeeds. A commit whose read set changed underneath it
//! fails with `ConflictRetry` and writes nothing.

pub mod clock;
pub mod key;
pub mod memory;
pub mod query;
pub mod repository;
pub mod store;
pub mod tx;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::{create_composite_key, partial_key_range, split_composite_key};
pub use memory::{InMemoryStateStore, DEFAULT_TX_WINDOW};
pub use query::{Page, QueryMetadata, Selector, StateIterator};
pub use repository::{
    ApprovalRepository, IdentityRepository, LedgerApprovalRepository, LedgerIdentityRepository,
    LedgerProposalRepository, ProposalRepository,
};
pub use store::{KeyValue, ReadWriteSet, StateStore, Version, VersionedValue};
pub use tx::{Ledger, TxContext};

/// Table holding proposals
pub const PROPOSAL_TABLE: &str = "Proposal";

/// Table holding approvals, keyed by proposal then approver
pub const APPROVAL_TABLE: &str = "Approval";
