//! # Quorate Workflow
//!
//! Signed multi-party approval of proposals with a quorum threshold.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       ApprovalWorkflow                       │
//! │  submit_proposal │ submit_approval │ commit_proposal │ ...    │
//! ├──────────────┬───────────────┬───────────────┬───────────────┤
//! │  Identity    │  Signature    │  Approval     │  Quorum       │
//! │  Registry    │  Verifier     │  Ledger       │  Evaluator    │
//! │  (active?)   │  (P-256)      │  (unique)     │  (tally)      │
//! ├──────────────┴───────────────┴───────────────┼───────────────┤
//! │                                              │ ProposalState │
//! │          quorate-ledger repositories         │ Machine       │
//! └──────────────────────────────────────────────┴───────────────┘
//! ```
//!
//! A vote flows: approver active → proposal not rejected → first vote by
//! this approver → signature valid → approval written → quorum recount. All
//! of it runs in one unit of work, committed once.

pub mod approval_ledger;
pub mod config;
pub mod dispatch;
pub mod facade;
pub mod quorum;
pub mod registry;
pub mod state_machine;
pub mod verifier;

pub use approval_ledger::{ApprovalDraft, ApprovalLedger};
pub use config::{ApprovalMode, WorkflowConfig};
pub use dispatch::{Dispatcher, Response};
pub use facade::{ApprovalRequest, ApprovalWorkflow, ProposalRequest, Repositories};
pub use quorum::{QuorumEvaluator, QuorumStatus, QuorumTally};
pub use registry::IdentityRegistry;
pub use state_machine::{apply_vote, ProposalStateMachine};
pub use verifier::SignatureVerifier;
