//! # Quorate Common
//!
//! Shared entities, errors, and signature primitives for the Quorate
//! multi-party approval workflow.
//!
//! ## Core Types
//!
//! - [`Proposal`]: an opaque payload put to a vote, with its quorum threshold
//! - [`Approval`]: one signed vote by one approver on one proposal
//! - [`Identity`]: a super-administrator (approver) or administrator record
//! - [`ProposalPatch`]/[`ApprovalPatch`]/[`IdentityPatch`]: typed partial updates
//!
//! ## Crypto
//!
//! - [`crypto::ecdsa`]: ECDSA P-256 / SHA-256 verification over base64 payloads
//!
//! ## Errors
//!
//! - [`QuorateError`]: the closed error taxonomy shared by every crate

pub mod crypto;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use crypto::ecdsa::{verify_signature, ApproverKey, VerifyError};
pub use error::{Entity, ErrorKind, QuorateError, Result};
pub use types::{
    approval::{Approval, ApprovalPatch, ApprovalStatus, Vote},
    identity::{Identity, IdentityPatch, IdentityRole, IdentityStatus},
    proposal::{Proposal, ProposalPatch, ProposalStatus},
};

/// Quorate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Quorum threshold applied when a proposal is submitted without one
pub const DEFAULT_QUORUM_NUMBER: u32 = 3;

/// Default page size for bulk listings
pub const DEFAULT_PAGE_SIZE: usize = 20;
