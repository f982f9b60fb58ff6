//! Error types for Quorate
//!
//! One closed taxonomy covers every failure a workflow operation can report.
//! Callers branch on [`QuorateError::kind`]; the display text is for humans.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::ecdsa::VerifyError;

/// Result type alias using QuorateError
pub type Result<T> = std::result::Result<T, QuorateError>;

/// Entity named by a `NotFound` error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Entity {
    Proposal,
    Approval,
    SuperAdmin,
    Admin,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::Proposal => "Proposal",
            Entity::Approval => "Approval",
            Entity::SuperAdmin => "SuperAdmin",
            Entity::Admin => "Admin",
        };
        f.write_str(name)
    }
}

/// Unified error type for Quorate operations
#[derive(Debug, Error)]
pub enum QuorateError {
    /// Malformed arguments or JSON
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Approver {approver_id} already voted on proposal {proposal_id}")]
    DuplicateApproval {
        proposal_id: String,
        approver_id: String,
    },

    #[error("Signature rejected: {0}")]
    SignatureInvalid(#[source] VerifyError),

    #[error("Approver is not active: {0}")]
    IdentityInactive(String),

    #[error("Proposal has been rejected: {0}")]
    ProposalRejected(String),

    #[error("Quorum not met for proposal {proposal_id}: status is {status}")]
    QuorumNotMet { proposal_id: String, status: String },

    /// Underlying store read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Optimistic commit lost a race; the whole operation may be retried
    #[error("Conflicting write on {key}, retry the operation")]
    ConflictRetry { key: String },
}

/// Machine-readable category of a [`QuorateError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    DuplicateApproval,
    SignatureInvalid,
    IdentityInactive,
    ProposalRejected,
    QuorumNotMet,
    StorageError,
    ConflictRetry,
}

impl ErrorKind {
    /// Stable wire code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::DuplicateApproval => "DUPLICATE_APPROVAL",
            ErrorKind::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorKind::IdentityInactive => "IDENTITY_INACTIVE",
            ErrorKind::ProposalRejected => "PROPOSAL_REJECTED",
            ErrorKind::QuorumNotMet => "QUORUM_NOT_MET",
            ErrorKind::StorageError => "STORAGE_ERROR",
            ErrorKind::ConflictRetry => "CONFLICT_RETRY",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl QuorateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            QuorateError::InvalidInput(_) => ErrorKind::InvalidInput,
            QuorateError::NotFound { .. } => ErrorKind::NotFound,
            QuorateError::DuplicateApproval { .. } => ErrorKind::DuplicateApproval,
            QuorateError::SignatureInvalid(_) => ErrorKind::SignatureInvalid,
            QuorateError::IdentityInactive(_) => ErrorKind::IdentityInactive,
            QuorateError::ProposalRejected(_) => ErrorKind::ProposalRejected,
            QuorateError::QuorumNotMet { .. } => ErrorKind::QuorumNotMet,
            QuorateError::Storage(_) => ErrorKind::StorageError,
            QuorateError::ConflictRetry { .. } => ErrorKind::ConflictRetry,
        }
    }

    /// Whether re-running the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuorateError::ConflictRetry { .. })
    }

    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        QuorateError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        QuorateError::InvalidInput(msg.into())
    }
}

impl From<VerifyError> for QuorateError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::InvalidInput(msg) => QuorateError::InvalidInput(msg),
            VerifyError::Encoding(msg) => {
                QuorateError::InvalidInput(format!("base64 decode failed: {msg}"))
            }
            VerifyError::IdentityNotFound(id) => QuorateError::not_found(Entity::SuperAdmin, id),
            err @ (VerifyError::KeyDecode(_) | VerifyError::SignatureInvalid(_)) => {
                QuorateError::SignatureInvalid(err)
            }
        }
    }
}

impl From<serde_json::Error> for QuorateError {
    fn from(err: serde_json::Error) -> Self {
        QuorateError::InvalidInput(format!("malformed JSON: {err}"))
    }
}
