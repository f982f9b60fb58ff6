//! Approval entity
//!
//! An approval is one signed vote by one approver on one proposal. It is
//! uniquely identified by `(proposal_id, approver_id)`.

use serde::{Deserialize, Serialize};

use crate::error::{QuorateError, Result};

/// Status recorded on an approval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    /// Signature checked, vote implied by creation (legacy flow)
    Verified,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Verified => "Verified",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
        }
    }

    /// Whether this vote counts toward quorum. `Verified` only counts when
    /// approval creation itself is the vote.
    pub fn is_approving(&self, verified_counts: bool) -> bool {
        match self {
            ApprovalStatus::Approved => true,
            ApprovalStatus::Verified => verified_counts,
            ApprovalStatus::Rejected => false,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, ApprovalStatus::Rejected)
    }

    /// Legal override targets. A rejection is final.
    pub fn can_transition_to(&self, next: ApprovalStatus) -> bool {
        use ApprovalStatus::*;
        *self == next
            || matches!(
                (*self, next),
                (Verified, Approved) | (Verified, Rejected) | (Approved, Rejected)
            )
    }
}

impl std::fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApprovalStatus {
    type Err = QuorateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Verified" => Ok(ApprovalStatus::Verified),
            "Approved" => Ok(ApprovalStatus::Approved),
            "Rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(QuorateError::invalid(format!(
                "unknown approval status: {other}"
            ))),
        }
    }
}

/// Vote carried by an approval submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Approve,
    Reject,
}

impl Vote {
    pub fn status(&self) -> ApprovalStatus {
        match self {
            Vote::Approve => ApprovalStatus::Approved,
            Vote::Reject => ApprovalStatus::Rejected,
        }
    }
}

/// One signed vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Approval {
    pub id: String,
    pub proposal_id: String,
    pub approver_id: String,
    /// Base64 ASN.1 DER ECDSA signature
    pub signature: String,
    /// Base64 signed bytes
    pub message: String,
    pub status: ApprovalStatus,
    /// Unix seconds, immutable
    pub created_at: i64,
}

/// Administrative partial update of an approval
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApprovalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ApprovalStatus>,
}

impl ApprovalPatch {
    pub fn is_empty(&self) -> bool {
        self.signature.is_none() && self.message.is_none() && self.status.is_none()
    }

    pub fn apply(&self, approval: &mut Approval) {
        if let Some(signature) = &self.signature {
            approval.signature = signature.clone();
        }
        if let Some(message) = &self.message {
            approval.message = message.clone();
        }
        if let Some(status) = self.status {
            approval.status = status;
        }
    }
}
