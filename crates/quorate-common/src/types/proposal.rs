//! Proposal entity and lifecycle status

use serde::{Deserialize, Serialize};

use crate::error::{QuorateError, Result};

/// Lifecycle status of a proposal
///
/// ```text
/// Pending ──► Approved ──► Committed
///    │           │
///    └──► Rejected ◄┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Committed,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "Pending",
            ProposalStatus::Approved => "Approved",
            ProposalStatus::Rejected => "Rejected",
            ProposalStatus::Committed => "Committed",
        }
    }

    /// No transition leaves a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Rejected | ProposalStatus::Committed)
    }

    /// Still collecting votes or awaiting commit
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Forward-only transition check. Staying in place is allowed so that
    /// re-stamping a status (re-commit, repeated veto) is not an error.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (*self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Approved, Rejected)
                | (Approved, Committed)
        ) || *self == next
    }
}

impl std::fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProposalStatus {
    type Err = QuorateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(ProposalStatus::Pending),
            "Approved" => Ok(ProposalStatus::Approved),
            "Rejected" => Ok(ProposalStatus::Rejected),
            "Committed" => Ok(ProposalStatus::Committed),
            other => Err(QuorateError::invalid(format!(
                "unknown proposal status: {other}"
            ))),
        }
    }
}

/// A payload put to a vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// Assigned from the creating transaction, immutable
    pub id: String,
    /// Opaque payload, never interpreted
    pub message: String,
    pub created_by: String,
    pub status: ProposalStatus,
    /// Distinct approving votes required
    pub quorum_number: u32,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub updated_at: i64,
}

impl Proposal {
    pub fn new(
        id: impl Into<String>,
        message: impl Into<String>,
        created_by: impl Into<String>,
        quorum_number: u32,
        timestamp: i64,
    ) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            created_by: created_by.into(),
            status: ProposalStatus::Pending,
            quorum_number,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Move to `next`, stamping `updated_at`. Backward moves are refused.
    pub fn transition(&mut self, next: ProposalStatus, at: i64) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(QuorateError::invalid(format!(
                "illegal transition {} -> {} for proposal {}",
                self.status, next, self.id
            )));
        }
        self.status = next;
        self.updated_at = at;
        Ok(())
    }
}

/// Administrative partial update of a proposal
///
/// Absent fields are left untouched. `status` is applied by the state
/// machine, which enforces the transition rules; [`ProposalPatch::apply_fields`]
/// never touches it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProposalPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quorum_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ProposalStatus>,
}

impl ProposalPatch {
    pub fn is_empty(&self) -> bool {
        self.message.is_none()
            && self.created_by.is_none()
            && self.quorum_number.is_none()
            && self.status.is_none()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    pub fn with_quorum_number(mut self, quorum_number: u32) -> Self {
        self.quorum_number = Some(quorum_number);
        self
    }

    pub fn with_status(mut self, status: ProposalStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Overwrite every present non-status field
    pub fn apply_fields(&self, proposal: &mut Proposal) {
        if let Some(message) = &self.message {
            proposal.message = message.clone();
        }
        if let Some(created_by) = &self.created_by {
            proposal.created_by = created_by.clone();
        }
        if let Some(quorum_number) = self.quorum_number {
            proposal.quorum_number = quorum_number;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use ProposalStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Committed));
        assert!(Committed.can_transition_to(Committed));

        assert!(!Pending.can_transition_to(Committed));
        assert!(!Approved.can_transition_to(Pending));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Committed.can_transition_to(Rejected));
    }

    #[test]
    fn test_transition_stamps_updated_at() {
        let mut proposal = Proposal::new("p1", "payload", "admin-1", 2, 100);
        proposal.transition(ProposalStatus::Approved, 150).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Approved);
        assert_eq!(proposal.updated_at, 150);
        assert_eq!(proposal.created_at, 100);

        let err = proposal.transition(ProposalStatus::Pending, 160).unwrap_err();
        assert!(err.to_string().contains("illegal transition"));
        assert_eq!(proposal.updated_at, 150);
    }

    #[test]
    fn test_json_shape() {
        let proposal = Proposal::new("p1", "payload", "admin-1", 3, 7);
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["createdBy"], "admin-1");
        assert_eq!(json["quorumNumber"], 3);
        assert_eq!(json["status"], "Pending");
    }

    #[test]
    fn test_patch_leaves_absent_fields() {
        let mut proposal = Proposal::new("p1", "payload", "admin-1", 3, 7);
        ProposalPatch::default()
            .with_message("revised")
            .apply_fields(&mut proposal);
        assert_eq!(proposal.message, "revised");
        assert_eq!(proposal.created_by, "admin-1");
        assert_eq!(proposal.quorum_number, 3);
    }

    #[test]
    fn test_patch_rejects_unknown_fields() {
        let parsed: std::result::Result<ProposalPatch, _> =
            serde_json::from_str(r#"{"message":"m","id":"other"}"#);
        assert!(parsed.is_err());
        let patch: ProposalPatch = serde_json::from_str(r#"{"quorumNumber":4}"#).unwrap();
        assert_eq!(patch.quorum_number, Some(4));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("Committed".parse::<ProposalStatus>().unwrap(), ProposalStatus::Committed);
        assert!("done".parse::<ProposalStatus>().is_err());
    }
}
