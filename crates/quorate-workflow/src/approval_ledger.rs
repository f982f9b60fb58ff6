//! At-most-one approval per (proposal, approver)

use std::sync::Arc;

use quorate_common::{
    Approval, ApprovalPatch, ApprovalStatus, Entity, QuorateError, Result, Vote,
};
use quorate_ledger::{ApprovalRepository, Page, TxContext};
use tracing::{info, info_span, instrument, warn, Span};

use crate::config::ApprovalMode;

/// Fields of an approval supplied by the submitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalDraft {
    pub proposal_id: String,
    pub approver_id: String,
    pub signature: String,
    pub message: String,
    pub status: ApprovalStatus,
}

pub struct ApprovalLedger {
    approvals: Arc<dyn ApprovalRepository>,
    mode: ApprovalMode,
    span: Span,
}

impl ApprovalLedger {
    pub fn new(approvals: Arc<dyn ApprovalRepository>, mode: ApprovalMode, parent: &Span) -> Self {
        Self {
            approvals,
            mode,
            span: info_span!(parent: parent, "approval_ledger", mode = ?mode),
        }
    }

    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// Status an approval gets for the submitted vote under the current mode
    pub fn status_for(&self, vote: Option<Vote>) -> Result<ApprovalStatus> {
        match (self.mode, vote) {
            (ApprovalMode::Explicit, Some(vote)) => Ok(vote.status()),
            (ApprovalMode::Explicit, None) => Err(QuorateError::invalid(
                "vote is required: expected \"approve\" or \"reject\"",
            )),
            (ApprovalMode::Legacy, None | Some(Vote::Approve)) => Ok(ApprovalStatus::Verified),
            (ApprovalMode::Legacy, Some(Vote::Reject)) => Err(QuorateError::invalid(
                "rejecting votes are not available in legacy approval mode",
            )),
        }
    }

    pub async fn exists(
        &self,
        tx: &mut TxContext,
        proposal_id: &str,
        approver_id: &str,
    ) -> Result<bool> {
        self.approvals.exists(tx, proposal_id, approver_id).await
    }

    /// Persist the draft unless this approver already voted on this proposal
    #[instrument(
        parent = &self.span,
        skip_all,
        fields(proposal_id = %draft.proposal_id, approver_id = %draft.approver_id)
    )]
    pub async fn try_record(&self, tx: &mut TxContext, draft: ApprovalDraft) -> Result<Approval> {
        if self
            .approvals
            .exists(tx, &draft.proposal_id, &draft.approver_id)
            .await?
        {
            warn!("Approver already voted");
            return Err(QuorateError::DuplicateApproval {
                proposal_id: draft.proposal_id,
                approver_id: draft.approver_id,
            });
        }

        let approval = Approval {
            id: tx.new_document_id(),
            proposal_id: draft.proposal_id,
            approver_id: draft.approver_id,
            signature: draft.signature,
            message: draft.message,
            status: draft.status,
            created_at: tx.timestamp(),
        };
        self.approvals.insert(tx, &approval).await?;
        info!(approval_id = %approval.id, status = %approval.status, "Approval recorded");
        Ok(approval)
    }

    pub async fn get(
        &self,
        tx: &mut TxContext,
        proposal_id: &str,
        approver_id: &str,
    ) -> Result<Approval> {
        self.approvals
            .get(tx, proposal_id, approver_id)
            .await?
            .ok_or_else(|| {
                QuorateError::not_found(Entity::Approval, format!("{proposal_id}/{approver_id}"))
            })
    }

    pub async fn get_by_id(&self, tx: &mut TxContext, approval_id: &str) -> Result<Approval> {
        self.approvals
            .find_by_id(tx, approval_id)
            .await?
            .ok_or_else(|| QuorateError::not_found(Entity::Approval, approval_id))
    }

    pub async fn for_proposal(&self, tx: &mut TxContext, proposal_id: &str) -> Result<Vec<Approval>> {
        self.approvals.for_proposal(tx, proposal_id).await
    }

    pub async fn list_page(
        &self,
        tx: &mut TxContext,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Approval>> {
        self.approvals.list_page(tx, page_size, bookmark).await
    }

    /// Administrative overwrite. Never re-runs quorum evaluation, so a
    /// status change is refused unless overrides are enabled.
    #[instrument(parent = &self.span, skip(self, tx, patch))]
    pub async fn update(
        &self,
        tx: &mut TxContext,
        approval_id: &str,
        patch: &ApprovalPatch,
        allow_status_override: bool,
    ) -> Result<Approval> {
        if patch.is_empty() {
            return Err(QuorateError::invalid("approval patch is empty"));
        }
        if patch.status.is_some() && !allow_status_override {
            return Err(QuorateError::invalid(
                "approval status overrides are disabled",
            ));
        }

        let mut approval = self.get_by_id(tx, approval_id).await?;
        if let Some(next) = patch.status {
            if !approval.status.can_transition_to(next) {
                warn!(from = %approval.status, to = %next, "Illegal approval transition refused");
                return Err(QuorateError::invalid(format!(
                    "approval cannot move from {} to {next}",
                    approval.status
                )));
            }
        }
        patch.apply(&mut approval);
        self.approvals.update(tx, &approval).await?;
        info!(proposal_id = %approval.proposal_id, "Approval updated");
        Ok(approval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorate_common::ErrorKind;
    use quorate_ledger::{Ledger, LedgerApprovalRepository};

    fn draft(proposal_id: &str, approver_id: &str) -> ApprovalDraft {
        ApprovalDraft {
            proposal_id: proposal_id.into(),
            approver_id: approver_id.into(),
            signature: "c2ln".into(),
            message: "bXNn".into(),
            status: ApprovalStatus::Approved,
        }
    }

    fn ledger_with(mode: ApprovalMode) -> ApprovalLedger {
        ApprovalLedger::new(Arc::new(LedgerApprovalRepository), mode, &Span::none())
    }

    #[test]
    fn test_status_for_modes() {
        let explicit = ledger_with(ApprovalMode::Explicit);
        assert_eq!(
            explicit.status_for(Some(Vote::Reject)).unwrap(),
            ApprovalStatus::Rejected
        );
        assert!(explicit.status_for(None).is_err());

        let legacy = ledger_with(ApprovalMode::Legacy);
        assert_eq!(legacy.status_for(None).unwrap(), ApprovalStatus::Verified);
        assert_eq!(
            legacy.status_for(Some(Vote::Approve)).unwrap(),
            ApprovalStatus::Verified
        );
        assert!(legacy.status_for(Some(Vote::Reject)).is_err());
    }

    #[tokio::test]
    async fn test_try_record_assigns_identity_and_time() {
        let ledger = Ledger::in_memory();
        let approvals = ledger_with(ApprovalMode::Explicit);

        let mut tx = ledger.begin();
        let approval = approvals.try_record(&mut tx, draft("p1", "sa1")).await.unwrap();
        assert_eq!(approval.created_at, tx.timestamp());
        assert_eq!(approval.id.len(), 32);
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        let err = approvals
            .try_record(&mut tx, draft("p1", "sa1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateApproval);
        assert_eq!(tx.pending_writes(), 0);

        let found = approvals.get_by_id(&mut tx, &approval.id).await.unwrap();
        assert_eq!(found, approval);
    }

    #[tokio::test]
    async fn test_update_gates_status() {
        let ledger = Ledger::in_memory();
        let approvals = ledger_with(ApprovalMode::Explicit);

        let mut tx = ledger.begin();
        let approval = approvals.try_record(&mut tx, draft("p1", "sa1")).await.unwrap();
        tx.commit().await.unwrap();

        let patch = ApprovalPatch {
            status: Some(ApprovalStatus::Rejected),
            ..Default::default()
        };
        let mut tx = ledger.begin();
        let err = approvals
            .update(&mut tx, &approval.id, &patch, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let updated = approvals
            .update(&mut tx, &approval.id, &patch, true)
            .await
            .unwrap();
        assert_eq!(updated.status, ApprovalStatus::Rejected);
        tx.commit().await.unwrap();

        // A rejection cannot be overridden back into an approval
        let revive = ApprovalPatch {
            status: Some(ApprovalStatus::Approved),
            ..Default::default()
        };
        let mut tx = ledger.begin();
        let err = approvals
            .update(&mut tx, &approval.id, &revive, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("Rejected"));

        let message_only = ApprovalPatch {
            message: Some("bmV3".into()),
            ..Default::default()
        };
        let err = approvals
            .update(&mut tx, "missing", &message_only, false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
