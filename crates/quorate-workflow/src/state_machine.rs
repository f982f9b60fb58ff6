//! Proposal lifecycle
//!
//! ```text
//! Pending ──quorum──► Approved ──commit──► Committed
//!    │                   │
//!    └──── reject ───────┴──► Rejected
//! ```

use std::sync::Arc;

use quorate_common::{
    Approval, Entity, Proposal, ProposalPatch, ProposalStatus, QuorateError, Result,
};
use quorate_ledger::{Page, ProposalRepository, TxContext};
use tracing::{debug, info, info_span, instrument, warn, Span};

/// Apply one vote to a proposal. Returns whether the proposal changed.
///
/// A rejection vetoes anything short of `Committed`. An approving vote moves
/// `Pending` to `Approved` once `approving` distinct approvers reach the
/// proposal's quorum; it never moves any other status.
pub fn apply_vote(proposal: &mut Proposal, approval: &Approval, approving: usize) -> Result<bool> {
    if approval.status.is_rejection() {
        if proposal.status == ProposalStatus::Committed {
            return Ok(false);
        }
        proposal.transition(ProposalStatus::Rejected, approval.created_at)?;
        return Ok(true);
    }

    if proposal.status == ProposalStatus::Pending && approving >= proposal.quorum_number as usize {
        proposal.transition(ProposalStatus::Approved, approval.created_at)?;
        return Ok(true);
    }

    Ok(false)
}

pub struct ProposalStateMachine {
    proposals: Arc<dyn ProposalRepository>,
    allow_status_override: bool,
    span: Span,
}

impl ProposalStateMachine {
    pub fn new(
        proposals: Arc<dyn ProposalRepository>,
        allow_status_override: bool,
        parent: &Span,
    ) -> Self {
        Self {
            proposals,
            allow_status_override,
            span: info_span!(parent: parent, "proposal_state_machine"),
        }
    }

    #[instrument(parent = &self.span, skip(self, tx, message))]
    pub async fn create(
        &self,
        tx: &mut TxContext,
        message: &str,
        created_by: &str,
        quorum_number: u32,
    ) -> Result<Proposal> {
        if created_by.trim().is_empty() {
            return Err(QuorateError::invalid("createdBy must not be empty"));
        }
        if quorum_number == 0 {
            return Err(QuorateError::invalid("quorumNumber must be at least 1"));
        }

        let proposal = Proposal::new(
            tx.tx_id(),
            message,
            created_by,
            quorum_number,
            tx.timestamp(),
        );
        self.proposals.insert(tx, &proposal).await?;
        info!(proposal_id = %proposal.id, "Proposal created");
        Ok(proposal)
    }

    pub async fn load(&self, tx: &mut TxContext, id: &str) -> Result<Proposal> {
        self.proposals
            .get(tx, id)
            .await?
            .ok_or_else(|| QuorateError::not_found(Entity::Proposal, id))
    }

    /// Fold a freshly recorded approval into the proposal's status
    #[instrument(
        parent = &self.span,
        skip_all,
        fields(proposal_id = %proposal.id, vote = %approval.status, approving = approving)
    )]
    pub async fn register_approval(
        &self,
        tx: &mut TxContext,
        mut proposal: Proposal,
        approval: &Approval,
        approving: usize,
    ) -> Result<Proposal> {
        let before = proposal.status;
        if apply_vote(&mut proposal, approval, approving)? {
            self.proposals.update(tx, &proposal).await?;
            info!(from = %before, to = %proposal.status, "Proposal status changed");
        } else {
            debug!(
                status = %proposal.status,
                quorum = proposal.quorum_number,
                "Proposal status unchanged"
            );
        }
        Ok(proposal)
    }

    /// Finalize an approved proposal. Committing twice succeeds.
    #[instrument(parent = &self.span, skip(self, tx))]
    pub async fn commit(&self, tx: &mut TxContext, id: &str) -> Result<Proposal> {
        let mut proposal = self.load(tx, id).await?;
        match proposal.status {
            ProposalStatus::Pending => {
                warn!("Commit refused, quorum not met");
                Err(QuorateError::QuorumNotMet {
                    proposal_id: proposal.id,
                    status: ProposalStatus::Pending.to_string(),
                })
            }
            ProposalStatus::Rejected => {
                warn!("Commit refused, proposal rejected");
                Err(QuorateError::ProposalRejected(proposal.id))
            }
            ProposalStatus::Approved | ProposalStatus::Committed => {
                proposal.transition(ProposalStatus::Committed, tx.timestamp())?;
                self.proposals.update(tx, &proposal).await?;
                info!("Proposal committed");
                Ok(proposal)
            }
        }
    }

    /// Administrative field overwrite
    ///
    /// `quorumNumber` can only change while the proposal is `Pending`. A
    /// status override needs overrides enabled and must still be a legal
    /// forward transition. No recount happens here.
    #[instrument(parent = &self.span, skip(self, tx, patch))]
    pub async fn update_partial(
        &self,
        tx: &mut TxContext,
        id: &str,
        patch: &ProposalPatch,
    ) -> Result<Proposal> {
        if patch.is_empty() {
            return Err(QuorateError::invalid("proposal patch is empty"));
        }

        let mut proposal = self.load(tx, id).await?;

        if let Some(quorum) = patch.quorum_number {
            if quorum == 0 {
                return Err(QuorateError::invalid("quorumNumber must be at least 1"));
            }
            if proposal.status != ProposalStatus::Pending {
                return Err(QuorateError::invalid(format!(
                    "quorumNumber is fixed once a proposal is {}",
                    proposal.status
                )));
            }
        }
        if let Some(created_by) = &patch.created_by {
            if created_by.trim().is_empty() {
                return Err(QuorateError::invalid("createdBy must not be empty"));
            }
        }

        patch.apply_fields(&mut proposal);
        proposal.updated_at = tx.timestamp();

        if let Some(status) = patch.status {
            if !self.allow_status_override {
                return Err(QuorateError::invalid("proposal status overrides are disabled"));
            }
            proposal.transition(status, tx.timestamp())?;
            warn!(status = %status, "Proposal status overridden");
        }

        self.proposals.update(tx, &proposal).await?;
        info!("Proposal updated");
        Ok(proposal)
    }

    pub async fn list_page(
        &self,
        tx: &mut TxContext,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Proposal>> {
        self.proposals.list_page(tx, page_size, bookmark).await
    }

    pub async fn list_by_status(
        &self,
        tx: &mut TxContext,
        statuses: &[ProposalStatus],
    ) -> Result<Vec<Proposal>> {
        self.proposals.list_by_status(tx, statuses).await
    }
}
