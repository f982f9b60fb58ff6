//! Quorum counting

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use quorate_common::{Approval, Proposal, ProposalStatus, Result};
use quorate_ledger::{ApprovalRepository, TxContext};
use serde::Serialize;
use tracing::{debug, info_span, instrument, Span};

use crate::state_machine::ProposalStateMachine;

/// Distinct approvers on each side of a proposal
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuorumTally {
    pub approving: BTreeSet<String>,
    pub rejecting: BTreeSet<String>,
}

impl QuorumTally {
    /// Tally stored approvals plus the one being recorded in this unit of
    /// work, which storage does not show yet. Each approver counts once.
    pub fn collect<'a>(
        recorded: impl IntoIterator<Item = &'a Approval>,
        triggering: Option<&'a Approval>,
        verified_counts: bool,
    ) -> Self {
        let mut tally = Self::default();
        for approval in recorded.into_iter().chain(triggering) {
            if approval.status.is_approving(verified_counts) {
                tally.approving.insert(approval.approver_id.clone());
            } else if approval.status.is_rejection() {
                tally.rejecting.insert(approval.approver_id.clone());
            }
        }
        tally
    }

    pub fn approving_count(&self) -> usize {
        self.approving.len()
    }

    pub fn rejecting_count(&self) -> usize {
        self.rejecting.len()
    }
}

/// Progress of a proposal toward its quorum
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumStatus {
    pub proposal_id: String,
    pub status: ProposalStatus,
    pub required: u32,
    pub approvals: usize,
    pub rejections: usize,
    pub reached: bool,
}

pub struct QuorumEvaluator {
    approvals: Arc<dyn ApprovalRepository>,
    machine: Arc<ProposalStateMachine>,
    verified_counts: bool,
    span: Span,
}

impl QuorumEvaluator {
    pub fn new(
        approvals: Arc<dyn ApprovalRepository>,
        machine: Arc<ProposalStateMachine>,
        verified_counts: bool,
        parent: &Span,
    ) -> Self {
        Self {
            approvals,
            machine,
            verified_counts,
            span: info_span!(parent: parent, "quorum_evaluator"),
        }
    }

    /// Recount the proposal of a just-recorded approval and let the state
    /// machine decide on a transition
    #[instrument(parent = &self.span, skip_all, fields(proposal_id = %approval.proposal_id))]
    pub async fn on_approval_recorded(
        &self,
        tx: &mut TxContext,
        approval: &Approval,
    ) -> Result<Proposal> {
        let proposal = self.machine.load(tx, &approval.proposal_id).await?;
        let recorded = self.approvals.for_proposal(tx, &approval.proposal_id).await?;
        let tally = QuorumTally::collect(&recorded, Some(approval), self.verified_counts);
        debug!(
            approving = tally.approving_count(),
            rejecting = tally.rejecting_count(),
            required = proposal.quorum_number,
            "Tally"
        );
        self.machine
            .register_approval(tx, proposal, approval, tally.approving_count())
            .await
    }

    /// Open proposals this approver has not voted on yet
    #[instrument(parent = &self.span, skip(self, tx))]
    pub async fn pending_proposals_for(
        &self,
        tx: &mut TxContext,
        approver_id: &str,
    ) -> Result<Vec<Proposal>> {
        let voted: HashSet<String> = self
            .approvals
            .by_approver(tx, approver_id)
            .await?
            .into_iter()
            .map(|a| a.proposal_id)
            .collect();

        let open = self
            .machine
            .list_by_status(tx, &[ProposalStatus::Pending, ProposalStatus::Approved])
            .await?;

        let pending: Vec<Proposal> = open
            .into_iter()
            .filter(|p| !voted.contains(&p.id))
            .collect();
        debug!(voted = voted.len(), pending = pending.len(), "Worklist built");
        Ok(pending)
    }

    pub async fn status(&self, tx: &mut TxContext, proposal_id: &str) -> Result<QuorumStatus> {
        let proposal = self.machine.load(tx, proposal_id).await?;
        let recorded = self.approvals.for_proposal(tx, proposal_id).await?;
        let tally = QuorumTally::collect(&recorded, None, self.verified_counts);
        Ok(QuorumStatus {
            reached: tally.approving_count() >= proposal.quorum_number as usize,
            proposal_id: proposal.id,
            status: proposal.status,
            required: proposal.quorum_number,
            approvals: tally.approving_count(),
            rejections: tally.rejecting_count(),
        })
    }
}
