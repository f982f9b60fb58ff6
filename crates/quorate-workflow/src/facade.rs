//! Workflow entry points
//!
//! Each public operation opens one unit of work, runs its steps against it
//! and commits once. Read-only operations drop their transaction.

use std::sync::Arc;

use quorate_common::{
    Approval, ApprovalPatch, Identity, IdentityPatch, IdentityRole, Proposal, ProposalPatch,
    ProposalStatus, QuorateError, Result, Vote,
};
use quorate_ledger::{
    ApprovalRepository, IdentityRepository, Ledger, LedgerApprovalRepository,
    LedgerIdentityRepository, LedgerProposalRepository, Page, ProposalRepository,
};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, instrument, warn, Span};

use crate::approval_ledger::{ApprovalDraft, ApprovalLedger};
use crate::config::WorkflowConfig;
use crate::quorum::{QuorumEvaluator, QuorumStatus};
use crate::registry::IdentityRegistry;
use crate::state_machine::ProposalStateMachine;
use crate::verifier::SignatureVerifier;

/// Request to open a vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub message: String,
    pub created_by: String,
    /// Falls back to the configured default
    #[serde(default)]
    pub quorum_number: Option<u32>,
}

/// A signed vote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub proposal_id: String,
    pub approver_id: String,
    /// Base64 ASN.1 DER ECDSA signature
    pub signature: String,
    /// Base64 signed bytes
    pub message: String,
    #[serde(default)]
    pub vote: Option<Vote>,
}

/// Storage seams the workflow runs against
#[derive(Clone)]
pub struct Repositories {
    pub proposals: Arc<dyn ProposalRepository>,
    pub approvals: Arc<dyn ApprovalRepository>,
    pub identities: Arc<dyn IdentityRepository>,
}

impl Default for Repositories {
    fn default() -> Self {
        Self {
            proposals: Arc::new(LedgerProposalRepository),
            approvals: Arc::new(LedgerApprovalRepository),
            identities: Arc::new(LedgerIdentityRepository),
        }
    }
}

/// Orchestrates proposals, approvals and commits
pub struct ApprovalWorkflow {
    ledger: Ledger,
    config: WorkflowConfig,
    registry: IdentityRegistry,
    verifier: SignatureVerifier,
    approvals: ApprovalLedger,
    machine: Arc<ProposalStateMachine>,
    evaluator: QuorumEvaluator,
    span: Span,
}

impl ApprovalWorkflow {
    pub fn new(ledger: Ledger, config: WorkflowConfig, parent: &Span) -> Result<Self> {
        Self::with_repositories(ledger, config, Repositories::default(), parent)
    }

    pub fn with_repositories(
        ledger: Ledger,
        config: WorkflowConfig,
        repositories: Repositories,
        parent: &Span,
    ) -> Result<Self> {
        config.validate()?;

        let span = info_span!(parent: parent, "approval_workflow");
        let machine = Arc::new(ProposalStateMachine::new(
            repositories.proposals,
            config.allow_status_override,
            &span,
        ));

        Ok(Self {
            registry: IdentityRegistry::new(Arc::clone(&repositories.identities), &span),
            verifier: SignatureVerifier::new(repositories.identities, &span),
            approvals: ApprovalLedger::new(
                Arc::clone(&repositories.approvals),
                config.approval_mode,
                &span,
            ),
            evaluator: QuorumEvaluator::new(
                repositories.approvals,
                Arc::clone(&machine),
                config.approval_mode.verified_counts(),
                &span,
            ),
            machine,
            ledger,
            config,
            span,
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn page_size(&self, requested: Option<usize>) -> Result<usize> {
        self.config.resolve_page_size(requested)
    }

    // ---- Proposals ----

    #[instrument(parent = &self.span, skip_all, fields(created_by = %request.created_by))]
    pub async fn submit_proposal(&self, request: ProposalRequest) -> Result<Proposal> {
        let quorum = request.quorum_number.unwrap_or(self.config.default_quorum);
        let mut tx = self.ledger.begin();
        let proposal = self
            .machine
            .create(&mut tx, &request.message, &request.created_by, quorum)
            .await?;
        tx.commit().await?;
        Ok(proposal)
    }

    /// Record a signed vote and re-evaluate the proposal's quorum
    ///
    /// Checks run in order: approver active, proposal open to votes, no prior
    /// vote by this approver, signature valid. Only then is the approval
    /// written and the proposal recounted.
    #[instrument(
        parent = &self.span,
        skip_all,
        fields(proposal_id = %request.proposal_id, approver_id = %request.approver_id)
    )]
    pub async fn submit_approval(&self, request: ApprovalRequest) -> Result<Approval> {
        if request.proposal_id.trim().is_empty() || request.approver_id.trim().is_empty() {
            return Err(QuorateError::invalid("proposalId and approverId are required"));
        }
        let status = self.approvals.status_for(request.vote)?;

        let mut tx = self.ledger.begin();

        self.registry
            .require_active(&mut tx, &request.approver_id)
            .await?;

        let proposal = self.machine.load(&mut tx, &request.proposal_id).await?;
        if proposal.status == ProposalStatus::Rejected {
            warn!("Vote on rejected proposal refused");
            return Err(QuorateError::ProposalRejected(proposal.id));
        }

        if self
            .approvals
            .exists(&mut tx, &request.proposal_id, &request.approver_id)
            .await?
        {
            return Err(QuorateError::DuplicateApproval {
                proposal_id: request.proposal_id,
                approver_id: request.approver_id,
            });
        }

        self.verifier
            .verify(
                &mut tx,
                &request.approver_id,
                &request.signature,
                &request.message,
            )
            .await?;

        let approval = self
            .approvals
            .try_record(
                &mut tx,
                ApprovalDraft {
                    proposal_id: request.proposal_id,
                    approver_id: request.approver_id,
                    signature: request.signature,
                    message: request.message,
                    status,
                },
            )
            .await?;

        let proposal = self.evaluator.on_approval_recorded(&mut tx, &approval).await?;
        tx.commit().await?;

        info!(
            approval_id = %approval.id,
            proposal_status = %proposal.status,
            "Vote accepted"
        );
        Ok(approval)
    }

    #[instrument(parent = &self.span, skip(self))]
    pub async fn commit_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let mut tx = self.ledger.begin();
        let proposal = self.machine.commit(&mut tx, proposal_id).await?;
        tx.commit().await?;
        Ok(proposal)
    }

    pub async fn update_proposal(&self, proposal_id: &str, patch: &ProposalPatch) -> Result<Proposal> {
        let mut tx = self.ledger.begin();
        let proposal = self.machine.update_partial(&mut tx, proposal_id, patch).await?;
        tx.commit().await?;
        Ok(proposal)
    }

    pub async fn get_proposal(&self, proposal_id: &str) -> Result<Proposal> {
        let mut tx = self.ledger.begin();
        self.machine.load(&mut tx, proposal_id).await
    }

    pub async fn list_proposals(
        &self,
        page_size: Option<usize>,
        bookmark: &str,
    ) -> Result<Page<Proposal>> {
        let mut tx = self.ledger.begin();
        self.machine
            .list_page(&mut tx, self.page_size(page_size)?, bookmark)
            .await
    }

    /// Open proposals the approver still has to vote on
    pub async fn pending_proposals_for(&self, approver_id: &str) -> Result<Vec<Proposal>> {
        if approver_id.trim().is_empty() {
            return Err(QuorateError::invalid("approverId is required"));
        }
        let mut tx = self.ledger.begin();
        self.evaluator.pending_proposals_for(&mut tx, approver_id).await
    }

    pub async fn quorum_status(&self, proposal_id: &str) -> Result<QuorumStatus> {
        let mut tx = self.ledger.begin();
        self.evaluator.status(&mut tx, proposal_id).await
    }

    // ---- Approvals ----

    pub async fn get_approval(&self, approval_id: &str) -> Result<Approval> {
        let mut tx = self.ledger.begin();
        self.approvals.get_by_id(&mut tx, approval_id).await
    }

    pub async fn get_approval_by_voter(
        &self,
        proposal_id: &str,
        approver_id: &str,
    ) -> Result<Approval> {
        let mut tx = self.ledger.begin();
        self.approvals.get(&mut tx, proposal_id, approver_id).await
    }

    pub async fn approvals_for_proposal(&self, proposal_id: &str) -> Result<Vec<Approval>> {
        let mut tx = self.ledger.begin();
        // Surface a missing proposal rather than an empty list
        self.machine.load(&mut tx, proposal_id).await?;
        self.approvals.for_proposal(&mut tx, proposal_id).await
    }

    pub async fn list_approvals(
        &self,
        page_size: Option<usize>,
        bookmark: &str,
    ) -> Result<Page<Approval>> {
        let mut tx = self.ledger.begin();
        self.approvals
            .list_page(&mut tx, self.page_size(page_size)?, bookmark)
            .await
    }

    pub async fn update_approval(&self, approval_id: &str, patch: &ApprovalPatch) -> Result<Approval> {
        let mut tx = self.ledger.begin();
        let approval = self
            .approvals
            .update(&mut tx, approval_id, patch, self.config.allow_status_override)
            .await?;
        tx.commit().await?;
        Ok(approval)
    }

    // ---- Identities ----

    pub async fn register_super_admin(&self, id: &str, public_key: &str) -> Result<Identity> {
        let mut tx = self.ledger.begin();
        let identity = self
            .registry
            .register_super_admin(&mut tx, id, public_key)
            .await?;
        tx.commit().await?;
        Ok(identity)
    }

    pub async fn register_admin(&self, public_key: &str) -> Result<Identity> {
        let mut tx = self.ledger.begin();
        let identity = self.registry.register_admin(&mut tx, public_key).await?;
        tx.commit().await?;
        Ok(identity)
    }

    pub async fn get_identity(&self, role: IdentityRole, id: &str) -> Result<Identity> {
        let mut tx = self.ledger.begin();
        self.registry.get(&mut tx, role, id).await
    }

    pub async fn list_identities(
        &self,
        role: IdentityRole,
        page_size: Option<usize>,
        bookmark: &str,
    ) -> Result<Page<Identity>> {
        let mut tx = self.ledger.begin();
        self.registry
            .list_page(&mut tx, role, self.page_size(page_size)?, bookmark)
            .await
    }

    pub async fn update_identity(
        &self,
        role: IdentityRole,
        id: &str,
        patch: &IdentityPatch,
    ) -> Result<Identity> {
        let mut tx = self.ledger.begin();
        let identity = self.registry.update(&mut tx, role, id, patch).await?;
        tx.commit().await?;
        Ok(identity)
    }
}
