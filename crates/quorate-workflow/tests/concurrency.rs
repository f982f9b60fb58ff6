//! Optimistic concurrency between overlapping units of work

mod common;

use std::sync::Arc;

use common::{approver, Fixture};
use quorate_common::{
    ApprovalStatus, ErrorKind, ProposalStatus, QuorateError, Result, Vote,
};
use quorate_ledger::{
    Ledger, LedgerApprovalRepository, LedgerProposalRepository, ManualClock, TxContext,
};
use quorate_workflow::{
    ApprovalDraft, ApprovalLedger, ApprovalMode, ApprovalRequest, ApprovalWorkflow,
    ProposalStateMachine, QuorumEvaluator, WorkflowConfig,
};
use tracing::Span;

struct Components {
    ledger: Ledger,
    machine: Arc<ProposalStateMachine>,
    approvals: ApprovalLedger,
    evaluator: QuorumEvaluator,
}

impl Components {
    fn new() -> Self {
        let span = Span::none();
        let machine = Arc::new(ProposalStateMachine::new(
            Arc::new(LedgerProposalRepository),
            false,
            &span,
        ));
        Self {
            ledger: Ledger::in_memory().with_clock(Arc::new(ManualClock::new(0))),
            approvals: ApprovalLedger::new(
                Arc::new(LedgerApprovalRepository),
                ApprovalMode::Explicit,
                &span,
            ),
            evaluator: QuorumEvaluator::new(
                Arc::new(LedgerApprovalRepository),
                Arc::clone(&machine),
                false,
                &span,
            ),
            machine,
        }
    }

    async fn proposal(&self, quorum: u32) -> String {
        let mut tx = self.ledger.begin();
        let proposal = self.machine.create(&mut tx, "m", "admin", quorum).await.unwrap();
        tx.commit().await.unwrap();
        proposal.id
    }

    /// The write half of a vote, without committing
    async fn vote(&self, tx: &mut TxContext, proposal_id: &str, approver_id: &str) -> Result<()> {
        self.machine.load(tx, proposal_id).await?;
        let approval = self
            .approvals
            .try_record(
                tx,
                ApprovalDraft {
                    proposal_id: proposal_id.into(),
                    approver_id: approver_id.into(),
                    signature: "sig".into(),
                    message: "msg".into(),
                    status: ApprovalStatus::Approved,
                },
            )
            .await?;
        self.evaluator.on_approval_recorded(tx, &approval).await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_same_approver_interleaved_only_one_lands() {
    let c = Components::new();
    let proposal_id = c.proposal(3).await;

    let mut first = c.ledger.begin();
    let mut second = c.ledger.begin();
    c.vote(&mut first, &proposal_id, "sa1").await.unwrap();
    c.vote(&mut second, &proposal_id, "sa1").await.unwrap();

    first.commit().await.unwrap();
    let err = second.commit().await.unwrap_err();
    assert!(matches!(err, QuorateError::ConflictRetry { .. }));
    assert!(err.is_retryable());

    // The retry sees the committed vote
    let mut retry = c.ledger.begin();
    let err = c.vote(&mut retry, &proposal_id, "sa1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateApproval);
}

#[tokio::test]
async fn test_concurrent_quorum_votes_are_not_lost() {
    let c = Components::new();
    let proposal_id = c.proposal(2).await;

    // Each sees only its own vote, so neither alone reaches quorum
    let mut first = c.ledger.begin();
    let mut second = c.ledger.begin();
    c.vote(&mut first, &proposal_id, "sa1").await.unwrap();
    c.vote(&mut second, &proposal_id, "sa2").await.unwrap();

    first.commit().await.unwrap();
    let err = second.commit().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConflictRetry);

    let mut retry = c.ledger.begin();
    c.vote(&mut retry, &proposal_id, "sa2").await.unwrap();
    retry.commit().await.unwrap();

    let mut read = c.ledger.begin();
    let proposal = c.machine.load(&mut read, &proposal_id).await.unwrap();
    assert_eq!(proposal.status, ProposalStatus::Approved);
}

#[tokio::test]
async fn test_failed_commit_writes_nothing() {
    let c = Components::new();
    let proposal_id = c.proposal(1).await;

    let mut first = c.ledger.begin();
    let mut second = c.ledger.begin();
    c.vote(&mut first, &proposal_id, "sa1").await.unwrap();
    c.vote(&mut second, &proposal_id, "sa2").await.unwrap();
    first.commit().await.unwrap();
    second.commit().await.unwrap_err();

    let mut read = c.ledger.begin();
    let recorded = c.approvals.for_proposal(&mut read, &proposal_id).await.unwrap();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].approver_id, "sa1");
}

async fn submit_with_retry(
    workflow: &ApprovalWorkflow,
    request: ApprovalRequest,
) -> Result<quorate_common::Approval> {
    loop {
        match workflow.submit_approval(request.clone()).await {
            Err(err) if err.is_retryable() => tokio::task::yield_now().await,
            other => return other,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_duplicate_submissions() {
    let fx = Fixture::new(1, WorkflowConfig::default()).await;
    let proposal = fx.propose(3).await;
    let request = fx.signed(&proposal.id, &approver(1), Some(Vote::Approve));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let workflow = Arc::clone(&fx.workflow);
            let request = request.clone();
            tokio::spawn(async move { submit_with_retry(&workflow, request).await })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(err) => assert_eq!(err.kind(), ErrorKind::DuplicateApproval),
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(
        fx.workflow
            .approvals_for_proposal(&proposal.id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_distinct_approvers_reach_quorum() {
    let fx = Fixture::new(5, WorkflowConfig::default()).await;
    let proposal = fx.propose(5).await;

    let handles: Vec<_> = (1..=5)
        .map(|i| {
            let workflow = Arc::clone(&fx.workflow);
            let request = fx.signed(&proposal.id, &approver(i), Some(Vote::Approve));
            tokio::spawn(async move { submit_with_retry(&workflow, request).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let proposal = fx.workflow.get_proposal(&proposal.id).await.unwrap();
    assert_eq!(proposal.status, ProposalStatus::Approved);
    let status = fx.workflow.quorum_status(&proposal.id).await.unwrap();
    assert_eq!(status.approvals, 5);
}
