//! Shared fixtures for workflow integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use quorate_common::{ApproverKey, Proposal, Vote};
use quorate_ledger::{InMemoryStateStore, Ledger, ManualClock};
use quorate_workflow::{ApprovalRequest, ApprovalWorkflow, ProposalRequest, WorkflowConfig};
use tracing::Span;

pub const START_TIME: i64 = 1_700_000_000;

pub struct Fixture {
    pub workflow: Arc<ApprovalWorkflow>,
    pub clock: Arc<ManualClock>,
    /// Backing store, for planting raw rows
    pub store: Arc<InMemoryStateStore>,
    pub keys: HashMap<String, ApproverKey>,
}

pub fn approver(i: usize) -> String {
    format!("sa{i}")
}

impl Fixture {
    /// Workflow with `approvers` registered super admins `sa1..=saN`
    pub async fn new(approvers: usize, config: WorkflowConfig) -> Self {
        let clock = Arc::new(ManualClock::new(START_TIME));
        let store = Arc::new(InMemoryStateStore::new());
        let ledger = Ledger::new(store.clone(), clock.clone());
        let workflow = Arc::new(ApprovalWorkflow::new(ledger, config, &Span::none()).unwrap());

        let mut keys = HashMap::new();
        for i in 1..=approvers {
            let key = ApproverKey::generate();
            workflow
                .register_super_admin(&approver(i), &key.public_key_pem().unwrap())
                .await
                .unwrap();
            keys.insert(approver(i), key);
        }

        Self {
            workflow,
            clock,
            store,
            keys,
        }
    }

    pub async fn propose(&self, quorum: u32) -> Proposal {
        self.workflow
            .submit_proposal(ProposalRequest {
                message: "raise withdrawal limit to 500".into(),
                created_by: "admin-1".into(),
                quorum_number: Some(quorum),
            })
            .await
            .unwrap()
    }

    /// A correctly signed vote by `approver_id`
    pub fn signed(&self, proposal_id: &str, approver_id: &str, vote: Option<Vote>) -> ApprovalRequest {
        let signed = self.keys[approver_id].sign(format!("vote:{proposal_id}").as_bytes());
        ApprovalRequest {
            proposal_id: proposal_id.into(),
            approver_id: approver_id.into(),
            signature: signed.signature,
            message: signed.message,
            vote,
        }
    }
}
