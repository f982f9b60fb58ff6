//! Function-name dispatch
//!
//! Maps `(function, args)` invocations onto the workflow and wraps the
//! outcome in a uniform JSON response. Every argument is a string; structured
//! arguments are JSON documents.

use std::sync::Arc;

use quorate_common::{
    ApprovalPatch, ErrorKind, IdentityPatch, IdentityRole, ProposalPatch, QuorateError, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::facade::{ApprovalRequest, ApprovalWorkflow, ProposalRequest};

pub const STATUS_OK: u16 = 200;
pub const STATUS_ERROR: u16 = 500;

/// Functions understood by [`Dispatcher::invoke`]
pub const FUNCTIONS: &[&str] = &[
    "create_proposal",
    "get_proposal",
    "list_proposals",
    "update_proposal",
    "commit_proposal",
    "create_approval",
    "get_approval",
    "get_approval_by_voter",
    "list_approvals",
    "list_proposal_approvals",
    "update_approval",
    "pending_proposals",
    "quorum_status",
    "create_super_admin",
    "get_super_admin",
    "list_super_admins",
    "update_super_admin",
    "create_admin",
    "get_admin",
    "update_admin",
];

/// Outcome of one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    /// `OK` or an error code
    pub code: String,
    pub message: String,
    pub payload: Value,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl Response {
    pub fn success(payload: Value) -> Self {
        Self {
            status: STATUS_OK,
            code: "OK".to_string(),
            message: String::new(),
            payload,
            kind: None,
        }
    }

    pub fn failure(err: &QuorateError) -> Self {
        let kind = err.kind();
        Self {
            status: STATUS_ERROR,
            code: kind.code().to_string(),
            message: err.to_string(),
            payload: Value::Null,
            kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

fn exact<'a, const N: usize>(function: &str, args: &'a [String]) -> Result<[&'a str; N]> {
    let refs: Vec<&str> = args.iter().map(String::as_str).collect();
    refs.try_into().map_err(|refs: Vec<&str>| {
        QuorateError::invalid(format!(
            "{function} expects {N} argument(s), got {}",
            refs.len()
        ))
    })
}

/// Zero args or a bookmark, optionally followed by a page size
fn paging<'a>(function: &str, args: &'a [String]) -> Result<(&'a str, Option<usize>)> {
    match args {
        [] => Ok(("", None)),
        [bookmark] => Ok((bookmark.as_str(), None)),
        [bookmark, size] => {
            let size = size
                .parse::<usize>()
                .map_err(|_| QuorateError::invalid(format!("invalid page size: {size}")))?;
            Ok((bookmark.as_str(), Some(size)))
        }
        _ => Err(QuorateError::invalid(format!(
            "{function} expects at most 2 arguments, got {}",
            args.len()
        ))),
    }
}

fn payload<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| QuorateError::Storage(format!("encode failed: {e}")))
}

pub struct Dispatcher {
    workflow: Arc<ApprovalWorkflow>,
}

impl Dispatcher {
    pub fn new(workflow: Arc<ApprovalWorkflow>) -> Self {
        Self { workflow }
    }

    pub fn workflow(&self) -> &Arc<ApprovalWorkflow> {
        &self.workflow
    }

    pub async fn invoke(&self, function: &str, args: &[String]) -> Response {
        match self.route(function, args).await {
            Ok(value) => {
                debug!(function, "Invocation succeeded");
                Response::success(value)
            }
            Err(err) => {
                warn!(function, code = %err.kind(), error = %err, "Invocation failed");
                Response::failure(&err)
            }
        }
    }

    async fn route(&self, function: &str, args: &[String]) -> Result<Value> {
        let wf = &self.workflow;
        match function {
            "create_proposal" => {
                let [json] = exact::<1>(function, args)?;
                let request: ProposalRequest = serde_json::from_str(json)?;
                payload(wf.submit_proposal(request).await?)
            }
            "get_proposal" => {
                let [id] = exact::<1>(function, args)?;
                payload(wf.get_proposal(id).await?)
            }
            "list_proposals" => {
                let (bookmark, size) = paging(function, args)?;
                payload(wf.list_proposals(size, bookmark).await?)
            }
            "update_proposal" => {
                let [id, json] = exact::<2>(function, args)?;
                let patch: ProposalPatch = serde_json::from_str(json)?;
                payload(wf.update_proposal(id, &patch).await?)
            }
            "commit_proposal" => {
                let [id] = exact::<1>(function, args)?;
                payload(wf.commit_proposal(id).await?)
            }
            "create_approval" => {
                let [json] = exact::<1>(function, args)?;
                let request: ApprovalRequest = serde_json::from_str(json)?;
                payload(wf.submit_approval(request).await?)
            }
            "get_approval" => {
                let [id] = exact::<1>(function, args)?;
                payload(wf.get_approval(id).await?)
            }
            "get_approval_by_voter" => {
                let [proposal_id, approver_id] = exact::<2>(function, args)?;
                payload(wf.get_approval_by_voter(proposal_id, approver_id).await?)
            }
            "list_approvals" => {
                let (bookmark, size) = paging(function, args)?;
                payload(wf.list_approvals(size, bookmark).await?)
            }
            "list_proposal_approvals" => {
                let [proposal_id] = exact::<1>(function, args)?;
                payload(wf.approvals_for_proposal(proposal_id).await?)
            }
            "update_approval" => {
                let [id, json] = exact::<2>(function, args)?;
                let patch: ApprovalPatch = serde_json::from_str(json)?;
                payload(wf.update_approval(id, &patch).await?)
            }
            "pending_proposals" => {
                let [approver_id] = exact::<1>(function, args)?;
                payload(wf.pending_proposals_for(approver_id).await?)
            }
            "quorum_status" => {
                let [proposal_id] = exact::<1>(function, args)?;
                payload(wf.quorum_status(proposal_id).await?)
            }
            "create_super_admin" => {
                let [id, public_key] = exact::<2>(function, args)?;
                payload(wf.register_super_admin(id, public_key).await?)
            }
            "get_super_admin" => {
                let [id] = exact::<1>(function, args)?;
                payload(wf.get_identity(IdentityRole::SuperAdmin, id).await?)
            }
            "list_super_admins" => {
                let (bookmark, size) = paging(function, args)?;
                payload(
                    wf.list_identities(IdentityRole::SuperAdmin, size, bookmark)
                        .await?,
                )
            }
            "update_super_admin" => {
                let [id, json] = exact::<2>(function, args)?;
                let patch: IdentityPatch = serde_json::from_str(json)?;
                payload(
                    wf.update_identity(IdentityRole::SuperAdmin, id, &patch)
                        .await?,
                )
            }
            "create_admin" => {
                let [public_key] = exact::<1>(function, args)?;
                payload(wf.register_admin(public_key).await?)
            }
            "get_admin" => {
                let [id] = exact::<1>(function, args)?;
                payload(wf.get_identity(IdentityRole::Admin, id).await?)
            }
            "update_admin" => {
                let [id, json] = exact::<2>(function, args)?;
                let patch: IdentityPatch = serde_json::from_str(json)?;
                payload(wf.update_identity(IdentityRole::Admin, id, &patch).await?)
            }
            other => Err(QuorateError::invalid(format!("unknown function: {other}"))),
        }
    }
}
