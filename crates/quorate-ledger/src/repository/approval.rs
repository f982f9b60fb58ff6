//! Approval table
//!
//! Keyed by `Approval/{proposal_id}/{approver_id}` so that the uniqueness
//! check is a point read and counting a proposal's votes is a range scan.

use async_trait::async_trait;
use quorate_common::{Approval, QuorateError, Result};
use tracing::debug;

use super::{decode, decode_all, decode_page, encode, require_id};
use crate::key::create_composite_key;
use crate::query::{Page, Selector};
use crate::tx::TxContext;
use crate::APPROVAL_TABLE;

#[async_trait]
pub trait ApprovalRepository: Send + Sync {
    async fn get(
        &self,
        tx: &mut TxContext,
        proposal_id: &str,
        approver_id: &str,
    ) -> Result<Option<Approval>>;

    /// Presence check that never decodes the stored record
    async fn exists(&self, tx: &mut TxContext, proposal_id: &str, approver_id: &str)
        -> Result<bool>;

    async fn insert(&self, tx: &mut TxContext, approval: &Approval) -> Result<()>;

    async fn update(&self, tx: &mut TxContext, approval: &Approval) -> Result<()>;

    /// All approvals of one proposal; the scan is revalidated at commit
    async fn for_proposal(&self, tx: &mut TxContext, proposal_id: &str) -> Result<Vec<Approval>>;

    async fn by_approver(&self, tx: &mut TxContext, approver_id: &str) -> Result<Vec<Approval>>;

    async fn find_by_id(&self, tx: &mut TxContext, approval_id: &str) -> Result<Option<Approval>>;

    async fn list_page(
        &self,
        tx: &mut TxContext,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Approval>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerApprovalRepository;

impl LedgerApprovalRepository {
    pub fn key(proposal_id: &str, approver_id: &str) -> Result<String> {
        require_id("proposal id", proposal_id)?;
        require_id("approver id", approver_id)?;
        create_composite_key(APPROVAL_TABLE, &[proposal_id, approver_id])
    }
}

#[async_trait]
impl ApprovalRepository for LedgerApprovalRepository {
    async fn get(
        &self,
        tx: &mut TxContext,
        proposal_id: &str,
        approver_id: &str,
    ) -> Result<Option<Approval>> {
        let key = Self::key(proposal_id, approver_id)?;
        match tx.get_state(&key).await? {
            Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    async fn exists(
        &self,
        tx: &mut TxContext,
        proposal_id: &str,
        approver_id: &str,
    ) -> Result<bool> {
        let key = Self::key(proposal_id, approver_id)?;
        Ok(tx.get_state(&key).await?.is_some())
    }

    async fn insert(&self, tx: &mut TxContext, approval: &Approval) -> Result<()> {
        let key = Self::key(&approval.proposal_id, &approval.approver_id)?;
        if tx.get_state(&key).await?.is_some() {
            return Err(QuorateError::DuplicateApproval {
                proposal_id: approval.proposal_id.clone(),
                approver_id: approval.approver_id.clone(),
            });
        }
        tx.put_state(&key, encode(approval)?)?;
        debug!(
            proposal_id = %approval.proposal_id,
            approver_id = %approval.approver_id,
            "Approval staged for insert"
        );
        Ok(())
    }

    async fn update(&self, tx: &mut TxContext, approval: &Approval) -> Result<()> {
        let key = Self::key(&approval.proposal_id, &approval.approver_id)?;
        tx.put_state(&key, encode(approval)?)
    }

    async fn for_proposal(&self, tx: &mut TxContext, proposal_id: &str) -> Result<Vec<Approval>> {
        require_id("proposal id", proposal_id)?;
        let rows = tx
            .get_state_by_partial_composite_key(APPROVAL_TABLE, &[proposal_id])
            .await?;
        decode_all(rows)
    }

    async fn by_approver(&self, tx: &mut TxContext, approver_id: &str) -> Result<Vec<Approval>> {
        require_id("approver id", approver_id)?;
        let selector = Selector::table(APPROVAL_TABLE).eq("approverId", approver_id);
        decode_all(tx.get_query_result(&selector).await?)
    }

    async fn find_by_id(&self, tx: &mut TxContext, approval_id: &str) -> Result<Option<Approval>> {
        require_id("approval id", approval_id)?;
        let selector = Selector::table(APPROVAL_TABLE).eq("id", approval_id);
        let approvals: Vec<Approval> = decode_all(tx.get_query_result(&selector).await?)?;
        Ok(approvals.into_iter().next())
    }

    async fn list_page(
        &self,
        tx: &mut TxContext,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Approval>> {
        let selector = Selector::table(APPROVAL_TABLE);
        let (rows, metadata) = tx
            .get_query_result_with_pagination(&selector, page_size, bookmark)
            .await?;
        Ok(decode_page(rows, metadata))
    }
}
