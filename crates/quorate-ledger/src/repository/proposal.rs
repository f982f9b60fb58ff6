//! Proposal table

use async_trait::async_trait;
use quorate_common::{Proposal, ProposalStatus, QuorateError, Result};
use tracing::debug;

use super::{decode, decode_page, decode_rows, encode, require_id};
use crate::key::create_composite_key;
use crate::query::{Page, Selector};
use crate::tx::TxContext;
use crate::PROPOSAL_TABLE;

#[async_trait]
pub trait ProposalRepository: Send + Sync {
    async fn get(&self, tx: &mut TxContext, id: &str) -> Result<Option<Proposal>>;

    /// Fails if a proposal with the same id exists
    async fn insert(&self, tx: &mut TxContext, proposal: &Proposal) -> Result<()>;

    async fn update(&self, tx: &mut TxContext, proposal: &Proposal) -> Result<()>;

    /// Every proposal currently in one of `statuses`
    async fn list_by_status(
        &self,
        tx: &mut TxContext,
        statuses: &[ProposalStatus],
    ) -> Result<Vec<Proposal>>;

    async fn list_page(
        &self,
        tx: &mut TxContext,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Proposal>>;
}

/// Proposals stored as JSON under `Proposal/{id}`
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerProposalRepository;

impl LedgerProposalRepository {
    pub fn key(id: &str) -> Result<String> {
        require_id("proposal id", id)?;
        create_composite_key(PROPOSAL_TABLE, &[id])
    }
}

#[async_trait]
impl ProposalRepository for LedgerProposalRepository {
    async fn get(&self, tx: &mut TxContext, id: &str) -> Result<Option<Proposal>> {
        let key = Self::key(id)?;
        match tx.get_state(&key).await? {
            Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, tx: &mut TxContext, proposal: &Proposal) -> Result<()> {
        let key = Self::key(&proposal.id)?;
        if tx.get_state(&key).await?.is_some() {
            return Err(QuorateError::invalid(format!(
                "proposal {} already exists",
                proposal.id
            )));
        }
        tx.put_state(&key, encode(proposal)?)?;
        debug!(proposal_id = %proposal.id, "Proposal staged for insert");
        Ok(())
    }

    async fn update(&self, tx: &mut TxContext, proposal: &Proposal) -> Result<()> {
        let key = Self::key(&proposal.id)?;
        tx.put_state(&key, encode(proposal)?)
    }

    async fn list_by_status(
        &self,
        tx: &mut TxContext,
        statuses: &[ProposalStatus],
    ) -> Result<Vec<Proposal>> {
        let selector =
            Selector::table(PROPOSAL_TABLE).any_of("status", statuses.iter().map(|s| s.as_str()));
        let rows = tx.get_query_result(&selector).await?;
        let (proposals, _) = decode_rows(rows);
        Ok(proposals)
    }

    async fn list_page(
        &self,
        tx: &mut TxContext,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Proposal>> {
        let selector = Selector::table(PROPOSAL_TABLE);
        let (rows, metadata) = tx
            .get_query_result_with_pagination(&selector, page_size, bookmark)
            .await?;
        Ok(decode_page(rows, metadata))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::Ledger;

    #[tokio::test]
    async fn test_insert_get_and_duplicate() {
        let ledger = Ledger::in_memory();
        let repo = LedgerProposalRepository;

        let mut tx = ledger.begin();
        let proposal = Proposal::new("p1", "payload", "admin-1", 2, tx.timestamp());
        repo.insert(&mut tx, &proposal).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        assert_eq!(repo.get(&mut tx, "p1").await.unwrap(), Some(proposal.clone()));
        assert_eq!(repo.get(&mut tx, "p2").await.unwrap(), None);
        let err = repo.insert(&mut tx, &proposal).await.unwrap_err();
        assert!(matches!(err, QuorateError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let ledger = Ledger::in_memory();
        let repo = LedgerProposalRepository;

        let mut tx = ledger.begin();
        let mut approved = Proposal::new("p1", "a", "admin", 1, 0);
        approved.status = ProposalStatus::Approved;
        let pending = Proposal::new("p2", "b", "admin", 1, 0);
        let mut committed = Proposal::new("p3", "c", "admin", 1, 0);
        committed.status = ProposalStatus::Committed;
        for p in [&approved, &pending, &committed] {
            repo.insert(&mut tx, p).await.unwrap();
        }
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        let open = repo
            .list_by_status(&mut tx, &[ProposalStatus::Pending, ProposalStatus::Approved])
            .await
            .unwrap();
        let ids: Vec<_> = open.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_list_page_skips_corrupt_rows() {
        let ledger = Ledger::in_memory();
        let repo = LedgerProposalRepository;

        let mut tx = ledger.begin();
        repo.insert(&mut tx, &Proposal::new("p1", "a", "admin", 1, 0))
            .await
            .unwrap();
        let corrupt_key = LedgerProposalRepository::key("p2").unwrap();
        tx.put_state(&corrupt_key, b"{\"id\":".to_vec()).unwrap();
        repo.insert(&mut tx, &Proposal::new("p3", "c", "admin", 1, 0))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        let page = repo.list_page(&mut tx, 10, "").await.unwrap();
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.skipped, 1);
        assert!(page.is_last());

        let err = repo.get(&mut tx, "p2").await.unwrap_err();
        assert!(matches!(err, QuorateError::Storage(_)));
    }
}
