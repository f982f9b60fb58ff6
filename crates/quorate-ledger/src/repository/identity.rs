//! Identity tables, one per role

use async_trait::async_trait;
use quorate_common::{Identity, IdentityRole, QuorateError, Result};

use super::{decode, decode_page, encode, require_id};
use crate::key::create_composite_key;
use crate::query::{Page, Selector};
use crate::tx::TxContext;

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn get(&self, tx: &mut TxContext, role: IdentityRole, id: &str)
        -> Result<Option<Identity>>;

    /// Fails if the id is already registered for `role`
    async fn insert(&self, tx: &mut TxContext, role: IdentityRole, identity: &Identity)
        -> Result<()>;

    async fn update(&self, tx: &mut TxContext, role: IdentityRole, identity: &Identity)
        -> Result<()>;

    async fn list_page(
        &self,
        tx: &mut TxContext,
        role: IdentityRole,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Identity>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerIdentityRepository;

impl LedgerIdentityRepository {
    pub fn key(role: IdentityRole, id: &str) -> Result<String> {
        require_id("identity id", id)?;
        create_composite_key(role.table(), &[id])
    }
}

#[async_trait]
impl IdentityRepository for LedgerIdentityRepository {
    async fn get(
        &self,
        tx: &mut TxContext,
        role: IdentityRole,
        id: &str,
    ) -> Result<Option<Identity>> {
        let key = Self::key(role, id)?;
        match tx.get_state(&key).await? {
            Some(bytes) => Ok(Some(decode(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    async fn insert(
        &self,
        tx: &mut TxContext,
        role: IdentityRole,
        identity: &Identity,
    ) -> Result<()> {
        let key = Self::key(role, &identity.id)?;
        if tx.get_state(&key).await?.is_some() {
            return Err(QuorateError::invalid(format!(
                "{} {} already exists",
                role.table(),
                identity.id
            )));
        }
        tx.put_state(&key, encode(identity)?)
    }

    async fn update(
        &self,
        tx: &mut TxContext,
        role: IdentityRole,
        identity: &Identity,
    ) -> Result<()> {
        let key = Self::key(role, &identity.id)?;
        tx.put_state(&key, encode(identity)?)
    }

    async fn list_page(
        &self,
        tx: &mut TxContext,
        role: IdentityRole,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Identity>> {
        let selector = Selector::table(role.table());
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
    async fn test_roles_are_separate_tables() {
        let ledger = Ledger::in_memory();
        let repo = LedgerIdentityRepository;

        let mut tx = ledger.begin();
        repo.insert(&mut tx, IdentityRole::SuperAdmin, &Identity::active("id1", "pem-a"))
            .await
            .unwrap();
        repo.insert(&mut tx, IdentityRole::Admin, &Identity::active("id1", "pem-b"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        let sa = repo
            .get(&mut tx, IdentityRole::SuperAdmin, "id1")
            .await
            .unwrap()
            .unwrap();
        let admin = repo
            .get(&mut tx, IdentityRole::Admin, "id1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sa.public_key, "pem-a");
        assert_eq!(admin.public_key, "pem-b");

        let page = repo
            .list_page(&mut tx, IdentityRole::SuperAdmin, 10, "")
            .await
            .unwrap();
        assert_eq!(page.records.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_identity_rejected() {
        let ledger = Ledger::in_memory();
        let repo = LedgerIdentityRepository;

        let mut tx = ledger.begin();
        repo.insert(&mut tx, IdentityRole::SuperAdmin, &Identity::active("sa1", "pem"))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        let err = repo
            .insert(&mut tx, IdentityRole::SuperAdmin, &Identity::active("sa1", "pem"))
            .await
            .unwrap_err();
        assert!(matches!(err, QuorateError::InvalidInput(_)));
    }
}
