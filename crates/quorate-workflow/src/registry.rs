//! Identity administration

use std::sync::Arc;

use quorate_common::crypto::ecdsa::decode_public_key;
use quorate_common::{Identity, IdentityPatch, IdentityRole, QuorateError, Result};
use quorate_ledger::{IdentityRepository, Page, TxContext};
use tracing::{info, info_span, instrument, warn, Span};

fn ensure_key_decodes(public_key: &str) -> Result<()> {
    decode_public_key(public_key)
        .map(|_| ())
        .map_err(|e| QuorateError::invalid(format!("public key rejected: {e}")))
}

/// Registers approvers (super admins) and proposal creators (admins)
pub struct IdentityRegistry {
    identities: Arc<dyn IdentityRepository>,
    span: Span,
}

impl IdentityRegistry {
    pub fn new(identities: Arc<dyn IdentityRepository>, parent: &Span) -> Self {
        Self {
            identities,
            span: info_span!(parent: parent, "identity_registry"),
        }
    }

    #[instrument(parent = &self.span, skip(self, tx, public_key))]
    pub async fn register_super_admin(
        &self,
        tx: &mut TxContext,
        id: &str,
        public_key: &str,
    ) -> Result<Identity> {
        ensure_key_decodes(public_key)?;
        let identity = Identity::active(id, public_key);
        self.identities
            .insert(tx, IdentityRole::SuperAdmin, &identity)
            .await?;
        info!("Super admin registered");
        Ok(identity)
    }

    /// Admin ids are derived from the registering transaction
    #[instrument(parent = &self.span, skip_all)]
    pub async fn register_admin(&self, tx: &mut TxContext, public_key: &str) -> Result<Identity> {
        ensure_key_decodes(public_key)?;
        let identity = Identity::active(tx.new_document_id(), public_key);
        self.identities
            .insert(tx, IdentityRole::Admin, &identity)
            .await?;
        info!(admin_id = %identity.id, "Admin registered");
        Ok(identity)
    }

    pub async fn get(&self, tx: &mut TxContext, role: IdentityRole, id: &str) -> Result<Identity> {
        self.identities
            .get(tx, role, id)
            .await?
            .ok_or_else(|| QuorateError::not_found(role.entity(), id))
    }

    /// Resolve an approver and insist it is active
    pub async fn require_active(&self, tx: &mut TxContext, approver_id: &str) -> Result<Identity> {
        let identity = self.get(tx, IdentityRole::SuperAdmin, approver_id).await?;
        if !identity.status.is_active() {
            warn!(approver_id = %approver_id, "Inactive approver");
            return Err(QuorateError::IdentityInactive(approver_id.to_string()));
        }
        Ok(identity)
    }

    pub async fn list_page(
        &self,
        tx: &mut TxContext,
        role: IdentityRole,
        page_size: usize,
        bookmark: &str,
    ) -> Result<Page<Identity>> {
        self.identities.list_page(tx, role, page_size, bookmark).await
    }

    #[instrument(parent = &self.span, skip(self, tx, patch))]
    pub async fn update(
        &self,
        tx: &mut TxContext,
        role: IdentityRole,
        id: &str,
        patch: &IdentityPatch,
    ) -> Result<Identity> {
        if patch.is_empty() {
            return Err(QuorateError::invalid("identity patch is empty"));
        }
        if let Some(public_key) = &patch.public_key {
            ensure_key_decodes(public_key)?;
        }

        let mut identity = self.get(tx, role, id).await?;
        patch.apply(&mut identity);
        self.identities.update(tx, role, &identity).await?;
        info!(status = ?identity.status, "Identity updated");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorate_common::{ApproverKey, ErrorKind, IdentityStatus};
    use quorate_ledger::{Ledger, LedgerIdentityRepository};

    fn registry() -> IdentityRegistry {
        IdentityRegistry::new(Arc::new(LedgerIdentityRepository), &Span::none())
    }

    #[tokio::test]
    async fn test_register_and_deactivate() {
        let ledger = Ledger::in_memory();
        let registry = registry();
        let pem = ApproverKey::generate().public_key_pem().unwrap();

        let mut tx = ledger.begin();
        registry.register_super_admin(&mut tx, "sa1", &pem).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        assert!(registry.require_active(&mut tx, "sa1").await.is_ok());
        let patch = IdentityPatch {
            status: Some(IdentityStatus::Inactive),
            ..Default::default()
        };
        registry
            .update(&mut tx, IdentityRole::SuperAdmin, "sa1", &patch)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        let err = registry.require_active(&mut tx, "sa1").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IdentityInactive);
        let err = registry.require_active(&mut tx, "sa2").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_rejects_undecodable_keys() {
        let ledger = Ledger::in_memory();
        let registry = registry();
        let mut tx = ledger.begin();

        let err = registry
            .register_super_admin(&mut tx, "sa1", "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = registry.register_admin(&mut tx, "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(tx.pending_writes(), 0);
    }

    #[tokio::test]
    async fn test_admin_ids_are_generated() {
        let ledger = Ledger::in_memory();
        let registry = registry();
        let pem = ApproverKey::generate().public_key_pem().unwrap();

        let mut tx = ledger.begin();
        let first = registry.register_admin(&mut tx, &pem).await.unwrap();
        let second = registry.register_admin(&mut tx, &pem).await.unwrap();
        assert_ne!(first.id, second.id);
        tx.commit().await.unwrap();

        let mut tx = ledger.begin();
        let page = registry
            .list_page(&mut tx, IdentityRole::Admin, 10, "")
            .await
            .unwrap();
        assert_eq!(page.records.len(), 2);
    }
}
