//! Approval signature gate

use std::sync::Arc;

use quorate_common::{verify_signature, IdentityRole, Result, VerifyError};
use quorate_ledger::{IdentityRepository, TxContext};
use tracing::{debug, info_span, instrument, warn, Span};

/// Checks that an approval was signed by the approver it names
///
/// Only reads: the approver's public key is resolved from the identity
/// table and nothing is written.
pub struct SignatureVerifier {
    identities: Arc<dyn IdentityRepository>,
    span: Span,
}

impl SignatureVerifier {
    pub fn new(identities: Arc<dyn IdentityRepository>, parent: &Span) -> Self {
        Self {
            identities,
            span: info_span!(parent: parent, "signature_verifier"),
        }
    }

    #[instrument(parent = &self.span, skip_all, fields(approver_id = %approver_id))]
    pub async fn verify(
        &self,
        tx: &mut TxContext,
        approver_id: &str,
        signature_b64: &str,
        message_b64: &str,
    ) -> Result<()> {
        if approver_id.trim().is_empty() {
            return Err(VerifyError::InvalidInput("approver id is empty".into()).into());
        }

        let identity = self
            .identities
            .get(tx, IdentityRole::SuperAdmin, approver_id)
            .await?
            .ok_or_else(|| VerifyError::IdentityNotFound(approver_id.to_string()))?;

        match verify_signature(&identity.public_key, signature_b64, message_b64) {
            Ok(()) => {
                debug!("Signature verified");
                Ok(())
            }
            Err(err) => {
                warn!(reason = %err, "Signature rejected");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorate_common::{ApproverKey, ErrorKind, Identity};
    use quorate_ledger::{Ledger, LedgerIdentityRepository};

    async fn setup(key: &ApproverKey) -> (Ledger, SignatureVerifier) {
        let ledger = Ledger::in_memory();
        let repo = Arc::new(LedgerIdentityRepository);
        let mut tx = ledger.begin();
        repo.insert(
            &mut tx,
            IdentityRole::SuperAdmin,
            &Identity::active("sa1", key.public_key_pem().unwrap()),
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        (ledger, SignatureVerifier::new(repo, &Span::none()))
    }

    #[tokio::test]
    async fn test_verify_registered_approver() {
        let key = ApproverKey::generate();
        let (ledger, verifier) = setup(&key).await;
        let signed = key.sign(b"proposal p1");

        let mut tx = ledger.begin();
        verifier
            .verify(&mut tx, "sa1", &signed.signature, &signed.message)
            .await
            .unwrap();
        assert_eq!(tx.pending_writes(), 0);
    }

    #[tokio::test]
    async fn test_failure_reasons() {
        let key = ApproverKey::generate();
        let (ledger, verifier) = setup(&key).await;
        let signed = key.sign(b"proposal p1");
        let forged = ApproverKey::generate().sign(b"proposal p1");
        let mut tx = ledger.begin();

        let err = verifier
            .verify(&mut tx, "", &signed.signature, &signed.message)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = verifier
            .verify(&mut tx, "sa-unknown", &signed.signature, &signed.message)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = verifier
            .verify(&mut tx, "sa1", &forged.signature, &forged.message)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SignatureInvalid);

        let err = verifier
            .verify(&mut tx, "sa1", "!!", &signed.message)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
