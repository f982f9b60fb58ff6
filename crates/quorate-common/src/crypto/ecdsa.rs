//! ECDSA P-256 signature verification
//!
//! Approvals carry a base64 ASN.1 DER signature over base64-encoded message
//! bytes. The message is hashed with SHA-256 and the signature is checked
//! against the approver's PEM (SubjectPublicKeyInfo) public key.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Why a signature could not be accepted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no identity registered for approver {0}")]
    IdentityNotFound(String),

    #[error("public key could not be decoded: {0}")]
    KeyDecode(String),

    #[error("base64 decoding failed: {0}")]
    Encoding(String),

    #[error("signature does not verify: {0}")]
    SignatureInvalid(String),
}

/// Parse a PEM SubjectPublicKeyInfo P-256 key
pub fn decode_public_key(public_key_pem: &str) -> Result<VerifyingKey, VerifyError> {
    VerifyingKey::from_public_key_pem(public_key_pem.trim())
        .map_err(|e| VerifyError::KeyDecode(e.to_string()))
}

/// Verify `signature_b64` over the bytes encoded in `message_b64`
pub fn verify_signature(
    public_key_pem: &str,
    signature_b64: &str,
    message_b64: &str,
) -> Result<(), VerifyError> {
    if signature_b64.is_empty() {
        return Err(VerifyError::InvalidInput("signature is empty".into()));
    }

    let key = decode_public_key(public_key_pem)?;

    let signature_der = STANDARD
        .decode(signature_b64)
        .map_err(|e| VerifyError::Encoding(format!("signature: {e}")))?;
    let message = STANDARD
        .decode(message_b64)
        .map_err(|e| VerifyError::Encoding(format!("message: {e}")))?;

    let signature = Signature::from_der(&signature_der)
        .map_err(|e| VerifyError::SignatureInvalid(format!("malformed DER: {e}")))?;
    // High-S signatures are valid ECDSA; verify their low-S twin
    let signature = signature.normalize_s().unwrap_or(signature);

    let digest = Sha256::digest(&message);
    key.verify_prehash(&digest, &signature)
        .map_err(|_| VerifyError::SignatureInvalid("digest mismatch".into()))
}

/// Signed payload ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedMessage {
    pub signature: String,
    pub message: String,
}

/// Client-side P-256 key for producing approvals
pub struct ApproverKey {
    signing_key: SigningKey,
}

impl ApproverKey {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn public_key_pem(&self) -> p256::pkcs8::spki::Result<String> {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
    }

    /// SHA-256 + ECDSA over `message`, both returned base64-encoded
    pub fn sign(&self, message: &[u8]) -> SignedMessage {
        let signature: Signature = self.signing_key.sign(message);
        SignedMessage {
            signature: STANDARD.encode(signature.to_der().as_bytes()),
            message: STANDARD.encode(message),
        }
    }
}

impl std::fmt::Debug for ApproverKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApproverKey").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flip_bit(b64: &str, byte: usize, bit: u8) -> String {
        let mut raw = STANDARD.decode(b64).unwrap();
        let idx = byte % raw.len();
        raw[idx] ^= 1 << bit;
        STANDARD.encode(raw)
    }

    #[test]
    fn test_valid_signature_verifies() {
        let key = ApproverKey::generate();
        let pem = key.public_key_pem().unwrap();
        let signed = key.sign(b"approve proposal 7");

        assert!(verify_signature(&pem, &signed.signature, &signed.message).is_ok());
    }

    #[test]
    fn test_wrong_key_fails() {
        let signer = ApproverKey::generate();
        let other = ApproverKey::generate();
        let signed = signer.sign(b"payload");

        let err = verify_signature(
            &other.public_key_pem().unwrap(),
            &signed.signature,
            &signed.message,
        )
        .unwrap_err();
        assert!(matches!(err, VerifyError::SignatureInvalid(_)));
    }

    #[test]
    fn test_message_bit_flip_fails() {
        let key = ApproverKey::generate();
        let pem = key.public_key_pem().unwrap();
        let signed = key.sign(b"transfer 100 units to treasury");

        for byte in [0usize, 5, 17] {
            for bit in [0u8, 3, 7] {
                let tampered = flip_bit(&signed.message, byte, bit);
                let err = verify_signature(&pem, &signed.signature, &tampered).unwrap_err();
                assert!(matches!(err, VerifyError::SignatureInvalid(_)));
            }
        }
    }

    #[test]
    fn test_signature_bit_flip_fails() {
        let key = ApproverKey::generate();
        let pem = key.public_key_pem().unwrap();
        let signed = key.sign(b"payload");
        let len = STANDARD.decode(&signed.signature).unwrap().len();

        for byte in 0..len {
            let tampered = flip_bit(&signed.signature, byte, (byte % 8) as u8);
            let err = verify_signature(&pem, &tampered, &signed.message).unwrap_err();
            assert!(matches!(err, VerifyError::SignatureInvalid(_)));
        }
    }

    #[test]
    fn test_bad_encodings() {
        let key = ApproverKey::generate();
        let pem = key.public_key_pem().unwrap();
        let signed = key.sign(b"payload");

        let err = verify_signature(&pem, "%%%not-base64", &signed.message).unwrap_err();
        assert!(matches!(err, VerifyError::Encoding(_)));

        let err = verify_signature(&pem, &signed.signature, "***").unwrap_err();
        assert!(matches!(err, VerifyError::Encoding(_)));

        let err = verify_signature(&pem, "", &signed.message).unwrap_err();
        assert!(matches!(err, VerifyError::InvalidInput(_)));
    }

    #[test]
    fn test_bad_key() {
        let key = ApproverKey::generate();
        let signed = key.sign(b"payload");

        let err = verify_signature("not a pem", &signed.signature, &signed.message).unwrap_err();
        assert!(matches!(err, VerifyError::KeyDecode(_)));
        assert!(decode_public_key(&key.public_key_pem().unwrap()).is_ok());
    }
}
