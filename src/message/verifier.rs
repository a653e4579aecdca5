//! A reference `ChainVerifier`: ed25519 signature checking over the
//! whitelisted message projection.
//!
//! Grounded on `crypto::signatures::SignatureData::verify` (same
//! hex-decode-then-`VerifyingKey`/`Signature`-from-bytes shape). Chain-
//! specific verifiers are an external collaborator per §1/§6; this one
//! exists so the crate is runnable end-to-end without a real chain client,
//! not as the production verifier for any particular chain.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use super::{ChainVerifier, Message};
use crate::error::VerifierError;

/// Verifies `message.signature` (hex) against `message.sender` (hex-encoded
/// ed25519 public key) over the canonical JSON encoding of the message
/// itself with `signature` cleared — the whitelisted projection signers
/// must sign over, per §6.
#[derive(Debug, Default)]
pub struct Ed25519ChainVerifier;

impl Ed25519ChainVerifier {
    fn signing_bytes(message: &Message) -> Result<Vec<u8>, VerifierError> {
        let mut unsigned = message.clone();
        unsigned.signature = String::new();
        serde_json::to_vec(&unsigned).map_err(|e| VerifierError::InvalidArgument(e.to_string()))
    }
}

#[async_trait::async_trait]
impl ChainVerifier for Ed25519ChainVerifier {
    async fn verify(&self, message: &Message) -> Result<bool, VerifierError> {
        let public_key_bytes: [u8; 32] = hex::decode(&message.sender)
            .map_err(|e| VerifierError::InvalidArgument(e.to_string()))?
            .try_into()
            .map_err(|_| VerifierError::InvalidArgument("public key must be 32 bytes".to_string()))?;

        let signature_bytes: [u8; 64] = hex::decode(&message.signature)
            .map_err(|e| VerifierError::InvalidArgument(e.to_string()))?
            .try_into()
            .map_err(|_| VerifierError::InvalidArgument("signature must be 64 bytes".to_string()))?;

        let public_key =
            VerifyingKey::from_bytes(&public_key_bytes).map_err(|e| VerifierError::InvalidArgument(e.to_string()))?;
        let signature = Signature::from_bytes(&signature_bytes);

        let signing_bytes = Self::signing_bytes(message)?;

        Ok(public_key.verify(&signing_bytes, &signature).is_ok())
    }
}
