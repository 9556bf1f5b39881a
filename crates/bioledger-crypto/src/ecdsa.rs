use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid public key bytes")]
    InvalidPublicKey,
    #[error("invalid secret key bytes")]
    InvalidSecretKey,
}

/// Sign `message` with a secp256k1 secret key (SEC1 scalar bytes).
pub fn sign(secret_key_bytes: &[u8], message: &[u8]) -> Result<Vec<u8>, SignatureError> {
    let signing_key =
        SigningKey::from_slice(secret_key_bytes).map_err(|_| SignatureError::InvalidSecretKey)?;
    let signature: Signature = signing_key.sign(message);
    Ok(signature.to_vec())
}

/// Verify a secp256k1 ECDSA signature. `public_key_bytes` is a SEC1-encoded
/// point (compressed or uncompressed).
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<(), SignatureError> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key_bytes)
        .map_err(|_| SignatureError::InvalidPublicKey)?;
    let signature =
        Signature::from_slice(signature_bytes).map_err(|_| SignatureError::InvalidSignature)?;
    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::InvalidSignature)
}
