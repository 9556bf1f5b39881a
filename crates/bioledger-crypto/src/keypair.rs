use bioledger_core::types::Address;
use k256::ecdsa::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::canonical::sha256;
use crate::ecdsa::{self, SignatureError};

/// An issuer keypair: secp256k1 signing + verifying keys, with an `Address`
/// derived from the public key. The secret scalar is held in a
/// `Zeroizing<[u8; 32]>` so it is wiped on drop.
pub struct KeyPair {
    pub address: Address,
    pub verifying_key: VerifyingKey,
    secret_bytes: Zeroizing<[u8; 32]>,
}

impl KeyPair {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        Self::from_signing_key(signing_key)
    }

    /// Restore a keypair from a raw 32-byte secret scalar.
    pub fn from_secret_bytes(secret_bytes: [u8; 32]) -> Result<Self, SignatureError> {
        let signing_key =
            SigningKey::from_bytes((&secret_bytes).into()).map_err(|_| SignatureError::InvalidSecretKey)?;
        Ok(Self::from_signing_key(signing_key))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = address_from_public_key(&verifying_key.to_sec1_bytes());
        Self {
            address,
            verifying_key,
            secret_bytes: Zeroizing::new(signing_key.to_bytes().into()),
        }
    }

    /// Sign `message` with this keypair's secret key.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        ecdsa::sign(&*self.secret_bytes, message).expect("sign with valid secret key is infallible")
    }

    pub fn public_key_sec1_bytes(&self) -> Vec<u8> {
        self.verifying_key.to_sec1_bytes().to_vec()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ address: {:?} }}", self.address)
    }
}

/// Derive an `Address` from a SEC1-encoded public key as a hex-encoded
/// SHA-256 digest (mirrors how account identifiers are derived from public
/// keys elsewhere in this workspace's lineage, swapped to SHA-256 to match
/// the commitment hash function used throughout).
pub fn address_from_public_key(public_key_sec1_bytes: &[u8]) -> Address {
    Address::new(hex::encode(sha256(public_key_sec1_bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_and_sign() {
        let kp = KeyPair::generate();
        let sig = kp.sign(b"payload");
        assert!(ecdsa::verify_signature(&kp.public_key_sec1_bytes(), b"payload", &sig).is_ok());
    }

    #[test]
    fn address_is_deterministic_for_same_key() {
        let kp = KeyPair::generate();
        let addr_again = address_from_public_key(&kp.public_key_sec1_bytes());
        assert_eq!(kp.address, addr_again);
    }
}
