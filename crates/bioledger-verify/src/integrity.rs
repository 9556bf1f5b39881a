//! Artifact integrity checker (C5).
//!
//! The registry never sees artifact bytes, only a `(cid, hash)` reference.
//! `ObjectStore` models the external blob store those bytes live in; this
//! crate ships only a test double and the checking logic, never a
//! production client (out of scope, per spec.md §1).

use subtle::ConstantTimeEq;

use bioledger_core::model::Credential;
use bioledger_crypto::canonical::sha256;

/// A store that can fetch bytes by content-addressed key. Implementations
/// that go over the network should translate timeouts into `NotFound` —
/// the fail-closed policy treats any non-delivery as `Unavailable`, never
/// as `Valid`.
pub trait ObjectStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, NotFound>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityOutcome {
    Valid,
    Tampered,
    Unavailable,
}

pub fn check_credential<S: ObjectStore>(store: &S, credential: &Credential) -> IntegrityOutcome {
    match store.fetch(&credential.artifact_cid) {
        Err(NotFound) => IntegrityOutcome::Unavailable,
        Ok(bytes) => {
            let actual = sha256(&bytes);
            if actual.ct_eq(&credential.artifact_hash).into() {
                IntegrityOutcome::Valid
            } else {
                IntegrityOutcome::Tampered
            }
        }
    }
}

/// In-memory object store test double, keyed by CID. Not exported for
/// production use — `bioledger-verify`'s only concrete `ObjectStore` is
/// this one, deliberately.
#[derive(Default)]
pub struct InMemoryObjectStore {
    entries: std::collections::HashMap<String, Vec<u8>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, cid: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(cid.into(), bytes);
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn fetch(&self, key: &str) -> Result<Vec<u8>, NotFound> {
        self.entries.get(key).cloned().ok_or(NotFound)
    }
}
