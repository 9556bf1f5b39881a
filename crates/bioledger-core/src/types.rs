use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::MaterialType;

/// Unix timestamp (seconds, UTC). `0` denotes "no expiry" wherever the spec
/// treats it that way (e.g. `Credential::valid_until`).
pub type Timestamp = i64;

/// A 32-byte commitment/integrity digest (SHA-256 output).
pub type Digest = [u8; 32];

/// The current wall-clock time as a Unix timestamp. Every registry
/// operation takes `now` as an explicit argument rather than reading the
/// clock itself, so callers reach for this only at the boundary — entry
/// points and benchmarks that need a live reading rather than a fixed
/// instant under test.
pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

// ── Address ──────────────────────────────────────────────────────────────────

/// An opaque caller identity (owner, issuer, recipient, admin). Distributed
/// and compared as an opaque string — the registry never interprets its
/// internal structure. In production this is typically a hex encoding of an
/// ECDSA public key hash; tests use short human-readable strings freely.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ── MaterialId ───────────────────────────────────────────────────────────────

/// `bio:cell_line:<n>` or `bio:plasmid:<n>`, `n` a positive decimal integer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MaterialId(pub String);

impl MaterialId {
    pub fn mint(kind: MaterialType, n: u64) -> Self {
        Self(format!("bio:{}:{}", kind.as_path_segment(), n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MaterialId({})", self.0)
    }
}

// ── CredentialId ─────────────────────────────────────────────────────────────

/// `cred:<n>`, `n` a positive decimal integer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CredentialId(pub String);

impl CredentialId {
    pub fn mint(n: u64) -> Self {
        Self(format!("cred:{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialId({})", self.0)
    }
}

// ── TransferId ───────────────────────────────────────────────────────────────

/// `xfer:<n>`, `n` a positive decimal integer.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(pub String);

impl TransferId {
    pub fn mint(n: u64) -> Self {
        Self(format!("xfer:{}", n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferId({})", self.0)
    }
}

/// `(tx_id, block_height, logs)` — returned by every mutating registry
/// operation. `block_height` is the write-sequence number: there is no
/// block production here, only a totally ordered single-writer log (see
/// the concurrency model).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_id: String,
    pub block_height: u64,
    pub logs: Vec<String>,
}
