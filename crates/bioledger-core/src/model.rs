use serde::{Deserialize, Serialize};

use crate::types::{Address, CredentialId, Digest, MaterialId, Timestamp, TransferId};

// ── MaterialType / MaterialStatus ───────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialType {
    CellLine,
    Plasmid,
}

impl MaterialType {
    /// Path segment used when minting a `MaterialId` (`bio:<segment>:<n>`).
    pub fn as_path_segment(self) -> &'static str {
        match self {
            MaterialType::CellLine => "cell_line",
            MaterialType::Plasmid => "plasmid",
        }
    }

    /// Parses the conceptual wire form (`"CELL_LINE"` / `"PLASMID"`).
    /// Callers that already hold a `MaterialType` never need this — it
    /// exists for boundary code that accepts raw strings (e.g. the workload
    /// generator's dataset presets).
    pub fn parse(s: &str) -> Result<Self, crate::error::BioLedgerError> {
        match s {
            "CELL_LINE" => Ok(MaterialType::CellLine),
            "PLASMID" => Ok(MaterialType::Plasmid),
            _ => Err(crate::error::BioLedgerError::InvalidMaterialType),
        }
    }
}

/// Material lifecycle status. `Revoked` is terminal — no operation takes a
/// material out of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialStatus {
    Active,
    Quarantined,
    Revoked,
}

// ── Material ─────────────────────────────────────────────────────────────────

/// A tracked biological specimen (cell line or plasmid).
///
/// Created once by `register_material`; mutated only by status transitions
/// and accepted transfers. Never destroyed — `Revoked` is a terminal status,
/// not a deletion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Material {
    pub material_id: MaterialId,
    pub material_type: MaterialType,
    /// Non-zero 32-byte commitment to the material's off-chain metadata.
    pub metadata_hash: Digest,
    pub owner_address: Address,
    pub owner_org: String,
    pub status: MaterialStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Transfer IDs on this material, in creation order. At most one of
    /// these may be unaccepted at any time (invariant enforced by the
    /// registry, not by this struct).
    #[serde(default)]
    pub transfers: Vec<TransferId>,
    #[serde(default)]
    pub credentials: Vec<CredentialId>,
}

// ── CredentialType ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialType {
    Identity,
    QcMyco,
    UsageRights,
}

// ── Credential ───────────────────────────────────────────────────────────────

/// An attested statement about a material. Append-only: `revoked` may
/// transition false→true exactly once, nothing else about a credential
/// changes after issuance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Credential {
    pub credential_id: CredentialId,
    pub material_id: MaterialId,
    pub credential_type: CredentialType,
    /// SHA-256 over the canonical-JSON serialization of the credential
    /// payload (see `bioledger-crypto::canonical`).
    pub commitment_hash: Digest,
    pub issuer_address: Address,
    pub issuer_org: String,
    pub issued_at: Timestamp,
    /// `0` = no expiry; otherwise strictly greater than `issued_at`.
    pub valid_until: Timestamp,
    pub artifact_cid: String,
    pub artifact_hash: Digest,
    pub revoked: bool,
}

// ── Transfer ─────────────────────────────────────────────────────────────────

/// A custody handoff between organizations. Append-only; `accepted` may
/// transition false→true exactly once.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transfer {
    pub transfer_id: TransferId,
    pub material_id: MaterialId,
    pub from_address: Address,
    pub from_org: String,
    pub to_address: Address,
    pub to_org: String,
    pub shipment_hash: Digest,
    pub timestamp: Timestamp,
    pub accepted: bool,
}

// ── IssuerPermission ─────────────────────────────────────────────────────────

/// Capability record keyed by issuer identity. `revoked_at = 0` means "not
/// revoked"; credentials issued strictly before `revoked_at` remain valid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IssuerPermission {
    pub issuer_address: Address,
    pub is_approved: bool,
    pub can_issue_identity: bool,
    pub can_issue_qc: bool,
    pub can_issue_usage_rights: bool,
    #[serde(default)]
    pub revoked_at: Timestamp,
}

impl IssuerPermission {
    pub fn new(issuer_address: Address) -> Self {
        Self {
            issuer_address,
            is_approved: false,
            can_issue_identity: false,
            can_issue_qc: false,
            can_issue_usage_rights: false,
            revoked_at: 0,
        }
    }

    pub fn can_issue(&self, credential_type: CredentialType) -> bool {
        match credential_type {
            CredentialType::Identity => self.can_issue_identity,
            CredentialType::QcMyco => self.can_issue_qc,
            CredentialType::UsageRights => self.can_issue_usage_rights,
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked_at != 0
    }
}

// ── History events ───────────────────────────────────────────────────────────

/// Tags the kind of state-changing operation a history digest commits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventTag {
    MaterialRegistered,
    CredentialIssued,
    CredentialRevoked,
    StatusChangedByOwner,
    StatusChangedByAuthority,
    TransferInitiated,
    TransferAccepted,
    IssuerAuthorized,
    IssuerRevoked,
}

/// The pre-hash payload for one history entry: `(event_tag, actor,
/// salient_fields, timestamp)` from spec.md §3. Hashed via
/// `bioledger-crypto::canonical::hash` to produce the 32-byte digest that is
/// actually appended to a material's history — the digest, not this struct,
/// is what's persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEvent {
    pub event_tag: EventTag,
    pub actor: Address,
    pub salient_fields: serde_json::Value,
    pub timestamp: Timestamp,
}
