use thiserror::Error;

#[derive(Debug, Error)]
pub enum BioLedgerError {
    // ── Authorization ─────────────────────────────────────────────────────────
    #[error("caller is not an approved issuer")]
    NotApprovedIssuer,

    #[error("issuer has been revoked")]
    IssuerRevoked,

    #[error("issuer not authorized for this credential type")]
    NotAuthorizedForCredentialType,

    #[error("caller is not authorized to set this status")]
    NotAuthorizedForStatus,

    #[error("caller is not the admin")]
    NotAdmin,

    #[error("caller does not own this material")]
    NotOwner,

    #[error("caller is not the recipient of the pending transfer")]
    NotTransferRecipient,

    // ── Invalid input ─────────────────────────────────────────────────────────
    #[error("invalid material type")]
    InvalidMaterialType,

    #[error("metadata hash must be non-zero")]
    InvalidCommitmentHash,

    #[error("artifact hash must be non-zero")]
    InvalidArtifactHash,

    #[error("valid_until must be zero (no expiry) or strictly after issued_at")]
    InvalidValidUntil,

    #[error("shipment hash must be non-zero")]
    InvalidShipmentHash,

    #[error("reason hash must be non-zero")]
    InvalidReasonHash,

    #[error("requested status transition is not permitted")]
    InvalidStatusTransition,

    #[error("material must be ACTIVE for this operation")]
    MaterialNotActive,

    #[error("only the original issuer or admin may revoke this credential")]
    NotAuthorizedToRevoke,

    // ── Not found ─────────────────────────────────────────────────────────────
    #[error("material not found: {0}")]
    MaterialNotFound(String),

    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("transfer not found: {0}")]
    TransferNotFound(String),

    // ── State conflict ────────────────────────────────────────────────────────
    #[error("credential already revoked: {0}")]
    CredentialAlreadyRevoked(String),

    #[error("a transfer on this material is already pending")]
    PendingTransferExists,

    #[error("no pending transfer on this material")]
    NoPendingTransfer,

    #[error("material is in a terminal REVOKED state")]
    MaterialRevokedTerminal,

    // ── Integrity ─────────────────────────────────────────────────────────────
    #[error("artifact hash mismatch for credential {0}")]
    ArtifactTampered(String),

    #[error("artifact unavailable for credential {0}")]
    ArtifactUnavailable(String),

    // ── Transport ─────────────────────────────────────────────────────────────
    #[error("receipt for tx {0} is missing a finality marker")]
    ReceiptMissingFinality(String),

    // ── Serialization / storage ───────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("value is not representable in the canonical JSON subset")]
    NonSerializable,

    // ── General ───────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Lets `BioLedgerError` serve as the `Error` type of a hand-rolled
/// `serde::Serializer` (see `bioledger_crypto::canonical::finite_check`).
/// Custom errors raised mid-serialization collapse to `NonSerializable`,
/// since a serializer failing partway through is, by construction, looking
/// at a value outside the canonical subset.
impl serde::ser::Error for BioLedgerError {
    fn custom<T: std::fmt::Display>(_msg: T) -> Self {
        BioLedgerError::NonSerializable
    }
}
