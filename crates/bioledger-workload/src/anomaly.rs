//! The six anomaly class names used for ground-truth labelling (spec.md
//! §4.8). Distinct from the verification reason-code vocabulary in
//! `bioledger-core::constants` — the evaluation harness is responsible for
//! mapping one onto the other when building confusion matrices.

pub const REVOKED: &str = "REVOKED";
pub const QUARANTINED: &str = "QUARANTINED";
pub const MISSING_QC: &str = "MISSING_QC";
pub const EXPIRED_QC: &str = "EXPIRED_QC";
pub const TAMPERED_ARTIFACT: &str = "TAMPERED_ARTIFACT";
pub const PENDING_TRANSFER: &str = "PENDING_TRANSFER";

pub const ALL: &[&str] = &[
    REVOKED,
    QUARANTINED,
    MISSING_QC,
    EXPIRED_QC,
    TAMPERED_ARTIFACT,
    PENDING_TRANSFER,
];

/// Maps an anomaly class to the canonical reason code a passing
/// `verify_material` call is expected to emit for it.
pub fn expected_reason_code(anomaly: &str) -> Option<&'static str> {
    use bioledger_core::constants::*;
    match anomaly {
        REVOKED => Some(MATERIAL_REVOKED),
        QUARANTINED => Some(MATERIAL_QUARANTINED),
        MISSING_QC => Some(QC_MISSING),
        EXPIRED_QC => Some(QC_EXPIRED),
        TAMPERED_ARTIFACT => Some(ARTIFACT_TAMPERED),
        PENDING_TRANSFER => Some(TRANSFER_PENDING),
        _ => None,
    }
}
