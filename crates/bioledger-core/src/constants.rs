//! Reason-code vocabulary and verifier alias table (spec.md §6).
//!
//! Reason codes are exact uppercase strings; the evaluation harness and any
//! external verifier integration must use these constants rather than
//! re-typing the literals, so a typo fails to compile instead of silently
//! producing a code nobody matches.

pub const MATERIAL_REVOKED: &str = "MATERIAL_REVOKED";
pub const MATERIAL_QUARANTINED: &str = "MATERIAL_QUARANTINED";
pub const MISSING_IDENTITY: &str = "MISSING_IDENTITY";
pub const QC_MISSING: &str = "QC_MISSING";
pub const QC_EXPIRED: &str = "QC_EXPIRED";
pub const QC_ISSUER_REVOKED: &str = "QC_ISSUER_REVOKED";
pub const TRANSFER_PENDING: &str = "TRANSFER_PENDING";
pub const ARTIFACT_TAMPERED: &str = "ARTIFACT_TAMPERED";
pub const ARTIFACT_UNAVAILABLE: &str = "ARTIFACT_UNAVAILABLE";

/// All canonical reason codes, in the fixed evaluation order from spec.md
/// §4.4. Used to assert reason-set ordering in tests.
pub const REASON_CODES_IN_EVALUATION_ORDER: &[&str] = &[
    MATERIAL_REVOKED,
    MATERIAL_QUARANTINED,
    MISSING_IDENTITY,
    QC_MISSING,
    QC_ISSUER_REVOKED,
    QC_EXPIRED,
    TRANSFER_PENDING,
    ARTIFACT_TAMPERED,
    ARTIFACT_UNAVAILABLE,
];

/// Verifier-side aliases for interoperability (spec.md §6). Given an
/// external reason string, returns the canonical code it maps to, or the
/// string itself if no alias applies (exact-match fallback).
pub fn canonicalize_reason_code(code: &str) -> &str {
    match code {
        "CREDENTIAL_EXPIRED" => QC_EXPIRED,
        "HASH_MISMATCH" | "INTEGRITY_FAILED" => ARTIFACT_TAMPERED,
        "REVOKED" | "STATUS_REVOKED" => MATERIAL_REVOKED,
        "QUARANTINED" | "STATUS_QUARANTINED" => MATERIAL_QUARANTINED,
        other => other,
    }
}

/// Returns true if `produced` (a reason code actually emitted by
/// `verify_material`) matches `expected` (a ground-truth or external code),
/// either exactly or via the alias table.
pub fn reason_codes_match(produced: &str, expected: &str) -> bool {
    produced == expected
        || canonicalize_reason_code(produced) == canonicalize_reason_code(expected)
}
