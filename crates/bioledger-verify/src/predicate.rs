//! Verification predicate (C4).
//!
//! `verify_material`/`verify_material_at` never fail on domain outcomes —
//! every rejection is encoded as a reason code in an `Ok` result. Only a
//! registry storage error or an unknown material escalates as `Err`.

use bioledger_core::constants::{
    ARTIFACT_TAMPERED, ARTIFACT_UNAVAILABLE, MATERIAL_QUARANTINED, MATERIAL_REVOKED,
    MISSING_IDENTITY, QC_EXPIRED, QC_ISSUER_REVOKED, QC_MISSING, TRANSFER_PENDING,
};
use bioledger_core::error::BioLedgerError;
use bioledger_core::model::{CredentialType, MaterialStatus};
use bioledger_core::types::{MaterialId, Timestamp};
use bioledger_registry::Registry;

use crate::integrity::{check_credential, IntegrityOutcome, ObjectStore};

/// `(pass, reasons)`. `reasons` is an ordered, deduplicated set in the fixed
/// evaluation order from spec.md §4.4 — never re-sorted, never shuffled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub pass: bool,
    pub reasons: Vec<String>,
}

impl VerificationResult {
    fn from_reasons(reasons: Vec<String>) -> Self {
        Self {
            pass: reasons.is_empty(),
            reasons,
        }
    }
}

/// On-chain-only verification, evaluated at the current wall-clock time.
pub fn verify_material(registry: &Registry, material_id: &MaterialId, now: Timestamp) -> Result<VerificationResult, BioLedgerError> {
    verify_material_at(registry, material_id, now)
}

/// On-chain-only verification evaluated at an arbitrary `at_time` — lets
/// callers ask "would this have passed at time T" against the current
/// committed snapshot.
pub fn verify_material_at(
    registry: &Registry,
    material_id: &MaterialId,
    at_time: Timestamp,
) -> Result<VerificationResult, BioLedgerError> {
    let material = registry
        .get_material(material_id)?
        .ok_or_else(|| BioLedgerError::MaterialNotFound(material_id.to_string()))?;
    let credentials = registry.get_credentials(material_id)?;
    let transfers = registry.get_transfers(material_id)?;

    let mut reasons = Vec::new();

    // 1. Status check.
    match material.status {
        MaterialStatus::Revoked => reasons.push(MATERIAL_REVOKED.to_string()),
        MaterialStatus::Quarantined => reasons.push(MATERIAL_QUARANTINED.to_string()),
        MaterialStatus::Active => {}
    }

    // 2. Identity check: at least one non-revoked IDENTITY credential whose
    // issuer was not yet revoked as of issuance.
    let mut issuer_revoked_at_cache = std::collections::HashMap::new();
    let mut issuer_revoked_at = |issuer: &bioledger_core::types::Address| -> Result<Timestamp, BioLedgerError> {
        if let Some(v) = issuer_revoked_at_cache.get(issuer) {
            return Ok(*v);
        }
        let v = registry
            .get_issuer_permission(issuer)?
            .map(|p| p.revoked_at)
            .unwrap_or(0);
        issuer_revoked_at_cache.insert(issuer.clone(), v);
        Ok(v)
    };

    let has_valid_identity = {
        let mut found = false;
        for c in credentials.iter().filter(|c| c.credential_type == CredentialType::Identity && !c.revoked) {
            let revoked_at = issuer_revoked_at(&c.issuer_address)?;
            let issuer_revoked_before_or_at_issuance = revoked_at != 0 && c.issued_at >= revoked_at;
            if !issuer_revoked_before_or_at_issuance {
                found = true;
                break;
            }
        }
        found
    };
    if !has_valid_identity {
        reasons.push(MISSING_IDENTITY.to_string());
    }

    // 3. Latest-QC check: among non-revoked QC_MYCO credentials, the one
    // with the maximum issued_at. Anti-replay — an older unexpired QC can
    // never stand in for an expired newer one.
    let latest_qc = credentials
        .iter()
        .filter(|c| c.credential_type == CredentialType::QcMyco && !c.revoked)
        .max_by_key(|c| c.issued_at);
    match latest_qc {
        None => reasons.push(QC_MISSING.to_string()),
        Some(qc) => {
            let revoked_at = issuer_revoked_at(&qc.issuer_address)?;
            if revoked_at != 0 && revoked_at <= qc.issued_at {
                reasons.push(QC_ISSUER_REVOKED.to_string());
            } else if qc.valid_until != 0 && qc.valid_until < at_time {
                reasons.push(QC_EXPIRED.to_string());
            }
        }
    }

    // 4. Transfer continuity.
    if transfers.iter().any(|t| !t.accepted) {
        reasons.push(TRANSFER_PENDING.to_string());
    }

    Ok(VerificationResult::from_reasons(reasons))
}

/// Full verification: on-chain result extended with C5 artifact checks over
/// every non-revoked credential carrying an artifact reference. Fail-closed:
/// an unretrievable artifact counts as a failure, never as `Valid`.
pub fn verify_material_full<S: ObjectStore>(
    registry: &Registry,
    store: &S,
    material_id: &MaterialId,
    at_time: Timestamp,
) -> Result<VerificationResult, BioLedgerError> {
    let on_chain = verify_material_at(registry, material_id, at_time)?;
    let credentials = registry.get_credentials(material_id)?;

    let mut reasons = on_chain.reasons;
    let mut tampered = false;
    let mut unavailable = false;
    for c in credentials.iter().filter(|c| !c.revoked) {
        match check_credential(store, c) {
            IntegrityOutcome::Valid => {}
            IntegrityOutcome::Tampered => tampered = true,
            IntegrityOutcome::Unavailable => unavailable = true,
        }
    }
    if tampered && !reasons.iter().any(|r| r == ARTIFACT_TAMPERED) {
        reasons.push(ARTIFACT_TAMPERED.to_string());
    }
    if unavailable && !reasons.iter().any(|r| r == ARTIFACT_UNAVAILABLE) {
        reasons.push(ARTIFACT_UNAVAILABLE.to_string());
    }

    Ok(VerificationResult::from_reasons(reasons))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioledger_core::model::MaterialType;
    use bioledger_core::types::Address;
    use bioledger_registry::StateDb;

    fn temp_registry() -> (Registry, Address) {
        let db = StateDb::open_temp().expect("open temp db");
        let admin = Address::new("admin");
        (Registry::new(db, admin.clone()), admin)
    }

    fn hash(tag: u8) -> [u8; 32] {
        let mut h = [0u8; 32];
        h[0] = tag;
        h
    }

    #[test]
    fn fresh_material_fails_missing_identity_and_qc() {
        let (reg, _admin) = temp_registry();
        let owner = Address::new("owner");
        let (material_id, _) = reg
            .register_material(&owner, MaterialType::CellLine, hash(1), "LabA".into(), 1_000)
            .unwrap();
        let result = verify_material(&reg, &material_id, 1_000).unwrap();
        assert!(!result.pass);
        assert_eq!(result.reasons, vec![MISSING_IDENTITY.to_string(), QC_MISSING.to_string()]);
    }

    #[test]
    fn fully_credentialed_material_passes() {
        let (reg, admin) = temp_registry();
        let owner = Address::new("owner");
        let (material_id, _) = reg
            .register_material(&owner, MaterialType::CellLine, hash(1), "LabA".into(), 1_000)
            .unwrap();
        let issuer = Address::new("issuer");
        reg.authorize_issuer(&admin, &issuer, true, true, false).unwrap();
        reg.issue_credential(
            &issuer,
            &material_id,
            CredentialType::Identity,
            hash(2),
            0,
            "cid1".into(),
            hash(3),
            "IssuerOrg".into(),
            1_000,
        )
        .unwrap();
        reg.issue_credential(
            &issuer,
            &material_id,
            CredentialType::QcMyco,
            hash(4),
            2_000_000,
            "cid2".into(),
            hash(5),
            "IssuerOrg".into(),
            1_000,
        )
        .unwrap();

        let result = verify_material(&reg, &material_id, 1_500).unwrap();
        assert!(result.pass);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn latest_qc_replay_is_rejected() {
        let (reg, admin) = temp_registry();
        let owner = Address::new("owner");
        let (material_id, _) = reg
            .register_material(&owner, MaterialType::CellLine, hash(1), "LabA".into(), 1_000)
            .unwrap();
        let issuer = Address::new("issuer");
        reg.authorize_issuer(&admin, &issuer, true, true, false).unwrap();
        reg.issue_credential(
            &issuer,
            &material_id,
            CredentialType::Identity,
            hash(2),
            0,
            "cid1".into(),
            hash(3),
            "IssuerOrg".into(),
            1_000,
        )
        .unwrap();
        // An old, still-unexpired QC...
        reg.issue_credential(
            &issuer,
            &material_id,
            CredentialType::QcMyco,
            hash(4),
            10_000_000,
            "cid-old".into(),
            hash(5),
            "IssuerOrg".into(),
            1_000,
        )
        .unwrap();
        // ...followed by a newer, already-expired QC. Verification must use
        // the latest one, not the older still-valid one.
        reg.issue_credential(
            &issuer,
            &material_id,
            CredentialType::QcMyco,
            hash(6),
            1_200,
            "cid-new".into(),
            hash(7),
            "IssuerOrg".into(),
            2_000,
        )
        .unwrap();

        let result = verify_material(&reg, &material_id, 5_000).unwrap();
        assert!(!result.pass);
        assert_eq!(result.reasons, vec![QC_EXPIRED.to_string()]);
    }

    #[test]
    fn revoked_material_short_circuits_other_reasons_into_ordered_set() {
        let (reg, admin) = temp_registry();
        let owner = Address::new("owner");
        let (material_id, _) = reg
            .register_material(&owner, MaterialType::CellLine, hash(1), "LabA".into(), 1_000)
            .unwrap();
        reg.set_status_by_authority(&admin, &material_id, MaterialStatus::Revoked, hash(9), 1_100)
            .unwrap();
        let result = verify_material(&reg, &material_id, 1_200).unwrap();
        assert!(!result.pass);
        assert_eq!(result.reasons[0], MATERIAL_REVOKED.to_string());
    }

    #[test]
    fn pending_transfer_flagged() {
        let (reg, admin) = temp_registry();
        let owner = Address::new("owner");
        let (material_id, _) = reg
            .register_material(&owner, MaterialType::CellLine, hash(1), "LabA".into(), 1_000)
            .unwrap();
        let issuer = Address::new("issuer");
        reg.authorize_issuer(&admin, &issuer, true, true, false).unwrap();
        reg.issue_credential(&issuer, &material_id, CredentialType::Identity, hash(2), 0, "cid1".into(), hash(3), "Org".into(), 1_000)
            .unwrap();
        reg.issue_credential(&issuer, &material_id, CredentialType::QcMyco, hash(4), 2_000_000, "cid2".into(), hash(5), "Org".into(), 1_000)
            .unwrap();
        reg.initiate_transfer(&owner, &material_id, Address::new("labB"), "LabB".into(), hash(8), 1_100)
            .unwrap();

        let result = verify_material(&reg, &material_id, 1_200).unwrap();
        assert!(!result.pass);
        assert_eq!(result.reasons, vec![TRANSFER_PENDING.to_string()]);
    }

    #[test]
    fn verify_is_pure_across_repeated_calls() {
        let (reg, admin) = temp_registry();
        let owner = Address::new("owner");
        let (material_id, _) = reg
            .register_material(&owner, MaterialType::CellLine, hash(1), "LabA".into(), 1_000)
            .unwrap();
        let _ = admin;
        let first = verify_material(&reg, &material_id, 1_000).unwrap();
        let second = verify_material(&reg, &material_id, 1_000).unwrap();
        assert_eq!(first, second);
    }
}
