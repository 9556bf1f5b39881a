//! Deterministic synthetic dataset generator (C8).
//!
//! Every roll comes from a single `StdRng` seeded per preset, so a given
//! `WorkloadPreset` always produces byte-identical plans. Ground truth is
//! computed from the plan actually rolled, never from the nominal rates in
//! `AnomalyRates` — two runs of the same preset agree on ground truth for
//! the same reason they agree on everything else: the RNG stream is fixed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use bioledger_core::model::MaterialType;
use bioledger_core::types::{Address, Timestamp};

use crate::anomaly;

/// Injection rates, each a probability in `[0, 1]`. Independent rolls —
/// more than one anomaly can land on the same material (e.g. a revoked
/// material can also have an expired QC on record).
#[derive(Clone, Debug)]
pub struct AnomalyRates {
    pub revoked: f64,
    pub quarantined: f64,
    pub missing_qc: f64,
    pub expired_qc: f64,
    pub tampered_artifact: f64,
    pub pending_transfer: f64,
}

impl Default for AnomalyRates {
    fn default() -> Self {
        Self {
            revoked: 0.05,
            quarantined: 0.05,
            missing_qc: 0.10,
            expired_qc: 0.10,
            tampered_artifact: 0.05,
            pending_transfer: 0.08,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WorkloadPreset {
    pub name: String,
    pub seed: u64,
    pub material_count: usize,
    /// Fraction of materials that are `CellLine` rather than `Plasmid`.
    pub cell_line_fraction: f64,
    pub anomaly_rates: AnomalyRates,
    /// How long a fresh QC credential is valid for, in seconds.
    pub qc_validity_window_secs: i64,
    /// Wall-clock anchor ("now") the dataset is generated relative to.
    pub generated_at: Timestamp,
    /// Size of the issuer pool credentials are drawn from.
    pub issuer_pool_size: usize,
}

impl WorkloadPreset {
    /// Baseline dataset: low anomaly rates, representative of a healthy
    /// steady-state registry.
    pub fn normal(seed: u64, generated_at: Timestamp) -> Self {
        Self {
            name: "normal".into(),
            seed,
            material_count: 500,
            cell_line_fraction: 0.6,
            anomaly_rates: AnomalyRates::default(),
            qc_validity_window_secs: 180 * 86_400,
            generated_at,
            issuer_pool_size: 5,
        }
    }

    /// Distribution-shifted dataset: moderately elevated anomaly rates and a
    /// shorter QC validity window, representing a population that has
    /// drifted from the baseline (more issuer churn, tighter QC windows)
    /// without being deliberately adversarial.
    pub fn drift(seed: u64, generated_at: Timestamp) -> Self {
        Self {
            name: "drift".into(),
            seed,
            material_count: 500,
            cell_line_fraction: 0.5,
            anomaly_rates: AnomalyRates {
                revoked: 0.06,
                quarantined: 0.07,
                missing_qc: 0.08,
                expired_qc: 0.10,
                tampered_artifact: 0.04,
                pending_transfer: 0.10,
            },
            qc_validity_window_secs: 60 * 86_400,
            generated_at,
            issuer_pool_size: 8,
        }
    }

    /// Adversarial dataset: anomaly rates deliberately tuned so the on-chain
    /// verify-fail rate falls in spec.md §8's acceptance band `[0.55, 0.80]`
    /// (see `bioledger-eval`'s acceptance test for the exact computation).
    pub fn adversarial(seed: u64, generated_at: Timestamp) -> Self {
        Self {
            name: "adversarial".into(),
            seed,
            material_count: 500,
            cell_line_fraction: 0.5,
            anomaly_rates: AnomalyRates {
                revoked: 0.15,
                quarantined: 0.15,
                missing_qc: 0.20,
                expired_qc: 0.25,
                tampered_artifact: 0.10,
                pending_transfer: 0.25,
            },
            qc_validity_window_secs: 30 * 86_400,
            generated_at,
            issuer_pool_size: 10,
        }
    }

    /// All three presets, in the order spec.md §1 names them (normal,
    /// drift, adversarial).
    pub fn all(seed: u64, generated_at: Timestamp) -> Vec<Self> {
        vec![
            Self::normal(seed, generated_at),
            Self::drift(seed, generated_at),
            Self::adversarial(seed, generated_at),
        ]
    }
}

#[derive(Clone, Debug)]
pub struct GeneratedQc {
    pub issued_at: Timestamp,
    pub valid_until: Timestamp,
    pub artifact_bytes: Vec<u8>,
    /// The hash recorded on-chain for the artifact. Equal to
    /// `sha256(artifact_bytes)` unless this credential was rolled as
    /// `TAMPERED_ARTIFACT`, in which case it deliberately diverges.
    pub stored_artifact_hash: [u8; 32],
}

#[derive(Clone, Debug)]
pub struct GeneratedTransfer {
    pub to: Address,
    pub to_org: String,
    pub accepted: bool,
}

/// Final planned status for a generated material, applied via the ordinary
/// `set_status_by_*` operations during materialization — not written
/// directly into storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlannedStatus {
    Active,
    Quarantined,
    Revoked,
}

#[derive(Clone, Debug)]
pub struct GeneratedMaterial {
    pub local_id: usize,
    pub material_type: MaterialType,
    pub owner: Address,
    pub owner_org: String,
    pub metadata_hash: [u8; 32],
    pub issuer: Address,
    pub issuer_org: String,
    pub has_identity: bool,
    pub qc: Option<GeneratedQc>,
    pub planned_status: PlannedStatus,
    pub transfer: Option<GeneratedTransfer>,
    pub created_at: Timestamp,
    /// Anomaly classes actually realized by this plan, derived after every
    /// other field is rolled — never from the nominal `AnomalyRates`.
    pub ground_truth: Vec<&'static str>,
}

pub struct Dataset {
    pub preset_name: String,
    pub materials: Vec<GeneratedMaterial>,
}

fn deterministic_hash(rng: &mut StdRng, salt: &str) -> [u8; 32] {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(bytes);
    hasher.finalize().into()
}

pub fn generate(preset: &WorkloadPreset) -> Dataset {
    let mut rng = StdRng::seed_from_u64(preset.seed);
    let mut materials = Vec::with_capacity(preset.material_count);

    for local_id in 0..preset.material_count {
        let material_type = if rng.gen_bool(preset.cell_line_fraction) {
            MaterialType::CellLine
        } else {
            MaterialType::Plasmid
        };
        let owner = Address::new(format!("{}-owner-{local_id}", preset.name));
        let owner_org = format!("{}-Org-{}", preset.name, local_id % 20);
        let issuer_index = rng.gen_range(0..preset.issuer_pool_size);
        let issuer = Address::new(format!("{}-issuer-{issuer_index}", preset.name));
        let issuer_org = format!("{}-IssuerOrg-{issuer_index}", preset.name);
        let metadata_hash = deterministic_hash(&mut rng, "metadata");
        let created_at = preset.generated_at - rng.gen_range(0..365) * 86_400;

        let mut ground_truth = Vec::new();

        let is_revoked = rng.gen_bool(preset.anomaly_rates.revoked);
        let is_quarantined = !is_revoked && rng.gen_bool(preset.anomaly_rates.quarantined);
        let planned_status = if is_revoked {
            ground_truth.push(anomaly::REVOKED);
            PlannedStatus::Revoked
        } else if is_quarantined {
            ground_truth.push(anomaly::QUARANTINED);
            PlannedStatus::Quarantined
        } else {
            PlannedStatus::Active
        };

        let has_identity = true;

        let missing_qc = rng.gen_bool(preset.anomaly_rates.missing_qc);
        let qc = if missing_qc {
            ground_truth.push(anomaly::MISSING_QC);
            None
        } else {
            let is_expired = rng.gen_bool(preset.anomaly_rates.expired_qc);
            let (issued_at, valid_until) = if is_expired {
                ground_truth.push(anomaly::EXPIRED_QC);
                // Anchor the expiry to preset.generated_at directly rather
                // than to issued_at: computing the offset the other way
                // round (issued_at + a few days) can't guarantee
                // valid_until < generated_at when issued_at itself landed
                // close to (or after) generated_at.
                let valid_until = preset.generated_at - rng.gen_range(1..10) * 86_400;
                let issued_at = valid_until - rng.gen_range(1..30) * 86_400;
                (issued_at, valid_until)
            } else {
                let issued_at = created_at + rng.gen_range(0..30) * 86_400;
                let valid_until = issued_at + preset.qc_validity_window_secs;
                // valid_until must postdate preset.generated_at for a "not
                // expired" roll to actually hold at evaluation time.
                let valid_until = if valid_until <= preset.generated_at {
                    preset.generated_at + preset.qc_validity_window_secs
                } else {
                    valid_until
                };
                (issued_at, valid_until)
            };

            let artifact_bytes = {
                let mut bytes = vec![0u8; 64];
                rng.fill(bytes.as_mut_slice());
                bytes
            };
            let is_tampered = rng.gen_bool(preset.anomaly_rates.tampered_artifact);
            let stored_artifact_hash = if is_tampered {
                ground_truth.push(anomaly::TAMPERED_ARTIFACT);
                deterministic_hash(&mut rng, "tampered")
            } else {
                Sha256::digest(&artifact_bytes).into()
            };

            Some(GeneratedQc {
                issued_at,
                valid_until,
                artifact_bytes,
                stored_artifact_hash,
            })
        };

        let pending_transfer = rng.gen_bool(preset.anomaly_rates.pending_transfer);
        let transfer = if pending_transfer || rng.gen_bool(0.10) {
            let accepted = !pending_transfer;
            if pending_transfer {
                ground_truth.push(anomaly::PENDING_TRANSFER);
            }
            Some(GeneratedTransfer {
                to: Address::new(format!("{}-recipient-{local_id}", preset.name)),
                to_org: format!("{}-RecipientOrg-{}", preset.name, local_id % 20),
                accepted,
            })
        } else {
            None
        };

        materials.push(GeneratedMaterial {
            local_id,
            material_type,
            owner,
            owner_org,
            metadata_hash,
            issuer,
            issuer_org,
            has_identity,
            qc,
            planned_status,
            transfer,
            created_at,
            ground_truth,
        });
    }

    Dataset {
        preset_name: preset.name.clone(),
        materials,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic_for_fixed_seed() {
        let preset = WorkloadPreset::normal(42, 10_000_000);
        let a = generate(&preset);
        let b = generate(&preset);
        assert_eq!(a.materials.len(), b.materials.len());
        for (x, y) in a.materials.iter().zip(b.materials.iter()) {
            assert_eq!(x.material_type, y.material_type);
            assert_eq!(x.metadata_hash, y.metadata_hash);
            assert_eq!(x.ground_truth, y.ground_truth);
        }
    }

    #[test]
    fn preset_produces_requested_material_count() {
        let preset = WorkloadPreset::drift(7, 10_000_000);
        let dataset = generate(&preset);
        assert_eq!(dataset.materials.len(), 500);
    }

    #[test]
    fn ground_truth_reflects_realized_absence_of_qc() {
        let preset = WorkloadPreset::adversarial(1, 10_000_000);
        let dataset = generate(&preset);
        for m in &dataset.materials {
            let labelled_missing = m.ground_truth.contains(&anomaly::MISSING_QC);
            assert_eq!(labelled_missing, m.qc.is_none());
        }
    }

    #[test]
    fn all_returns_three_presets_in_spec_order() {
        let presets = WorkloadPreset::all(1, 10_000_000);
        assert_eq!(presets.len(), 3);
        assert_eq!(presets[0].name, "normal");
        assert_eq!(presets[1].name, "drift");
        assert_eq!(presets[2].name, "adversarial");
    }
}
