//! Top-level evaluation run orchestration (C9): ties materialization,
//! confusion-matrix scoring, latency/throughput measurement, and persisted
//! artifacts together into a single entry point over a set of presets.
//!
//! This is the closest analogue in this workspace to the base workspace's
//! binary-level `anyhow::Result<()>` entry points — `anyhow` is used here
//! and nowhere in the library crates below it.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use bioledger_core::model::{CredentialType, MaterialType};
use bioledger_core::types::Address;
use bioledger_registry::{Registry, StateDb};
use bioledger_verify::InMemoryObjectStore;
use bioledger_workload::generator::{self, WorkloadPreset};

use crate::harness::{
    full_confusion_matrices, materialize, on_chain_confusion_matrices, require_nonempty_dataset,
    ConfusionCounts, MaterializedOutcome,
};
use crate::metrics::{measure_latency, measure_scaling, measure_throughput, LatencyStats, ScalingPoint, ThroughputResult};
use crate::report::{write_benchmark_report_json, write_materials_csv, write_materials_json, write_summary_json};

/// Tunables for one evaluation run. Plain constructor arguments, matching
/// the base workspace's "config struct, not config file" convention — no
/// CLI surface exists to parse a file-based configuration from.
#[derive(Clone, Debug)]
pub struct EvalConfig {
    pub presets: Vec<WorkloadPreset>,
    pub now: i64,
    pub latency_iterations: usize,
    pub throughput_concurrency_levels: Vec<usize>,
    pub throughput_ops_per_thread: usize,
    /// Registry sizes (materials) at which to sample history-read latency,
    /// ascending. Growth between points is incremental (`target -
    /// previous`), per spec.md §5/§9 — never a fresh re-registration.
    pub scaling_points: Vec<usize>,
    pub scaling_iterations: usize,
    /// When set, per-preset artifacts (materials JSON/CSV, summary JSON)
    /// and the benchmark report JSON are written under this directory.
    pub output_dir: Option<PathBuf>,
}

impl EvalConfig {
    /// The default run: all three presets from spec.md §1 (normal, drift,
    /// adversarial), a modest latency sample count, and no artifact output.
    pub fn default_run(seed: u64, now: i64) -> Self {
        Self {
            presets: WorkloadPreset::all(seed, now),
            now,
            latency_iterations: 50,
            throughput_concurrency_levels: vec![1, 4, 8],
            throughput_ops_per_thread: 50,
            scaling_points: vec![100, 500, 1_000, 2_000],
            scaling_iterations: 20,
            output_dir: None,
        }
    }

    /// Same as [`Self::default_run`], anchored to the current wall-clock
    /// time rather than a caller-supplied instant — for a live run (not a
    /// reproducible test) where "now" genuinely means now.
    pub fn default_run_now(seed: u64) -> Self {
        Self::default_run(seed, bioledger_core::types::now())
    }
}

#[derive(Clone, Debug)]
pub struct PresetResult {
    pub preset_name: String,
    pub outcomes: Vec<MaterializedOutcome>,
    pub on_chain_confusion: HashMap<&'static str, ConfusionCounts>,
    pub full_confusion: HashMap<&'static str, ConfusionCounts>,
}

#[derive(Clone, Debug)]
pub struct EvalRunResult {
    pub presets: Vec<PresetResult>,
    pub latency: HashMap<String, LatencyStats>,
    pub throughput: Vec<ThroughputResult>,
    pub history_scaling: Vec<ScalingPoint>,
}

/// Runs every preset in `config.presets` against a fresh `Registry`,
/// computes both confusion matrices for each, then measures latency and
/// throughput once against a dedicated registry seeded with the first
/// preset. Persists artifacts if `config.output_dir` is set.
pub fn run_evaluation(config: &EvalConfig) -> Result<EvalRunResult> {
    let mut preset_results = Vec::with_capacity(config.presets.len());

    for preset in &config.presets {
        info!(preset = %preset.name, "materializing preset");
        let dataset = generator::generate(preset);
        let db = StateDb::open_temp().context("opening temp state db for preset run")?;
        let admin = Address::new(format!("{}-admin", preset.name));
        let registry = Registry::new(db, admin.clone());
        let mut store = InMemoryObjectStore::new();

        let outcomes = materialize(&registry, &mut store, &admin, &dataset, config.now)
            .with_context(|| format!("materializing preset {}", preset.name))?;
        require_nonempty_dataset(&outcomes)?;

        let on_chain_confusion = on_chain_confusion_matrices(&outcomes);
        let full_confusion = full_confusion_matrices(&outcomes);

        if let Some(dir) = &config.output_dir {
            std::fs::create_dir_all(dir).with_context(|| format!("creating output dir {}", dir.display()))?;
            write_materials_json(dir.join(format!("{}-materials.json", preset.name)), &outcomes)?;
            write_materials_csv(dir.join(format!("{}-materials.csv", preset.name)), &outcomes)?;
            write_summary_json(
                dir.join(format!("{}-summary.json", preset.name)),
                &preset.name,
                &outcomes,
                &on_chain_confusion,
                &full_confusion,
            )?;
        }

        preset_results.push(PresetResult {
            preset_name: preset.name.clone(),
            outcomes,
            on_chain_confusion,
            full_confusion,
        });
    }

    let (latency, throughput) = measure_benchmarks(config)?;
    let history_scaling = measure_history_scaling(config)?;

    if let Some(dir) = &config.output_dir {
        std::fs::create_dir_all(dir).with_context(|| format!("creating output dir {}", dir.display()))?;
        write_benchmark_report_json(dir.join("benchmark-report.json"), &latency, &throughput, &history_scaling)?;
    }

    Ok(EvalRunResult {
        presets: preset_results,
        latency,
        throughput,
        history_scaling,
    })
}

/// Sweeps `config.scaling_points`, growing one registry incrementally and
/// sampling `get_history_slice` latency at each point. This is the "O(1)
/// history query" check called for by spec.md §9 Open Question 3: every
/// point reads the same fixed-size page (the first 10 entries) off a
/// single always-one-entry-long material so the sample measures the read
/// path's dependence on *registry* size, not on that one material's own
/// history length.
fn measure_history_scaling(config: &EvalConfig) -> Result<Vec<ScalingPoint>> {
    if config.scaling_points.is_empty() {
        return Ok(Vec::new());
    }
    let db = StateDb::open_temp().context("opening temp state db for scaling sweep")?;
    let admin = Address::new("scaling-admin");
    let registry = Registry::new(db, admin.clone());

    // Register one anchor material up front, outside the grow/op closures
    // below: `op` samples this one material's history on every call, so it
    // needs a concrete id before the sweep starts rather than one the
    // `grow` closure discovers along the way — keeping the two closures
    // from needing overlapping mutable access to the same variable.
    let anchor_owner = Address::new("scaling-owner-anchor");
    let (anchor_material_id, _) = registry.register_material(
        &anchor_owner,
        MaterialType::CellLine,
        bioledger_crypto::canonical::sha256(b"scaling-metadata-anchor"),
        "ScalingOrg".into(),
        config.now,
    )?;
    let mut registered = 1usize;

    let points = measure_scaling(
        &config.scaling_points,
        config.scaling_iterations,
        |target| {
            for i in registered..target {
                let owner = Address::new(format!("scaling-owner-{i}"));
                registry.register_material(
                    &owner,
                    MaterialType::CellLine,
                    bioledger_crypto::canonical::sha256(format!("scaling-metadata-{i}").as_bytes()),
                    "ScalingOrg".into(),
                    config.now,
                )?;
            }
            registered = registered.max(target);
            Ok(())
        },
        || {
            let _ = registry.get_history_slice(&anchor_material_id, 0, 10)?;
            Ok(())
        },
    )?;
    Ok(points)
}

/// Measures per-operation latency and mixed-workload throughput against a
/// dedicated registry, independent of the per-preset confusion-matrix runs
/// above so benchmark numbers are never skewed by prior preset state.
fn measure_benchmarks(config: &EvalConfig) -> Result<(HashMap<String, LatencyStats>, Vec<ThroughputResult>)> {
    let db = StateDb::open_temp().context("opening temp state db for benchmarks")?;
    let admin = Address::new("bench-admin");
    let registry = Registry::new(db, admin.clone());

    // Seed one approved issuer and a pool of already-registered materials so
    // read-path latency/throughput isn't measured against an empty store.
    let issuer = Address::new("bench-issuer");
    registry.authorize_issuer(&admin, &issuer, true, true, true)?;

    let seed_count = 200usize;
    let mut seeded_ids = Vec::with_capacity(seed_count);
    for i in 0..seed_count {
        let owner = Address::new(format!("bench-owner-{i}"));
        let (material_id, _) = registry.register_material(
            &owner,
            MaterialType::CellLine,
            bioledger_crypto::canonical::sha256(format!("bench-metadata-{i}").as_bytes()),
            "BenchOrg".into(),
            config.now,
        )?;
        seeded_ids.push((material_id, owner));
    }

    let mut latency = HashMap::new();

    {
        let mut i = seed_count;
        let stat = measure_latency(config.latency_iterations, || {
            let owner = Address::new(format!("bench-owner-{i}"));
            let receipt = registry
                .register_material(
                    &owner,
                    MaterialType::CellLine,
                    bioledger_crypto::canonical::sha256(format!("bench-metadata-{i}").as_bytes()),
                    "BenchOrg".into(),
                    config.now,
                )?
                .1;
            crate::harness::assert_finality(&receipt)?;
            i += 1;
            Ok(())
        })?;
        latency.insert("register_material".to_string(), stat);
    }

    {
        let mut i = 0usize;
        let stat = measure_latency(config.latency_iterations, || {
            let (material_id, _) = &seeded_ids[i % seeded_ids.len()];
            let receipt = registry
                .issue_credential(
                    &issuer,
                    material_id,
                    CredentialType::QcMyco,
                    bioledger_crypto::canonical::sha256(format!("bench-commitment-{i}").as_bytes()),
                    config.now + 365 * 86_400,
                    format!("bench-cid-{i}"),
                    bioledger_crypto::canonical::sha256(format!("bench-artifact-{i}").as_bytes()),
                    "BenchIssuerOrg".into(),
                    config.now,
                )?
                .1;
            crate::harness::assert_finality(&receipt)?;
            i += 1;
            Ok(())
        })?;
        latency.insert("issue_credential".to_string(), stat);
    }

    {
        // The read pool is frozen before measurement: `seeded_ids` is not
        // mutated again, so pool growth cannot bias this measurement (per
        // spec.md §5).
        let mut i = 0usize;
        let stat = measure_latency(config.latency_iterations, || {
            let (material_id, _) = &seeded_ids[i % seeded_ids.len()];
            let _ = bioledger_verify::verify_material(&registry, material_id, config.now)?;
            i += 1;
            Ok(())
        })?;
        latency.insert("verify_material".to_string(), stat);
    }

    let mut throughput = Vec::with_capacity(config.throughput_concurrency_levels.len());
    for &concurrency in &config.throughput_concurrency_levels {
        let read_ids = &seeded_ids;
        let registry_ref = &registry;
        let write_owner_base = format!("bench-tp-{concurrency}");
        let write_counter = std::sync::atomic::AtomicUsize::new(0);
        let result = measure_throughput(
            concurrency,
            config.throughput_ops_per_thread,
            0.70,
            |op_index| {
                let (material_id, _) = &read_ids[op_index % read_ids.len()];
                bioledger_verify::verify_material(registry_ref, material_id, config.now)?;
                Ok(())
            },
            |_op_index| {
                // All writes route through `Registry`'s single-writer lock,
                // per spec.md §5 — no separate queue is needed here because
                // every mutating method already serializes internally.
                let n = write_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let owner = Address::new(format!("{write_owner_base}-{n}"));
                let receipt = registry_ref
                    .register_material(
                        &owner,
                        MaterialType::Plasmid,
                        bioledger_crypto::canonical::sha256(format!("{write_owner_base}-{n}-meta").as_bytes()),
                        "BenchOrg".into(),
                        config.now,
                    )?
                    .1;
                crate::harness::assert_finality(&receipt)?;
                Ok(())
            },
        )?;
        throughput.push(result);
    }

    Ok((latency, throughput))
}
