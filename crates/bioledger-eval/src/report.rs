//! Persisted evaluation artifacts (spec.md §6): a materials JSON file, a
//! per-material CSV of expected/actual outcomes, a summary JSON with exact
//! counts and fail-reason histograms, and a benchmark report JSON.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::harness::{ConfusionCounts, MaterializedOutcome};
use crate::metrics::{LatencyStats, ScalingPoint, ThroughputResult};

#[derive(Clone, Debug, Serialize)]
pub struct MaterialRecord {
    pub local_id: usize,
    pub material_id: String,
    pub ground_truth: Vec<String>,
    pub on_chain_reasons: Vec<String>,
    pub full_reasons: Vec<String>,
    pub on_chain_pass: bool,
    pub full_pass: bool,
}

impl From<&MaterializedOutcome> for MaterialRecord {
    fn from(o: &MaterializedOutcome) -> Self {
        Self {
            local_id: o.local_id,
            material_id: o.material_id.to_string(),
            ground_truth: o.ground_truth.iter().map(|s| s.to_string()).collect(),
            on_chain_reasons: o.on_chain_reasons.clone(),
            full_reasons: o.full_reasons.clone(),
            on_chain_pass: o.on_chain_reasons.is_empty(),
            full_pass: o.full_reasons.is_empty(),
        }
    }
}

pub fn write_materials_json(path: impl AsRef<Path>, outcomes: &[MaterializedOutcome]) -> Result<()> {
    let records: Vec<MaterialRecord> = outcomes.iter().map(MaterialRecord::from).collect();
    let file = std::fs::File::create(path.as_ref()).with_context(|| format!("creating {}", path.as_ref().display()))?;
    serde_json::to_writer_pretty(file, &records)?;
    Ok(())
}

pub fn write_materials_csv(path: impl AsRef<Path>, outcomes: &[MaterializedOutcome]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref()).with_context(|| format!("creating {}", path.as_ref().display()))?;
    writer.write_record([
        "local_id",
        "material_id",
        "ground_truth",
        "on_chain_reasons",
        "full_reasons",
        "on_chain_pass",
        "full_pass",
    ])?;
    for o in outcomes {
        writer.write_record([
            o.local_id.to_string(),
            o.material_id.to_string(),
            o.ground_truth.join(";"),
            o.on_chain_reasons.join(";"),
            o.full_reasons.join(";"),
            o.on_chain_reasons.is_empty().to_string(),
            o.full_reasons.is_empty().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
pub struct SummaryReport {
    pub preset_name: String,
    pub material_count: usize,
    pub on_chain_confusion: HashMap<String, ConfusionCounts>,
    pub full_confusion: HashMap<String, ConfusionCounts>,
    pub fail_reason_histogram: HashMap<String, u64>,
}

pub fn write_summary_json(
    path: impl AsRef<Path>,
    preset_name: &str,
    outcomes: &[MaterializedOutcome],
    on_chain_confusion: &HashMap<&'static str, ConfusionCounts>,
    full_confusion: &HashMap<&'static str, ConfusionCounts>,
) -> Result<()> {
    let mut fail_reason_histogram: HashMap<String, u64> = HashMap::new();
    for o in outcomes {
        for reason in &o.full_reasons {
            *fail_reason_histogram.entry(reason.clone()).or_insert(0) += 1;
        }
    }
    let summary = SummaryReport {
        preset_name: preset_name.to_string(),
        material_count: outcomes.len(),
        on_chain_confusion: on_chain_confusion.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        full_confusion: full_confusion.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        fail_reason_histogram,
    };
    let file = std::fs::File::create(path.as_ref()).with_context(|| format!("creating {}", path.as_ref().display()))?;
    serde_json::to_writer_pretty(file, &summary)?;
    Ok(())
}

#[derive(Clone, Debug, Serialize)]
pub struct BenchmarkReport {
    pub latency: HashMap<String, LatencyStats>,
    pub throughput: Vec<ThroughputResult>,
    pub history_scaling: Vec<ScalingPoint>,
}

pub fn write_benchmark_report_json(
    path: impl AsRef<Path>,
    latency: &HashMap<String, LatencyStats>,
    throughput: &[ThroughputResult],
    history_scaling: &[ScalingPoint],
) -> Result<()> {
    let report = BenchmarkReport {
        latency: latency.clone(),
        throughput: throughput.to_vec(),
        history_scaling: history_scaling.to_vec(),
    };
    let file = std::fs::File::create(path.as_ref()).with_context(|| format!("creating {}", path.as_ref().display()))?;
    serde_json::to_writer_pretty(file, &report)?;
    Ok(())
}
