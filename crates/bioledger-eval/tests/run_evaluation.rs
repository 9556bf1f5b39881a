//! End-to-end sanity check for the `run_evaluation` orchestration entry
//! point: runs a reduced configuration over all three presets and checks
//! the result shape, without asserting on the acceptance bounds (that's
//! `acceptance.rs`, which targets the adversarial preset specifically).

use bioledger_eval::{run_evaluation, EvalConfig};
use bioledger_workload::generator::WorkloadPreset;

/// `tracing::info!`/`warn!` calls throughout the registry and harness are
/// silent without a subscriber installed. `try_init` tolerates being called
/// from more than one test in this binary.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bioledger=debug".parse().unwrap()),
        )
        .try_init();
}

#[test]
fn run_evaluation_covers_every_preset_and_measures_benchmarks() {
    init_tracing();
    let now = 30_000_000;
    let config = EvalConfig {
        presets: vec![
            WorkloadPreset {
                material_count: 20,
                ..WorkloadPreset::normal(1, now)
            },
            WorkloadPreset {
                material_count: 20,
                ..WorkloadPreset::drift(2, now)
            },
            WorkloadPreset {
                material_count: 20,
                ..WorkloadPreset::adversarial(3, now)
            },
        ],
        now,
        latency_iterations: 5,
        throughput_concurrency_levels: vec![1, 2],
        throughput_ops_per_thread: 5,
        scaling_points: vec![10, 30, 30, 50],
        scaling_iterations: 3,
        output_dir: None,
    };

    let result = run_evaluation(&config).expect("evaluation run succeeds");

    assert_eq!(result.presets.len(), 3);
    for preset_result in &result.presets {
        assert_eq!(preset_result.outcomes.len(), 20);
        assert_eq!(preset_result.on_chain_confusion.len(), bioledger_workload::anomaly::ALL.len());
        assert_eq!(preset_result.full_confusion.len(), bioledger_workload::anomaly::ALL.len());
    }

    assert!(result.latency.contains_key("register_material"));
    assert!(result.latency.contains_key("issue_credential"));
    assert!(result.latency.contains_key("verify_material"));
    for stats in result.latency.values() {
        assert_eq!(stats.samples, 5);
    }

    assert_eq!(result.throughput.len(), 2);
    for t in &result.throughput {
        assert_eq!(t.total_ops, t.concurrency * 5);
    }

    // Four scaling points requested, but 30 is repeated — the sweep still
    // reports four samples (one per requested point), each at its own
    // registry_size, not three distinct growth steps collapsed into one.
    assert_eq!(result.history_scaling.len(), 4);
    assert_eq!(
        result.history_scaling.iter().map(|p| p.registry_size).collect::<Vec<_>>(),
        vec![10, 30, 30, 50]
    );
    for point in &result.history_scaling {
        assert_eq!(point.stats.samples, 3);
    }
}

#[test]
fn run_evaluation_writes_artifacts_when_output_dir_set() {
    init_tracing();
    let now = 30_000_001;
    let dir = std::env::temp_dir().join(format!("bioledger_eval_artifacts_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let config = EvalConfig {
        presets: vec![WorkloadPreset {
            material_count: 10,
            ..WorkloadPreset::normal(5, now)
        }],
        now,
        latency_iterations: 2,
        throughput_concurrency_levels: vec![1],
        throughput_ops_per_thread: 2,
        scaling_points: vec![5, 10],
        scaling_iterations: 2,
        output_dir: Some(dir.clone()),
    };

    run_evaluation(&config).expect("evaluation run succeeds");

    assert!(dir.join("normal-materials.json").exists());
    assert!(dir.join("normal-materials.csv").exists());
    assert!(dir.join("normal-summary.json").exists());
    assert!(dir.join("benchmark-report.json").exists());

    let _ = std::fs::remove_dir_all(&dir);
}
