pub mod harness;
pub mod metrics;
pub mod report;
pub mod run;

pub use harness::{
    assert_finality, full_confusion_matrices, materialize, on_chain_confusion_matrices,
    ConfusionCounts, DerivedMetrics, MaterializedOutcome,
};
pub use metrics::{measure_latency, measure_scaling, measure_throughput, LatencyStats, ScalingPoint, ThroughputResult};
pub use run::{run_evaluation, EvalConfig, EvalRunResult, PresetResult};
