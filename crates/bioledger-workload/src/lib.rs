pub mod anomaly;
pub mod generator;

pub use generator::{
    AnomalyRates, Dataset, GeneratedMaterial, GeneratedQc, GeneratedTransfer, PlannedStatus,
    WorkloadPreset,
};
