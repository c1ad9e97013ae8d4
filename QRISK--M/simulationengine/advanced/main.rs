//! Result reporting and parameter sweeps built on top of the core trial loop.

/// Aggregate result types and JSON output.
pub mod report;
/// Sensitivity sweeps over a single parameter.
pub mod sensitivity;

pub use report::{AggregateResult, AlgorithmSummary, ScenarioSummary, TrialRecord, TrialScenario};
pub use sensitivity::{SensitivityAnalyzer, SensitivityParameter, SensitivityPoint, SensitivityReport};
