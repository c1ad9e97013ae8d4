use thiserror::Error;

/// Configuration defects detected before any trial runs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Trial count must be at least one.
    #[error("trial count must be positive")]
    NoTrials,
    /// Horizon must be at least one year.
    #[error("time horizon must be at least one year")]
    EmptyHorizon,
    /// Weights of the composite assurance score must sum to one.
    #[error("assurance weights sum to {sum}, expected 1.0")]
    WeightSum {
        /// Observed sum.
        sum: f64,
    },
    /// A single weight is negative or not finite.
    #[error("assurance weight `{name}` is invalid: {value}")]
    InvalidWeight {
        /// Weight label (`strength`, `key_management`, ...).
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A numeric parameter is outside its domain.
    #[error("parameter `{name}` is invalid: {value} ({expected})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: f64,
        /// Human readable domain.
        expected: &'static str,
    },
    /// No algorithm is tracked.
    #[error("at least one algorithm must be tracked")]
    NoAlgorithms,
    /// Two algorithms share a name.
    #[error("algorithm `{0}` is declared more than once")]
    DuplicateAlgorithm(String),
    /// Algorithm referenced by name but not declared.
    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),
    /// No scenario is evaluated.
    #[error("at least one scenario must be evaluated")]
    NoScenarios,
    /// Two scenarios share a name.
    #[error("scenario `{0}` is listed more than once")]
    DuplicateScenario(String),
    /// Scenario referenced by name but not known to the catalog.
    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),
    /// Custom piecewise scenario is malformed.
    #[error("custom scenario `{name}` is invalid: {reason}")]
    InvalidCustomScenario {
        /// Scenario name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
    /// Capability projection table is malformed.
    #[error("capability projection is invalid: {0}")]
    InvalidProjection(String),
}

/// Errors raised while running a simulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Rejected configuration; no trial was run.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// A strategy produced coverage outside its contract.
    #[error("scenario `{scenario}` violated its coverage contract in trial {trial}: {reason}")]
    ScenarioContract {
        /// Scenario name.
        scenario: String,
        /// Zero-based trial index.
        trial: usize,
        /// Description of the defect.
        reason: String,
    },
    /// A series handed to an accumulator has the wrong length.
    #[error("series `{series}` has {actual} points, expected {expected}")]
    SeriesLength {
        /// Series label.
        series: String,
        /// Expected length (horizon).
        expected: usize,
        /// Observed length.
        actual: usize,
    },
    /// Sampling distribution could not be built.
    #[error("distribution error: {0}")]
    Distribution(String),
}

/// Result alias used across the engine.
pub type SimulationResult<T> = Result<T, SimulationError>;
