#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rust_2018_idioms,
    missing_docs
)]

//! QRisk Simulation Engine – Monte Carlo projection of quantum attack capability,
//! residual cryptographic risk, and assurance under post-quantum migration scenarios.

/// Error types.
#[path = "../error.rs"]
pub mod error;

/// Telemetry and per-trial random streams.
#[path = "../helper.rs"]
pub mod helper;

/// Year indices of the horizon.
#[path = "../time_axis.rs"]
pub mod time_axis;

/// Capability growth model.
#[path = "../capability.rs"]
pub mod capability;

/// Logistic risk function.
#[path = "../risk.rs"]
pub mod risk;

/// Composite assurance score and trust continuity index.
#[path = "../assurance.rs"]
pub mod assurance;

/// Migration coverage strategies.
#[path = "../scenarios.rs"]
pub mod scenarios;

/// Cross-trial statistics.
#[path = "../stats.rs"]
pub mod stats;

/// Run configuration.
#[path = "../config.rs"]
pub mod config;

/// Reference data loading.
#[path = "../reference.rs"]
pub mod reference;

/// Trial loop and aggregation.
#[path = "../simulator.rs"]
pub mod simulator;

/// Reporting and sensitivity analysis.
#[path = "../advanced/main.rs"]
pub mod advanced;

/// Engine entry point.
#[path = "../main.rs"]
pub mod runtime;

pub use advanced::{AggregateResult, SensitivityAnalyzer, SensitivityParameter, SensitivityReport};
pub use config::{Algorithm, AlgorithmClass, SimulationConfig};
pub use error::{ConfigError, SimulationError, SimulationResult};
pub use helper::{SimulationTelemetry, SimulationTelemetryBuilder};
pub use reference::ReferenceData;
pub use runtime::{SimulationEngine, SimulationEngineBuilder};
pub use scenarios::{CoverageStrategy, FnStrategy, ScenarioCatalog};
