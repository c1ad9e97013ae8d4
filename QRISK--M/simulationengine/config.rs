use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    assurance::{AssuranceWeights, MetricInput},
    capability::{CapabilityParams, CapabilitySource, ProjectionPoint, ProjectionTable},
    error::ConfigError,
    scenarios::{normalize_name, CustomScenario},
    stats::PercentileBand,
};

/// Family an algorithm belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmClass {
    /// Pre-quantum public key cryptography (RSA, ECC).
    #[default]
    Classical,
    /// Post-quantum schemes (lattice, hash-based, ...).
    PostQuantum,
}

/// Tracked algorithm and its attack cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Algorithm {
    /// Display name, e.g. `RSA-2048`.
    pub name: String,
    /// Log10 operations needed to break it.
    pub attack_cost: f64,
    /// Algorithm family.
    #[serde(default)]
    pub class: AlgorithmClass,
}

impl Algorithm {
    /// Creates an algorithm entry.
    #[must_use]
    pub fn new(name: impl Into<String>, attack_cost: f64, class: AlgorithmClass) -> Self {
        Self {
            name: name.into(),
            attack_cost,
            class,
        }
    }
}

/// Built-in reference algorithms: RSA-2048 and Kyber-512.
#[must_use]
pub fn default_algorithms() -> Vec<Algorithm> {
    vec![
        Algorithm::new("RSA-2048", 10.0, AlgorithmClass::Classical),
        Algorithm::new("Kyber-512", 18.0, AlgorithmClass::PostQuantum),
    ]
}

/// Built-in scenario list.
#[must_use]
pub fn default_scenarios() -> Vec<String> {
    ["Aggressive", "Conservative", "Late_Start"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Settings of the composite assurance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssuranceSettings {
    /// Metric weights.
    pub weights: AssuranceWeights,
    /// Key management metric.
    pub key_management: MetricInput,
    /// Crypto-agility metric.
    pub crypto_agility: MetricInput,
    /// Algorithm being migrated to; its risk drives the strength metric.
    pub target_algorithm: String,
    /// When set, strength uses the coverage-weighted mix of this algorithm's risk
    /// and the target's.
    pub legacy_algorithm: Option<String>,
    /// CAS level below which a year counts as a breach.
    pub threshold: f64,
}

impl Default for AssuranceSettings {
    fn default() -> Self {
        Self {
            weights: AssuranceWeights::default(),
            key_management: MetricInput::Constant(0.85),
            crypto_agility: MetricInput::Constant(0.75),
            target_algorithm: "Kyber-512".into(),
            legacy_algorithm: None,
            threshold: 0.70,
        }
    }
}

/// Immutable run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of Monte Carlo trials.
    pub trials: usize,
    /// Horizon in years.
    pub years: usize,
    /// Master seed; drawn at build time when absent.
    pub seed: Option<u64>,
    /// Logistic sensitivity of the risk function.
    pub alpha: f64,
    /// Capability growth process.
    pub capability: CapabilityParams,
    /// External capability projection; replaces the growth draw when non-empty.
    pub projection: Vec<ProjectionPoint>,
    /// Tracked algorithms.
    pub algorithms: Vec<Algorithm>,
    /// Assurance score settings.
    pub assurance: AssuranceSettings,
    /// Scenarios to evaluate, by catalog name.
    pub scenarios: Vec<String>,
    /// Piecewise scenarios declared inline.
    pub custom_scenarios: Vec<CustomScenario>,
    /// Percentile band for the summaries.
    pub band: PercentileBand,
    /// Keep every trial's raw series in the result.
    pub retain_trials: bool,
    /// Emit a debug progress record every this many trials (0 disables).
    pub progress_interval: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trials: 1000,
            years: 15,
            seed: None,
            alpha: 2.0,
            capability: CapabilityParams::default(),
            projection: Vec::new(),
            algorithms: default_algorithms(),
            assurance: AssuranceSettings::default(),
            scenarios: default_scenarios(),
            custom_scenarios: Vec::new(),
            band: PercentileBand::default(),
            retain_trials: false,
            progress_interval: 100,
        }
    }
}

impl SimulationConfig {
    /// Loads configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading simulation config {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Serializes to TOML (used to dump the effective configuration).
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Looks an algorithm up by exact name.
    #[must_use]
    pub fn algorithm(&self, name: &str) -> Option<&Algorithm> {
        self.algorithms.iter().find(|algo| algo.name == name)
    }

    /// Capability source implied by `projection`.
    pub fn capability_source(&self) -> Result<CapabilitySource, ConfigError> {
        if self.projection.is_empty() {
            Ok(CapabilitySource::Stochastic)
        } else {
            ProjectionTable::new(self.projection.clone()).map(CapabilitySource::Projection)
        }
    }

    /// Checks everything that does not need the scenario catalog.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trials == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.years == 0 {
            return Err(ConfigError::EmptyHorizon);
        }
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(ConfigError::InvalidParameter {
                name: "alpha",
                value: self.alpha,
                expected: "finite and > 0",
            });
        }
        self.capability.validate()?;
        self.capability_source()?;
        self.validate_algorithms()?;
        self.assurance.weights.validate()?;
        self.assurance
            .key_management
            .validate("assurance.key_management")?;
        self.assurance
            .crypto_agility
            .validate("assurance.crypto_agility")?;
        if !(0.0..=1.0).contains(&self.assurance.threshold) {
            return Err(ConfigError::InvalidParameter {
                name: "assurance.threshold",
                value: self.assurance.threshold,
                expected: "within [0, 1]",
            });
        }
        self.band.validate()?;
        let mut seen = HashSet::new();
        for name in &self.scenarios {
            if !seen.insert(normalize_name(name)) {
                return Err(ConfigError::DuplicateScenario(name.clone()));
            }
        }
        Ok(())
    }

    fn validate_algorithms(&self) -> Result<(), ConfigError> {
        if self.algorithms.is_empty() {
            return Err(ConfigError::NoAlgorithms);
        }
        let mut names = HashSet::new();
        for algo in &self.algorithms {
            if !names.insert(algo.name.as_str()) {
                return Err(ConfigError::DuplicateAlgorithm(algo.name.clone()));
            }
            if !algo.attack_cost.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name: "algorithms.attack_cost",
                    value: algo.attack_cost,
                    expected: "finite",
                });
            }
        }
        let referenced = std::iter::once(&self.assurance.target_algorithm)
            .chain(self.assurance.legacy_algorithm.as_ref());
        for name in referenced {
            if !names.contains(name.as_str()) {
                return Err(ConfigError::UnknownAlgorithm(name.clone()));
            }
        }
        Ok(())
    }
}
