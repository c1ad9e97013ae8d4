use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::AlgorithmClass,
    scenarios::normalize_name,
    stats::{PercentileBand, SeriesSummary},
};

/// Aggregated risk of one algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSummary {
    /// Attack cost used, log10 operations.
    pub attack_cost: f64,
    /// Algorithm family.
    pub class: AlgorithmClass,
    /// Per-year risk summary.
    pub risk: SeriesSummary,
    /// First year whose mean risk exceeds 0.5.
    pub critical_year: Option<u32>,
}

/// Aggregated outcome of one migration scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    /// Per-year coverage summary.
    pub coverage: SeriesSummary,
    /// Per-year composite assurance summary.
    pub assurance: SeriesSummary,
    /// Trust continuity index: mean over trials of the time-averaged CAS.
    pub tci: f64,
    /// Sample standard deviation of the per-trial TCI.
    pub tci_std_dev: f64,
    /// Years whose mean CAS is below the threshold.
    pub years_below_threshold: Vec<u32>,
    /// Fraction of trials with at least one year below the threshold.
    pub breach_probability: f64,
}

/// Series of one scenario in a retained trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialScenario {
    /// Coverage per year.
    pub coverage: Vec<f64>,
    /// CAS per year.
    pub assurance: Vec<f64>,
    /// Time average of `assurance`.
    pub tci: f64,
}

/// Raw output of one trial, kept only when retention is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Zero-based trial index.
    pub trial: usize,
    /// Growth rate drawn for this trial; absent under a projection.
    pub growth_rate: Option<f64>,
    /// Log10 capability per year.
    pub capability: Vec<f64>,
    /// Risk per algorithm.
    pub risk: IndexMap<String, Vec<f64>>,
    /// Coverage and assurance per scenario.
    pub scenarios: IndexMap<String, TrialScenario>,
}

/// Immutable result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Run identifier.
    pub run_id: Uuid,
    /// When aggregation finished.
    pub generated_at: DateTime<Utc>,
    /// Master seed actually used.
    pub seed: u64,
    /// Trials aggregated.
    pub trials: usize,
    /// Year indices, 1-based.
    pub years: Vec<u32>,
    /// Percentile band of every summary.
    pub band: PercentileBand,
    /// CAS threshold used for breach statistics.
    pub threshold: f64,
    /// Log10 capability summary.
    pub capability: SeriesSummary,
    /// Per-algorithm summaries, in configuration order.
    pub algorithms: IndexMap<String, AlgorithmSummary>,
    /// Per-scenario summaries, in configuration order.
    pub scenarios: IndexMap<String, ScenarioSummary>,
    /// Per-trial series when retention was enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_trials: Option<Vec<TrialRecord>>,
}

impl AggregateResult {
    /// Scenario summary by name; lookup ignores case and `-`/`_` differences.
    #[must_use]
    pub fn scenario(&self, name: &str) -> Option<&ScenarioSummary> {
        let key = normalize_name(name);
        self.scenarios
            .iter()
            .find(|(candidate, _)| normalize_name(candidate) == key)
            .map(|(_, summary)| summary)
    }

    /// TCI of a scenario.
    #[must_use]
    pub fn tci(&self, scenario: &str) -> Option<f64> {
        self.scenario(scenario).map(|summary| summary.tci)
    }

    /// Mean risk of an algorithm at a 1-based year.
    #[must_use]
    pub fn risk_at(&self, algorithm: &str, year: u32) -> Option<f64> {
        let index = self.years.iter().position(|&y| y == year)?;
        self.algorithms
            .get(algorithm)
            .and_then(|summary| summary.risk.mean.get(index).copied())
    }

    /// Scenario with the highest TCI.
    #[must_use]
    pub fn best_scenario(&self) -> Option<(&str, f64)> {
        self.scenarios
            .iter()
            .map(|(name, summary)| (name.as_str(), summary.tci))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Pretty JSON rendering.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing aggregate result")
    }

    /// Writes pretty JSON to `path`, creating parent directories.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, self.to_json_string()?)
            .with_context(|| format!("writing report {}", path.display()))
    }

    /// Reads a report written by [`Self::write_json`].
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading report {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing report {}", path.display()))
    }
}
