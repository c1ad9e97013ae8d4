//! Composite assurance score (CAS) and trust continuity index (TCI).

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, time_axis::TimeAxis};

const WEIGHT_TOLERANCE: f64 = 1e-9;

/// Weights of the four CAS metrics. Must be non-negative and sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssuranceWeights {
    /// Algorithm strength.
    pub strength: f64,
    /// Key management posture.
    pub key_management: f64,
    /// Deployment coverage.
    pub coverage: f64,
    /// Crypto-agility.
    pub agility: f64,
}

impl Default for AssuranceWeights {
    fn default() -> Self {
        Self {
            strength: 0.40,
            key_management: 0.25,
            coverage: 0.20,
            agility: 0.15,
        }
    }
}

impl AssuranceWeights {
    /// Sum of the weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.strength + self.key_management + self.coverage + self.agility
    }

    /// Rejects negative or non-finite weights and totals away from one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("strength", self.strength),
            ("key_management", self.key_management),
            ("coverage", self.coverage),
            ("agility", self.agility),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        let sum = self.total();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

/// Configured metric that is not derived from the random draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricInput {
    /// Same value every year.
    Constant(f64),
    /// `start + slope * year`, clamped to `[0, 1]`.
    Linear {
        /// Value at year zero.
        start: f64,
        /// Change per year.
        slope: f64,
    },
}

impl MetricInput {
    /// Metric value for `year`.
    #[must_use]
    pub fn value_at(&self, year: f64) -> f64 {
        match *self {
            Self::Constant(value) => value,
            Self::Linear { start, slope } => (start + slope * year).clamp(0.0, 1.0),
        }
    }

    /// Constants must lie in `[0, 1]`; linear terms must be finite.
    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        match *self {
            Self::Constant(value) if !(0.0..=1.0).contains(&value) => Err(ConfigError::InvalidParameter {
                name,
                value,
                expected: "within [0, 1]",
            }),
            Self::Linear { start, slope } if !start.is_finite() || !slope.is_finite() => {
                Err(ConfigError::InvalidParameter {
                    name,
                    value: if start.is_finite() { slope } else { start },
                    expected: "finite start and slope",
                })
            }
            _ => Ok(()),
        }
    }
}

/// The four metric values for one year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssuranceMetrics {
    /// `1 - risk` of the deployed algorithm.
    pub strength: f64,
    /// Key management posture.
    pub key_management: f64,
    /// Fraction of systems migrated.
    pub coverage: f64,
    /// Crypto-agility index.
    pub agility: f64,
}

/// Algorithm strength metric from a residual risk.
#[must_use]
pub fn algorithm_strength(risk: f64) -> f64 {
    (1.0 - risk).clamp(0.0, 1.0)
}

/// Weighted CAS for one year.
///
/// The sum is divided by the weight total, which validation pins to one, so a
/// perfect posture scores exactly `1.0`. The result is clamped to `[0, 1]`.
/// Weights with no positive finite total score `0.0`.
#[must_use]
pub fn composite_score(weights: &AssuranceWeights, metrics: &AssuranceMetrics) -> f64 {
    let total = weights.total();
    if !total.is_finite() || total <= 0.0 {
        return 0.0;
    }
    let weighted = weights.strength * metrics.strength
        + weights.key_management * metrics.key_management
        + weights.coverage * metrics.coverage
        + weights.agility * metrics.agility;
    (weighted / total).clamp(0.0, 1.0)
}

/// Time average of a CAS series. Zero for an empty series.
#[must_use]
pub fn trust_continuity_index(cas: &[f64]) -> f64 {
    if cas.is_empty() {
        return 0.0;
    }
    cas.iter().sum::<f64>() / cas.len() as f64
}

/// Risk of a partially migrated estate: `(1 - L) * legacy + L * target`.
#[must_use]
pub fn blended_risk(coverage: f64, legacy_risk: f64, target_risk: f64) -> f64 {
    (1.0 - coverage) * legacy_risk + coverage * target_risk
}

/// Computes CAS series from risk and coverage series.
#[derive(Debug, Clone, PartialEq)]
pub struct AssuranceModel {
    weights: AssuranceWeights,
    key_management: MetricInput,
    agility: MetricInput,
}

impl AssuranceModel {
    /// Validates the weights and metric inputs.
    pub fn new(
        weights: AssuranceWeights,
        key_management: MetricInput,
        agility: MetricInput,
    ) -> Result<Self, ConfigError> {
        weights.validate()?;
        key_management.validate("assurance.key_management")?;
        agility.validate("assurance.crypto_agility")?;
        Ok(Self {
            weights,
            key_management,
            agility,
        })
    }

    /// Weights in use.
    #[must_use]
    pub fn weights(&self) -> &AssuranceWeights {
        &self.weights
    }

    /// CAS per year. `strength_risk` and `coverage` are indexed like `axis`.
    #[must_use]
    pub fn score_series(&self, axis: &TimeAxis, strength_risk: &[f64], coverage: &[f64]) -> Vec<f64> {
        axis.iter_f64()
            .zip(strength_risk.iter().zip(coverage))
            .map(|(year, (&risk, &coverage))| {
                composite_score(
                    &self.weights,
                    &AssuranceMetrics {
                        strength: algorithm_strength(risk),
                        key_management: self.key_management.value_at(year),
                        coverage,
                        agility: self.agility.value_at(year),
                    },
                )
            })
            .collect()
    }
}
