//! Adversarial capability growth on the log10 scale.

use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, SimulationError, SimulationResult},
    time_axis::TimeAxis,
};

/// Parameters of the stochastic growth process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilityParams {
    /// Capability at year zero, log10 operations.
    pub initial_log: f64,
    /// Mean of the per-trial growth rate (log10 units per year).
    pub growth_mean: f64,
    /// Standard deviation of the per-trial growth rate.
    pub growth_spread: f64,
    /// Standard deviation of the independent per-year noise.
    pub noise_scale: f64,
}

impl Default for CapabilityParams {
    fn default() -> Self {
        Self {
            initial_log: 5.0,
            growth_mean: 0.5,
            growth_spread: 0.1,
            noise_scale: 0.05,
        }
    }
}

impl CapabilityParams {
    /// Checks that every parameter is finite and spreads are non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("capability.initial_log", self.initial_log),
            ("capability.growth_mean", self.growth_mean),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::InvalidParameter {
                    name,
                    value,
                    expected: "finite",
                });
            }
        }
        for (name, value) in [
            ("capability.growth_spread", self.growth_spread),
            ("capability.noise_scale", self.noise_scale),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidParameter {
                    name,
                    value,
                    expected: "finite and >= 0",
                });
            }
        }
        Ok(())
    }
}

/// One point of an external capability projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPoint {
    /// Year index.
    pub year: f64,
    /// Projected log10 capability for that year.
    pub log_capability: f64,
}

/// Externally sourced capability projection, linearly interpolated between years.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionTable {
    points: Vec<ProjectionPoint>,
}

impl ProjectionTable {
    /// Sorts and validates the points.
    pub fn new(mut points: Vec<ProjectionPoint>) -> Result<Self, ConfigError> {
        if points.is_empty() {
            return Err(ConfigError::InvalidProjection("no points".into()));
        }
        if let Some(bad) = points
            .iter()
            .find(|p| !p.year.is_finite() || !p.log_capability.is_finite())
        {
            return Err(ConfigError::InvalidProjection(format!(
                "non-finite point at year {}",
                bad.year
            )));
        }
        points.sort_by(|a, b| a.year.total_cmp(&b.year));
        if let Some(pair) = points.windows(2).find(|w| w[0].year == w[1].year) {
            return Err(ConfigError::InvalidProjection(format!(
                "year {} listed twice",
                pair[0].year
            )));
        }
        Ok(Self { points })
    }

    /// Projected capability at `year`; flat beyond the first and last points.
    #[must_use]
    pub fn value_at(&self, year: f64) -> f64 {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if year <= first.year {
            return first.log_capability;
        }
        if year >= last.year {
            return last.log_capability;
        }
        let upper = self.points.partition_point(|p| p.year <= year);
        let (lo, hi) = (self.points[upper - 1], self.points[upper]);
        let fraction = (year - lo.year) / (hi.year - lo.year);
        lo.log_capability + fraction * (hi.log_capability - lo.log_capability)
    }

    /// Points in year order.
    #[must_use]
    pub fn points(&self) -> &[ProjectionPoint] {
        &self.points
    }
}

/// Where the deterministic part of a trajectory comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilitySource {
    /// `initial + g * t` with `g` drawn once per trial.
    Stochastic,
    /// External projection table; only per-year noise is drawn.
    Projection(ProjectionTable),
}

/// One trial's draw.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityDraw {
    /// Growth rate drawn for the trial, `None` when following a projection.
    pub growth_rate: Option<f64>,
    /// Log10 capability per year.
    pub trajectory: Vec<f64>,
}

/// Deterministic trajectory: `initial + growth_rate * t + noise[t]`.
#[must_use]
pub fn capability_trajectory(initial_log: f64, growth_rate: f64, axis: &TimeAxis, noise: &[f64]) -> Vec<f64> {
    axis.iter_f64()
        .zip(noise)
        .map(|(year, eps)| initial_log + growth_rate * year + eps)
        .collect()
}

/// Samples capability trajectories.
#[derive(Debug, Clone)]
pub struct CapabilityModel {
    params: CapabilityParams,
    source: CapabilitySource,
    growth: Normal<f64>,
    noise: Normal<f64>,
}

impl CapabilityModel {
    /// Builds the sampling distributions.
    pub fn new(params: CapabilityParams, source: CapabilitySource) -> SimulationResult<Self> {
        params.validate()?;
        let growth = Normal::new(params.growth_mean, params.growth_spread)
            .map_err(|err| SimulationError::Distribution(format!("growth rate: {err}")))?;
        let noise = Normal::new(0.0, params.noise_scale)
            .map_err(|err| SimulationError::Distribution(format!("noise: {err}")))?;
        Ok(Self {
            params,
            source,
            growth,
            noise,
        })
    }

    /// Parameters in use.
    #[must_use]
    pub fn params(&self) -> &CapabilityParams {
        &self.params
    }

    /// Draws one trajectory. The growth rate is drawn first, then one noise term per year.
    pub fn draw<R: Rng + ?Sized>(&self, axis: &TimeAxis, rng: &mut R) -> CapabilityDraw {
        match &self.source {
            CapabilitySource::Stochastic => {
                let growth_rate = self.growth.sample(rng);
                let noise = self.sample_noise(axis, rng);
                CapabilityDraw {
                    growth_rate: Some(growth_rate),
                    trajectory: capability_trajectory(self.params.initial_log, growth_rate, axis, &noise),
                }
            }
            CapabilitySource::Projection(table) => {
                let noise = self.sample_noise(axis, rng);
                let trajectory = axis
                    .iter_f64()
                    .zip(noise)
                    .map(|(year, eps)| table.value_at(year) + eps)
                    .collect();
                CapabilityDraw {
                    growth_rate: None,
                    trajectory,
                }
            }
        }
    }

    fn sample_noise<R: Rng + ?Sized>(&self, axis: &TimeAxis, rng: &mut R) -> Vec<f64> {
        (0..axis.len()).map(|_| self.noise.sample(rng)).collect()
    }
}
