use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    config::SimulationConfig,
    error::{ConfigError, SimulationResult},
    helper::{random_seed, SimulationTelemetry},
    runtime::SimulationEngine,
    scenarios::CoverageStrategy,
};

use super::report::AggregateResult;

/// Parameter varied by a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityParameter {
    /// Mean annual capability growth.
    GrowthMean,
    /// Logistic sensitivity of the risk function.
    Alpha,
    /// Attack cost of the named algorithm.
    AttackCost(String),
}

impl SensitivityParameter {
    /// Short label used in logs and tables.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::GrowthMean => "growth_mean".into(),
            Self::Alpha => "alpha".into(),
            Self::AttackCost(name) => format!("attack_cost[{name}]"),
        }
    }

    /// Writes `value` into the parameter's slot of `config`.
    pub fn apply(&self, config: &mut SimulationConfig, value: f64) -> Result<(), ConfigError> {
        match self {
            Self::GrowthMean => config.capability.growth_mean = value,
            Self::Alpha => config.alpha = value,
            Self::AttackCost(name) => {
                let algo = config
                    .algorithms
                    .iter_mut()
                    .find(|algo| &algo.name == name)
                    .ok_or_else(|| ConfigError::UnknownAlgorithm(name.clone()))?;
                algo.attack_cost = value;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SensitivityParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for SensitivityParameter {
    type Err = String;

    /// Accepts `growth`, `growth_mean`, `alpha`, or `cost:<algorithm>`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "growth" | "growth_mean" => Ok(Self::GrowthMean),
            "alpha" => Ok(Self::Alpha),
            other => other
                .strip_prefix("cost:")
                .filter(|name| !name.is_empty())
                .map(|name| Self::AttackCost(name.to_string()))
                .ok_or_else(|| format!("unknown sensitivity parameter `{other}`")),
        }
    }
}

/// Outcome at one parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityPoint {
    /// Parameter value.
    pub value: f64,
    /// Critical year per algorithm.
    pub critical_years: IndexMap<String, Option<u32>>,
    /// Mean risk in the final year per algorithm.
    pub final_risk: IndexMap<String, f64>,
    /// TCI per scenario.
    pub tci: IndexMap<String, f64>,
}

impl SensitivityPoint {
    fn from_result(value: f64, result: &AggregateResult) -> Self {
        Self {
            value,
            critical_years: result
                .algorithms
                .iter()
                .map(|(name, summary)| (name.clone(), summary.critical_year))
                .collect(),
            final_risk: result
                .algorithms
                .iter()
                .map(|(name, summary)| {
                    (name.clone(), summary.risk.mean.last().copied().unwrap_or_default())
                })
                .collect(),
            tci: result
                .scenarios
                .iter()
                .map(|(name, summary)| (name.clone(), summary.tci))
                .collect(),
        }
    }
}

/// Result of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    /// Swept parameter.
    pub parameter: SensitivityParameter,
    /// Seed shared by every point.
    pub seed: u64,
    /// Trials per point.
    pub trials: usize,
    /// Points in input order.
    pub points: Vec<SensitivityPoint>,
    /// Timestamp.
    pub generated_at: DateTime<Utc>,
}

/// Re-runs a base configuration across parameter values.
///
/// Every point reuses the same master seed, so differences between points come from
/// the parameter rather than from sampling.
pub struct SensitivityAnalyzer {
    base: SimulationConfig,
    strategies: Vec<Arc<dyn CoverageStrategy>>,
    telemetry: Option<SimulationTelemetry>,
}

impl SensitivityAnalyzer {
    /// Creates an analyzer around a base configuration.
    #[must_use]
    pub fn new(base: SimulationConfig) -> Self {
        Self {
            base,
            strategies: Vec::new(),
            telemetry: None,
        }
    }

    /// Sets telemetry; the sweep logs one record per point and a completion event.
    #[must_use]
    pub fn telemetry(mut self, telemetry: SimulationTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Registers a strategy for every point's engine.
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn CoverageStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Runs one simulation per value.
    pub fn sweep(&self, parameter: &SensitivityParameter, values: &[f64]) -> SimulationResult<SensitivityReport> {
        let seed = self.base.seed.unwrap_or_else(random_seed);
        let mut points = Vec::with_capacity(values.len());
        for &value in values {
            let mut config = SimulationConfig {
                seed: Some(seed),
                ..self.base.clone()
            };
            parameter.apply(&mut config, value)?;
            let engine = self
                .strategies
                .iter()
                .cloned()
                .fold(SimulationEngine::builder().config(config), |builder, strategy| {
                    builder.strategy(strategy)
                })
                .build()?;
            let point = SensitivityPoint::from_result(value, &engine.run()?);
            if let Some(tel) = &self.telemetry {
                let _ = tel.log(
                    LogLevel::Info,
                    "simulation.sensitivity.point",
                    json!({ "parameter": parameter.label(), "value": value, "tci": point.tci }),
                );
            }
            points.push(point);
        }
        let report = SensitivityReport {
            parameter: parameter.clone(),
            seed,
            trials: self.base.trials,
            points,
            generated_at: Utc::now(),
        };
        if let Some(tel) = &self.telemetry {
            let _ = tel.event(
                "simulation.sensitivity.completed",
                json!({ "parameter": parameter.label(), "points": report.points.len(), "seed": seed }),
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use shared_event_bus::MemoryEventBus;

    fn base() -> SimulationConfig {
        let mut config = SimulationConfig {
            trials: 30,
            years: 15,
            seed: Some(42),
            ..SimulationConfig::default()
        };
        config.capability.noise_scale = 0.0;
        config
    }

    #[test]
    fn parses_parameters() {
        assert_eq!("growth".parse(), Ok(SensitivityParameter::GrowthMean));
        assert_eq!("alpha".parse(), Ok(SensitivityParameter::Alpha));
        assert_eq!(
            "cost:RSA-2048".parse(),
            Ok(SensitivityParameter::AttackCost("RSA-2048".into()))
        );
        assert!("cost:".parse::<SensitivityParameter>().is_err());
    }

    #[test]
    fn faster_growth_brings_critical_year_forward() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let telemetry = SimulationTelemetry::builder("sensitivity")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let report = SensitivityAnalyzer::new(base())
            .telemetry(telemetry)
            .sweep(&SensitivityParameter::GrowthMean, &[0.3, 0.5, 0.8])
            .unwrap();
        let years: Vec<u32> = report
            .points
            .iter()
            .map(|point| point.critical_years["RSA-2048"].unwrap_or(u32::MAX))
            .collect();
        assert!(years[0] >= years[1] && years[1] >= years[2]);
        assert_eq!(bus.of_type("simulation.sensitivity.completed").len(), 1);
        assert_eq!(report.seed, 42);
    }

    #[test]
    fn higher_cost_lowers_final_risk() {
        let report = SensitivityAnalyzer::new(base())
            .sweep(&SensitivityParameter::AttackCost("RSA-2048".into()), &[8.0, 10.0, 12.0])
            .unwrap();
        let risks: Vec<f64> = report.points.iter().map(|p| p.final_risk["RSA-2048"]).collect();
        assert!(risks.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        let err = SensitivityAnalyzer::new(base())
            .sweep(&SensitivityParameter::AttackCost("DSA".into()), &[1.0])
            .unwrap_err();
        assert_eq!(err, SimulationError::Config(ConfigError::UnknownAlgorithm("DSA".into())));
    }

    #[test]
    fn invalid_alpha_is_rejected() {
        let err = SensitivityAnalyzer::new(base())
            .sweep(&SensitivityParameter::Alpha, &[0.0])
            .unwrap_err();
        assert!(matches!(err, SimulationError::Config(ConfigError::InvalidParameter { name: "alpha", .. })));
    }
}
