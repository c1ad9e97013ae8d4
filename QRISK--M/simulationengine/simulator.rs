use std::sync::Arc;

use chrono::Utc;
use indexmap::IndexMap;
use serde_json::json;
use shared_logging::LogLevel;
use uuid::Uuid;

use crate::{
    advanced::{AggregateResult, AlgorithmSummary, ScenarioSummary, TrialRecord, TrialScenario},
    assurance::{blended_risk, trust_continuity_index, AssuranceModel},
    capability::CapabilityModel,
    config::{Algorithm, SimulationConfig},
    error::{ConfigError, SimulationResult},
    helper::{trial_rng, SimulationTelemetry},
    risk::{critical_year, risk_series},
    scenarios::{check_coverage, CoverageStrategy},
    stats::{PercentileBand, RunningStats, SeriesAccumulator},
    time_axis::TimeAxis,
};

/// Which risk series feeds the algorithm strength metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrengthBasis {
    /// Risk of the target algorithm (index into the algorithm list).
    Target(usize),
    /// Coverage-weighted mix of a legacy and the target algorithm.
    Blended {
        /// Legacy algorithm index.
        legacy: usize,
        /// Target algorithm index.
        target: usize,
    },
}

impl StrengthBasis {
    /// Resolves the basis from the assurance settings.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ConfigError> {
        let index = |name: &str| {
            config
                .algorithms
                .iter()
                .position(|algo| algo.name == name)
                .ok_or_else(|| ConfigError::UnknownAlgorithm(name.to_string()))
        };
        let target = index(&config.assurance.target_algorithm)?;
        Ok(match &config.assurance.legacy_algorithm {
            Some(legacy) => Self::Blended {
                legacy: index(legacy)?,
                target,
            },
            None => Self::Target(target),
        })
    }

    /// Risk series used for strength, given every algorithm's risk and the coverage.
    #[must_use]
    pub fn strength_risk(&self, risks: &[Vec<f64>], coverage: &[f64]) -> Vec<f64> {
        match *self {
            Self::Target(target) => risks[target].clone(),
            Self::Blended { legacy, target } => coverage
                .iter()
                .zip(risks[legacy].iter().zip(&risks[target]))
                .map(|(&cov, (&legacy, &target))| blended_risk(cov, legacy, target))
                .collect(),
        }
    }
}

struct ScenarioAccumulator {
    coverage: SeriesAccumulator,
    assurance: SeriesAccumulator,
    tci: RunningStats,
    breaches: usize,
}

/// Runs the Monte Carlo trials and folds them into an [`AggregateResult`].
#[derive(Debug)]
pub struct Simulator {
    axis: TimeAxis,
    trials: usize,
    alpha: f64,
    algorithms: Vec<Algorithm>,
    capability: CapabilityModel,
    assurance: AssuranceModel,
    basis: StrengthBasis,
    threshold: f64,
    scenarios: Vec<Arc<dyn CoverageStrategy>>,
    band: PercentileBand,
    retain_trials: bool,
    progress_interval: usize,
    telemetry: Option<SimulationTelemetry>,
}

impl Simulator {
    /// Validates the configuration and builds the models.
    pub fn new(
        config: &SimulationConfig,
        scenarios: Vec<Arc<dyn CoverageStrategy>>,
        telemetry: Option<SimulationTelemetry>,
    ) -> SimulationResult<Self> {
        config.validate()?;
        if scenarios.is_empty() {
            return Err(ConfigError::NoScenarios.into());
        }
        let assurance = AssuranceModel::new(
            config.assurance.weights,
            config.assurance.key_management,
            config.assurance.crypto_agility,
        )?;
        Ok(Self {
            axis: TimeAxis::new(config.years)?,
            trials: config.trials,
            alpha: config.alpha,
            algorithms: config.algorithms.clone(),
            capability: CapabilityModel::new(config.capability.clone(), config.capability_source()?)?,
            assurance,
            basis: StrengthBasis::from_config(config)?,
            threshold: config.assurance.threshold,
            scenarios,
            band: config.band,
            retain_trials: config.retain_trials,
            progress_interval: config.progress_interval,
            telemetry,
        })
    }

    /// Time axis of the run.
    #[must_use]
    pub fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    /// Scenario names in evaluation order.
    #[must_use]
    pub fn scenario_names(&self) -> Vec<String> {
        self.scenarios.iter().map(|s| s.name().to_string()).collect()
    }

    /// Runs every trial with streams derived from `seed`.
    pub fn run(&self, seed: u64) -> SimulationResult<AggregateResult> {
        let run_id = Uuid::new_v4();
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "simulation.run.start",
                json!({
                    "run_id": run_id,
                    "seed": seed,
                    "trials": self.trials,
                    "years": self.axis.len(),
                    "scenarios": self.scenario_names(),
                }),
            );
        }
        let outcome = self.execute(run_id, seed);
        if let Some(tel) = &self.telemetry {
            match &outcome {
                Ok(result) => {
                    let tci: IndexMap<&str, f64> = result
                        .scenarios
                        .iter()
                        .map(|(name, summary)| (name.as_str(), summary.tci))
                        .collect();
                    let payload = json!({ "run_id": run_id, "seed": seed, "trials": self.trials, "tci": tci });
                    let _ = tel.log(LogLevel::Info, "simulation.run.completed", payload.clone());
                    let _ = tel.event("simulation.run.completed", payload);
                }
                Err(err) => {
                    let payload = json!({ "run_id": run_id, "seed": seed, "error": err.to_string() });
                    let _ = tel.log(LogLevel::Error, "simulation.run.failed", payload.clone());
                    let _ = tel.event("simulation.run.failed", payload);
                }
            }
        }
        outcome
    }

    fn accumulator(&self, label: String) -> SeriesAccumulator {
        if self.retain_trials {
            SeriesAccumulator::exact(label, self.axis.len(), self.band)
        } else {
            SeriesAccumulator::streaming(label, self.axis.len(), self.band)
        }
    }

    fn execute(&self, run_id: Uuid, seed: u64) -> SimulationResult<AggregateResult> {
        let horizon = self.axis.len();
        let mut capability = self.accumulator("capability".into());
        let mut risk: Vec<SeriesAccumulator> = self
            .algorithms
            .iter()
            .map(|algo| self.accumulator(format!("risk/{}", algo.name)))
            .collect();
        let mut scenarios: Vec<ScenarioAccumulator> = self
            .scenarios
            .iter()
            .map(|strategy| ScenarioAccumulator {
                coverage: self.accumulator(format!("coverage/{}", strategy.name())),
                assurance: self.accumulator(format!("assurance/{}", strategy.name())),
                tci: RunningStats::default(),
                breaches: 0,
            })
            .collect();
        let mut raw_trials = self.retain_trials.then(|| Vec::with_capacity(self.trials));

        for trial in 0..self.trials {
            let mut rng = trial_rng(seed, trial);
            let draw = self.capability.draw(&self.axis, &mut rng);
            let risks: Vec<Vec<f64>> = self
                .algorithms
                .iter()
                .map(|algo| risk_series(&draw.trajectory, algo.attack_cost, self.alpha))
                .collect();
            capability.push(&draw.trajectory)?;
            for (acc, series) in risk.iter_mut().zip(&risks) {
                acc.push(series)?;
            }

            let mut record = raw_trials.is_some().then(|| TrialRecord {
                trial,
                growth_rate: draw.growth_rate,
                capability: draw.trajectory.clone(),
                risk: self
                    .algorithms
                    .iter()
                    .map(|algo| algo.name.clone())
                    .zip(risks.iter().cloned())
                    .collect(),
                scenarios: IndexMap::new(),
            });

            for (strategy, acc) in self.scenarios.iter().zip(scenarios.iter_mut()) {
                let coverage = strategy.coverage(&self.axis);
                check_coverage(strategy.name(), trial, &coverage, horizon)?;
                let strength_risk = self.basis.strength_risk(&risks, &coverage);
                let cas = self.assurance.score_series(&self.axis, &strength_risk, &coverage);
                let tci = trust_continuity_index(&cas);
                acc.coverage.push(&coverage)?;
                acc.assurance.push(&cas)?;
                acc.tci.push(tci);
                if cas.iter().any(|&score| score < self.threshold) {
                    acc.breaches += 1;
                }
                if let Some(record) = record.as_mut() {
                    record.scenarios.insert(
                        strategy.name().to_string(),
                        TrialScenario {
                            coverage,
                            assurance: cas,
                            tci,
                        },
                    );
                }
            }

            if let (Some(raw), Some(record)) = (raw_trials.as_mut(), record) {
                raw.push(record);
            }
            self.report_progress(trial + 1);
        }

        let algorithms = self
            .algorithms
            .iter()
            .zip(risk)
            .map(|(algo, acc)| {
                let risk = acc.finish();
                let summary = AlgorithmSummary {
                    attack_cost: algo.attack_cost,
                    class: algo.class,
                    critical_year: critical_year(&risk.mean),
                    risk,
                };
                (algo.name.clone(), summary)
            })
            .collect();
        let scenarios = self
            .scenarios
            .iter()
            .zip(scenarios)
            .map(|(strategy, acc)| (strategy.name().to_string(), self.summarize(acc)))
            .collect();

        Ok(AggregateResult {
            run_id,
            generated_at: Utc::now(),
            seed,
            trials: self.trials,
            years: self.axis.years().to_vec(),
            band: self.band,
            threshold: self.threshold,
            capability: capability.finish(),
            algorithms,
            scenarios,
            raw_trials,
        })
    }

    fn summarize(&self, acc: ScenarioAccumulator) -> ScenarioSummary {
        let assurance = acc.assurance.finish();
        let years_below_threshold = self
            .axis
            .years()
            .iter()
            .zip(&assurance.mean)
            .filter(|&(_, &mean)| mean < self.threshold)
            .map(|(&year, _)| year)
            .collect();
        ScenarioSummary {
            coverage: acc.coverage.finish(),
            tci: acc.tci.mean(),
            tci_std_dev: acc.tci.std_dev(),
            years_below_threshold,
            breach_probability: acc.breaches as f64 / self.trials as f64,
            assurance,
        }
    }

    fn report_progress(&self, completed: usize) {
        let Some(tel) = &self.telemetry else {
            return;
        };
        if self.progress_interval == 0
            || completed % self.progress_interval != 0
            || !tel.enabled(LogLevel::Debug)
        {
            return;
        }
        let _ = tel.log(
            LogLevel::Debug,
            "simulation.trial.progress",
            json!({ "completed": completed, "total": self.trials }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use crate::scenarios::{Conservative, FnStrategy};
    use shared_event_bus::MemoryEventBus;
    use shared_logging::JsonLogger;
    use tempfile::tempdir;

    fn only(strategy: impl CoverageStrategy + 'static) -> Vec<Arc<dyn CoverageStrategy>> {
        let strategy: Arc<dyn CoverageStrategy> = Arc::new(strategy);
        vec![strategy]
    }

    fn small_config() -> SimulationConfig {
        SimulationConfig {
            trials: 20,
            years: 6,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn target_basis_defaults_to_kyber() {
        let config = SimulationConfig::default();
        assert_eq!(StrengthBasis::from_config(&config).unwrap(), StrengthBasis::Target(1));
    }

    #[test]
    fn blended_basis_mixes_by_coverage() {
        let basis = StrengthBasis::Blended { legacy: 0, target: 1 };
        let risks = vec![vec![0.8, 0.8], vec![0.0, 0.0]];
        assert_eq!(basis.strength_risk(&risks, &[0.0, 0.5]), vec![0.8, 0.4]);
    }

    #[test]
    fn runs_and_summarizes() {
        let simulator = Simulator::new(&small_config(), only(Conservative::default()), None).unwrap();
        let result = simulator.run(9).unwrap();
        assert_eq!(result.years, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(result.algorithms.len(), 2);
        let summary = &result.scenarios["Conservative"];
        assert!(summary.tci > 0.0 && summary.tci <= 1.0);
        assert!((0.0..=1.0).contains(&summary.breach_probability));
        assert!(result.raw_trials.is_none());
    }

    #[test]
    fn logs_progress_and_completion() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("sim.log");
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = SimulationTelemetry::builder("simulator")
            .logger(JsonLogger::new(&log_path).unwrap().with_min_level(LogLevel::Debug))
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let config = SimulationConfig {
            progress_interval: 5,
            ..small_config()
        };
        let simulator = Simulator::new(&config, only(Conservative::default()), Some(telemetry)).unwrap();
        simulator.run(1).unwrap();
        let log = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(log.matches("simulation.trial.progress").count(), 4);
        assert!(log.contains("simulation.run.completed"));
        assert_eq!(bus.of_type("simulation.run.completed").len(), 1);
    }

    #[test]
    fn contract_violation_aborts_and_reports() {
        let bus = Arc::new(MemoryEventBus::new(8));
        let telemetry = SimulationTelemetry::builder("simulator")
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        let broken = FnStrategy::new("Overshoot", |year: f64| year / 3.0);
        let simulator = Simulator::new(&small_config(), only(broken), Some(telemetry)).unwrap();
        let err = simulator.run(1).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::ScenarioContract { ref scenario, trial: 0, .. } if scenario == "Overshoot"
        ));
        assert_eq!(bus.of_type("simulation.run.failed").len(), 1);
    }

    #[test]
    fn rejects_invalid_config_before_running() {
        let empty = SimulationConfig {
            trials: 0,
            ..small_config()
        };
        let err = Simulator::new(&empty, only(Conservative::default()), None).unwrap_err();
        assert_eq!(err, SimulationError::Config(ConfigError::NoTrials));
        for alpha in [0.0, -3.0] {
            let inverted = SimulationConfig {
                alpha,
                ..small_config()
            };
            assert!(matches!(
                Simulator::new(&inverted, only(Conservative::default()), None),
                Err(SimulationError::Config(ConfigError::InvalidParameter { name: "alpha", .. }))
            ));
        }
    }

    #[test]
    fn requires_a_scenario() {
        let err = Simulator::new(&small_config(), Vec::new(), None).unwrap_err();
        assert_eq!(err, SimulationError::Config(ConfigError::NoScenarios));
    }
}
