use std::sync::Arc;

use crate::{
    advanced::AggregateResult,
    config::SimulationConfig,
    error::{ConfigError, SimulationResult},
    helper::{random_seed, SimulationTelemetry},
    scenarios::{CoverageStrategy, Piecewise, ScenarioCatalog},
    simulator::Simulator,
};

/// Validated, ready-to-run simulation.
#[derive(Debug)]
pub struct SimulationEngine {
    config: SimulationConfig,
    seed: u64,
    catalog: ScenarioCatalog,
    simulator: Simulator,
    telemetry: Option<SimulationTelemetry>,
}

impl SimulationEngine {
    /// Returns a builder.
    #[must_use]
    pub fn builder() -> SimulationEngineBuilder {
        SimulationEngineBuilder::default()
    }

    /// Runs every trial and aggregates the result.
    pub fn run(&self) -> SimulationResult<AggregateResult> {
        self.simulator.run(self.seed)
    }

    /// Master seed of this engine (configured or drawn at build time).
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Configuration the engine was built from.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Every strategy known to the engine, built-in or registered.
    #[must_use]
    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    /// Scenarios this engine evaluates, in order.
    #[must_use]
    pub fn scenario_names(&self) -> Vec<String> {
        self.simulator.scenario_names()
    }

    /// Returns telemetry handle.
    #[must_use]
    pub fn telemetry(&self) -> Option<&SimulationTelemetry> {
        self.telemetry.as_ref()
    }
}

/// Builder for `SimulationEngine`.
#[derive(Default)]
pub struct SimulationEngineBuilder {
    config: SimulationConfig,
    telemetry: Option<SimulationTelemetry>,
    strategies: Vec<Arc<dyn CoverageStrategy>>,
}

impl SimulationEngineBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: SimulationTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Registers a strategy so configuration can name it.
    #[must_use]
    pub fn strategy(mut self, strategy: Arc<dyn CoverageStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Validates the configuration, resolves scenarios and fixes the seed.
    pub fn build(self) -> SimulationResult<SimulationEngine> {
        self.config.validate()?;
        if self.config.scenarios.is_empty() {
            return Err(ConfigError::NoScenarios.into());
        }
        let mut catalog = ScenarioCatalog::builtin();
        for custom in &self.config.custom_scenarios {
            catalog.register(Arc::new(Piecewise::new(custom)?))?;
        }
        for strategy in self.strategies {
            catalog.register(strategy)?;
        }
        let scenarios = self
            .config
            .scenarios
            .iter()
            .map(|name| catalog.resolve(name))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let seed = self.config.seed.unwrap_or_else(random_seed);
        let simulator = Simulator::new(&self.config, scenarios, self.telemetry.clone())?;
        Ok(SimulationEngine {
            config: self.config,
            seed,
            catalog,
            simulator,
            telemetry: self.telemetry,
        })
    }
}
