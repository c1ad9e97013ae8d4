use std::sync::Arc;

use qrisk_simulationengine::{
    scenarios::FnStrategy, AggregateResult, ConfigError, ReferenceData, SimulationConfig,
    SimulationEngine, SimulationError, SimulationTelemetry,
};
use shared_event_bus::{FileEventPublisher, MemoryEventBus};
use shared_logging::{JsonLogger, LogLevel};
use tempfile::tempdir;

fn run(config: SimulationConfig) -> AggregateResult {
    SimulationEngine::builder()
        .config(config)
        .build()
        .unwrap()
        .run()
        .unwrap()
}

fn noiseless(trials: usize) -> SimulationConfig {
    let mut config = SimulationConfig {
        trials,
        seed: Some(42),
        ..SimulationConfig::default()
    };
    config.capability.noise_scale = 0.0;
    config
}

#[test]
fn same_seed_gives_identical_means() {
    let config = SimulationConfig {
        trials: 200,
        seed: Some(7),
        ..SimulationConfig::default()
    };
    let (a, b) = (run(config.clone()), run(config));
    assert_eq!(a.capability.mean, b.capability.mean);
    for (name, summary) in &a.algorithms {
        assert_eq!(summary.risk.mean, b.algorithms[name].risk.mean);
    }
    for (name, summary) in &a.scenarios {
        assert_eq!(summary.assurance.mean, b.scenarios[name].assurance.mean);
        assert_eq!(summary.tci, b.scenarios[name].tci);
    }
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn different_seeds_differ() {
    let base = SimulationConfig {
        trials: 50,
        ..SimulationConfig::default()
    };
    let a = run(SimulationConfig { seed: Some(1), ..base.clone() });
    let b = run(SimulationConfig { seed: Some(2), ..base });
    assert_ne!(a.capability.mean, b.capability.mean);
}

#[test]
fn single_deterministic_trial() {
    let mut config = noiseless(1);
    config.years = 5;
    config.capability.growth_spread = 0.0;
    let result = run(config);
    let capability = &result.capability.mean;
    assert_eq!(capability.len(), 5);
    assert!(capability.windows(2).all(|w| w[1] > w[0]));
    let rsa = &result.algorithms["RSA-2048"].risk.mean;
    assert!(rsa[0] < 1e-3);
    for (c, r) in capability.iter().zip(rsa) {
        if *c < 10.0 {
            assert!(*r < 0.5);
        }
    }
    assert_eq!(result.algorithms["RSA-2048"].critical_year, None);
}

#[test]
fn reference_tci_values() {
    let result = run(noiseless(200));
    let expected = [
        ("Aggressive", 0.874),
        ("Conservative", 0.894),
        ("Late_Start", 0.854),
    ];
    for (scenario, tci) in expected {
        let observed = result.tci(scenario).unwrap();
        assert!((observed - tci).abs() < 1e-3, "{scenario}: {observed}");
    }
    assert_eq!(result.best_scenario().map(|(name, _)| name), Some("Conservative"));
}

#[test]
fn rsa_breaks_within_default_horizon() {
    let result = run(noiseless(200));
    let rsa = &result.algorithms["RSA-2048"];
    assert!(matches!(rsa.critical_year, Some(10 | 11)));
    assert_eq!(result.algorithms["Kyber-512"].critical_year, None);
    let series = &rsa.risk;
    for year in 0..series.mean.len() {
        assert!(series.lower[year] <= series.mean[year] + 1e-9);
        assert!(series.mean[year] <= series.upper[year] + 1e-9);
    }
}

#[test]
fn contract_violation_names_scenario() {
    let mut config = noiseless(3);
    config.scenarios = vec!["Conservative".into(), "Broken".into()];
    let engine = SimulationEngine::builder()
        .config(config)
        .strategy(Arc::new(FnStrategy::new("Broken", |year| if year > 2.0 { f64::NAN } else { 0.1 })))
        .build()
        .unwrap();
    match engine.run() {
        Err(SimulationError::ScenarioContract { scenario, trial, reason }) => {
            assert_eq!(scenario, "Broken");
            assert_eq!(trial, 0);
            assert!(reason.contains("year 3"));
        }
        other => panic!("expected contract violation, got {other:?}"),
    }
}

#[test]
fn invalid_configuration_is_rejected_at_build() {
    let mut bad_weights = SimulationConfig::default();
    bad_weights.assurance.weights.strength = 0.9;
    let cases = [
        (SimulationConfig { trials: 0, ..SimulationConfig::default() }, ConfigError::NoTrials),
        (SimulationConfig { years: 0, ..SimulationConfig::default() }, ConfigError::EmptyHorizon),
        (SimulationConfig { algorithms: Vec::new(), ..SimulationConfig::default() }, ConfigError::NoAlgorithms),
    ];
    for (config, expected) in cases {
        let err = SimulationEngine::builder().config(config).build().unwrap_err();
        assert_eq!(err, SimulationError::Config(expected));
    }
    assert!(matches!(
        SimulationEngine::builder().config(bad_weights).build(),
        Err(SimulationError::Config(ConfigError::WeightSum { .. }))
    ));
}

#[test]
fn retained_trials_match_aggregates() {
    let mut config = noiseless(25);
    config.years = 8;
    config.retain_trials = true;
    let result = run(config);
    let raw = result.raw_trials.as_ref().unwrap();
    assert_eq!(raw.len(), 25);
    let mean_tci = raw
        .iter()
        .map(|trial| trial.scenarios["Aggressive"].tci)
        .sum::<f64>()
        / raw.len() as f64;
    assert!((mean_tci - result.tci("Aggressive").unwrap()).abs() < 1e-12);
    assert!(raw.iter().all(|trial| trial.growth_rate.is_some()));
    let first_year: Vec<f64> = raw.iter().map(|trial| trial.capability[0]).collect();
    let max = first_year.iter().copied().fold(f64::MIN, f64::max);
    assert!(result.capability.upper[0] <= max);
}

#[test]
fn blended_strength_lowers_assurance() {
    let target_only = run(noiseless(50));
    let mut blended = noiseless(50);
    blended.assurance.legacy_algorithm = Some("RSA-2048".into());
    let blended = run(blended);
    for name in ["Aggressive", "Conservative", "Late_Start"] {
        assert!(blended.tci(name).unwrap() < target_only.tci(name).unwrap());
    }
}

#[test]
fn threshold_statistics() {
    let mut config = noiseless(20);
    config.assurance.threshold = 0.8;
    let result = run(config);
    let late = result.scenario("Late_Start").unwrap();
    assert!(late.years_below_threshold.starts_with(&[1, 2, 3]));
    assert_eq!(late.breach_probability, 1.0);
}

#[test]
fn projection_replaces_growth_draw() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("reference.toml");
    std::fs::write(
        &path,
        "[[projections]]\nyear = 1.0\nlog_capability = 6.0\n\n[[projections]]\nyear = 5.0\nlog_capability = 14.0\n",
    )
    .unwrap();
    let mut config = noiseless(5);
    config.years = 5;
    ReferenceData::load(&path).unwrap().apply(&mut config);
    let result = run(config);
    assert_eq!(result.capability.mean, vec![6.0, 8.0, 10.0, 12.0, 14.0]);
    assert_eq!(result.algorithms["RSA-2048"].critical_year, Some(4));
}

#[test]
fn telemetry_records_run_lifecycle() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("qrisk.log");
    let events_path = dir.path().join("events.jsonl");
    let telemetry = SimulationTelemetry::builder("qrisk")
        .logger(JsonLogger::new(&log_path).unwrap().with_min_level(LogLevel::Info))
        .event_publisher(Arc::new(FileEventPublisher::new(&events_path).unwrap()))
        .build()
        .unwrap();
    SimulationEngine::builder()
        .config(noiseless(10))
        .telemetry(telemetry)
        .build()
        .unwrap()
        .run()
        .unwrap();
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert!(log.contains("simulation.run.start"));
    assert!(log.contains("simulation.run.completed"));
    assert!(!log.contains("simulation.trial.progress"));
    let events = std::fs::read_to_string(&events_path).unwrap();
    assert_eq!(events.lines().count(), 1);
    assert!(events.contains("simulation.run.completed"));
}

#[test]
fn memory_bus_sees_failure_event() {
    let bus = Arc::new(MemoryEventBus::new(4));
    let telemetry = SimulationTelemetry::builder("qrisk")
        .event_publisher(bus.clone())
        .build()
        .unwrap();
    let mut config = noiseless(2);
    config.scenarios = vec!["Negative".into()];
    let engine = SimulationEngine::builder()
        .config(config)
        .telemetry(telemetry)
        .strategy(Arc::new(FnStrategy::new("Negative", |_| -0.5)))
        .build()
        .unwrap();
    assert!(engine.run().is_err());
    assert_eq!(bus.of_type("simulation.run.failed").len(), 1);
    assert!(bus.of_type("simulation.run.completed").is_empty());
}
