use std::{
    fs,
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use qrisk_simulationengine::{
    scenarios::ScenarioCatalog, time_axis::TimeAxis, AggregateResult, ReferenceData,
    SensitivityAnalyzer, SensitivityParameter, SensitivityReport, SimulationConfig,
    SimulationEngine, SimulationTelemetry,
};
use shared_event_bus::FileEventPublisher;
use shared_logging::{JsonLogger, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "qrisk", version, about = "Post-quantum migration risk simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs a Monte Carlo simulation and writes report.json.
    Run(RunArgs),
    /// Sweeps one parameter and writes sensitivity.json.
    Sensitivity(SensitivityArgs),
    /// Prints the coverage curve of every built-in scenario.
    Scenarios {
        /// Horizon to print.
        #[arg(long, default_value_t = 15)]
        years: usize,
    },
}

#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// TOML simulation config; defaults apply when absent.
    #[arg(long)]
    config: Option<PathBuf>,
    /// TOML reference data (algorithm costs, capability projection).
    #[arg(long)]
    reference: Option<PathBuf>,
    #[arg(long)]
    trials: Option<usize>,
    #[arg(long)]
    years: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Per-year capability noise (log10 units).
    #[arg(long)]
    noise: Option<f64>,
    /// Keep every trial's series in the report.
    #[arg(long)]
    retain_trials: bool,
}

#[derive(Args, Debug, Clone)]
struct OutputArgs {
    #[arg(long, default_value = "qrisk-out")]
    output_dir: PathBuf,
    /// Also log per-trial progress.
    #[arg(long)]
    verbose: bool,
    /// JSONL file receiving lifecycle events.
    #[arg(long)]
    event_log: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,
    #[command(flatten)]
    output: OutputArgs,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum ParameterKind {
    Growth,
    Alpha,
    Cost,
}

#[derive(Args, Debug)]
struct SensitivityArgs {
    #[arg(long, value_enum)]
    parameter: ParameterKind,
    /// Algorithm whose attack cost is swept with `--parameter cost`.
    #[arg(long, default_value = "RSA-2048")]
    algorithm: String,
    #[arg(long, value_delimiter = ',', required = true)]
    values: Vec<f64>,
    #[command(flatten)]
    config: ConfigArgs,
    #[command(flatten)]
    output: OutputArgs,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => handle_run(&args),
        Commands::Sensitivity(args) => handle_sensitivity(&args),
        Commands::Scenarios { years } => print_scenarios(years),
    }
}

fn handle_run(args: &RunArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let telemetry = build_telemetry(&args.output)?;
    let engine = SimulationEngine::builder()
        .config(config)
        .telemetry(telemetry)
        .build()?;
    let result = engine.run()?;
    let report_path = args.output.output_dir.join("report.json");
    result.write_json(&report_path)?;
    print_summary(&result);
    println!("report written to {}", report_path.display());
    Ok(())
}

fn handle_sensitivity(args: &SensitivityArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let parameter = match args.parameter {
        ParameterKind::Growth => SensitivityParameter::GrowthMean,
        ParameterKind::Alpha => SensitivityParameter::Alpha,
        ParameterKind::Cost => SensitivityParameter::AttackCost(args.algorithm.clone()),
    };
    let report = SensitivityAnalyzer::new(config)
        .telemetry(build_telemetry(&args.output)?)
        .sweep(&parameter, &args.values)?;
    let path = args.output.output_dir.join("sensitivity.json");
    fs::create_dir_all(&args.output.output_dir)
        .with_context(|| format!("creating {}", args.output.output_dir.display()))?;
    fs::write(&path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("writing {}", path.display()))?;
    print_sweep(&report);
    println!("sensitivity written to {}", path.display());
    Ok(())
}

fn load_config(args: &ConfigArgs) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::load(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(path) = &args.reference {
        ReferenceData::load(path)?.apply(&mut config);
    }
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut SimulationConfig, args: &ConfigArgs) {
    if let Some(trials) = args.trials {
        config.trials = trials;
    }
    if let Some(years) = args.years {
        config.years = years;
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(noise) = args.noise {
        config.capability.noise_scale = noise;
    }
    if args.retain_trials {
        config.retain_trials = true;
    }
}

fn build_telemetry(args: &OutputArgs) -> Result<SimulationTelemetry> {
    let level = if args.verbose { LogLevel::Debug } else { LogLevel::Info };
    let log_path = args.output_dir.join("qrisk.log");
    let logger = JsonLogger::new(&log_path)
        .with_context(|| format!("opening log {}", log_path.display()))?
        .with_min_level(level);
    let mut builder = SimulationTelemetry::builder("qrisk").logger(logger);
    if let Some(path) = &args.event_log {
        builder = builder.event_publisher(Arc::new(FileEventPublisher::new(path)?));
    }
    builder.build()
}

fn print_summary(result: &AggregateResult) {
    let probe = result.years.len().min(5);
    println!(
        "run {} | seed {} | {} trials x {} years",
        result.run_id,
        result.seed,
        result.trials,
        result.years.len()
    );
    println!("{:<16} {:>10} {:>14}", "algorithm", format!("risk@y{probe}"), "critical year");
    for (name, summary) in &result.algorithms {
        let risk = result
            .risk_at(name, u32::try_from(probe).unwrap_or(u32::MAX))
            .unwrap_or_default();
        let critical = summary
            .critical_year
            .map_or_else(|| "none".to_string(), |year| year.to_string());
        println!("{name:<16} {risk:>10.4} {critical:>14}");
    }
    println!("{:<20} {:>8} {:>8} {:>8}", "scenario", "TCI", "sd", "breach");
    for (name, summary) in &result.scenarios {
        println!(
            "{name:<20} {:>8.4} {:>8.4} {:>8.3}",
            summary.tci, summary.tci_std_dev, summary.breach_probability
        );
    }
}

fn print_sweep(report: &SensitivityReport) {
    println!(
        "{} sweep | seed {} | {} trials per point",
        report.parameter, report.seed, report.trials
    );
    for point in &report.points {
        let critical: Vec<String> = point
            .critical_years
            .iter()
            .map(|(name, year)| format!("{name}={}", year.map_or_else(|| "-".to_string(), |y| y.to_string())))
            .collect();
        let tci: Vec<String> = point
            .tci
            .iter()
            .map(|(name, value)| format!("{name}={value:.4}"))
            .collect();
        println!(
            "{:>10.3} | critical {} | tci {}",
            point.value,
            critical.join(" "),
            tci.join(" ")
        );
    }
}

fn print_scenarios(years: usize) -> Result<()> {
    let axis = TimeAxis::new(years)?;
    let catalog = ScenarioCatalog::builtin();
    for name in catalog.names() {
        let strategy = catalog.resolve(&name)?;
        let series: Vec<String> = strategy
            .coverage(&axis)
            .iter()
            .map(|value| format!("{value:.2}"))
            .collect();
        println!("{name:<20} {}", series.join(" "));
    }
    Ok(())
}
