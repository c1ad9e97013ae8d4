//! Migration strategies: deployment coverage of post-quantum cryptography over time.

use std::{fmt, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ConfigError, SimulationError, SimulationResult},
    time_axis::TimeAxis,
};

/// Coverage policy: fraction of systems migrated per year.
///
/// Implementations should return values in `[0, 1]`; the engine checks every
/// series it receives and aborts the run on a violation.
pub trait CoverageStrategy: Send + Sync {
    /// Display name, also the key in reports.
    fn name(&self) -> &str;

    /// Coverage at a (possibly fractional) year.
    fn coverage_at(&self, year: f64) -> f64;

    /// Coverage over the whole axis.
    fn coverage(&self, axis: &TimeAxis) -> Vec<f64> {
        axis.iter_f64().map(|year| self.coverage_at(year)).collect()
    }
}

impl fmt::Debug for dyn CoverageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageStrategy").field("name", &self.name()).finish()
    }
}

/// Logistic ramp that saturates within the first few years.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggressive {
    /// Asymptotic coverage.
    pub ceiling: f64,
    /// Logistic steepness.
    pub steepness: f64,
    /// Year of half-ceiling coverage.
    pub midpoint: f64,
}

impl Default for Aggressive {
    fn default() -> Self {
        Self {
            ceiling: 0.98,
            steepness: 0.8,
            midpoint: 4.0,
        }
    }
}

impl CoverageStrategy for Aggressive {
    fn name(&self) -> &str {
        "Aggressive"
    }

    fn coverage_at(&self, year: f64) -> f64 {
        self.ceiling / (1.0 + (-self.steepness * (year - self.midpoint)).exp())
    }
}

/// Steady linear ramp, capped at full coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conservative {
    /// Fraction migrated per year.
    pub annual_rate: f64,
}

impl Default for Conservative {
    fn default() -> Self {
        Self { annual_rate: 0.18 }
    }
}

impl CoverageStrategy for Conservative {
    fn name(&self) -> &str {
        "Conservative"
    }

    fn coverage_at(&self, year: f64) -> f64 {
        (self.annual_rate * year).clamp(0.0, 1.0)
    }
}

/// Nothing until `delay`, then a linear ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LateStart {
    /// First year of migration work.
    pub delay: f64,
    /// Fraction migrated per year once started.
    pub annual_rate: f64,
}

impl Default for LateStart {
    fn default() -> Self {
        Self {
            delay: 3.0,
            annual_rate: 0.18,
        }
    }
}

impl CoverageStrategy for LateStart {
    fn name(&self) -> &str {
        "Late_Start"
    }

    fn coverage_at(&self, year: f64) -> f64 {
        if year < self.delay {
            0.0
        } else {
            (self.annual_rate * (year - self.delay)).min(1.0)
        }
    }
}

/// Immediate tranche in year one, then a linear ramp for the remainder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phased {
    /// Coverage reached in year one.
    pub initial: f64,
    /// Additional fraction per year after year one.
    pub annual_rate: f64,
}

impl Default for Phased {
    fn default() -> Self {
        Self {
            initial: 0.30,
            annual_rate: 0.12,
        }
    }
}

impl CoverageStrategy for Phased {
    fn name(&self) -> &str {
        "Phased"
    }

    fn coverage_at(&self, year: f64) -> f64 {
        if year < 1.0 {
            0.0
        } else {
            (self.initial + self.annual_rate * (year - 1.0)).min(1.0)
        }
    }
}

/// Ramp, budget plateau, then a slower recovery ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetConstrained {
    /// Fraction per year during the initial ramp.
    pub ramp_rate: f64,
    /// Last year of the initial ramp.
    pub ramp_end: f64,
    /// Last year of the plateau.
    pub plateau_end: f64,
    /// Fraction per year after the plateau.
    pub recovery_rate: f64,
}

impl Default for BudgetConstrained {
    fn default() -> Self {
        Self {
            ramp_rate: 0.15,
            ramp_end: 3.0,
            plateau_end: 6.0,
            recovery_rate: 0.10,
        }
    }
}

impl CoverageStrategy for BudgetConstrained {
    fn name(&self) -> &str {
        "Budget_Constrained"
    }

    fn coverage_at(&self, year: f64) -> f64 {
        let plateau = (self.ramp_rate * self.ramp_end).clamp(0.0, 1.0);
        if year <= self.ramp_end {
            (self.ramp_rate * year).clamp(0.0, 1.0)
        } else if year <= self.plateau_end {
            plateau
        } else {
            (plateau + self.recovery_rate * (year - self.plateau_end)).min(1.0)
        }
    }
}

/// Custom scenario declared in configuration as `(year, coverage)` points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomScenario {
    /// Scenario name.
    pub name: String,
    /// `[year, coverage]` pairs in any order.
    pub points: Vec<[f64; 2]>,
}

/// Linear interpolation through configured points, flat outside them.
#[derive(Debug, Clone, PartialEq)]
pub struct Piecewise {
    name: String,
    points: Vec<(f64, f64)>,
}

impl Piecewise {
    /// Validates and sorts the points of a custom scenario.
    pub fn new(custom: &CustomScenario) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidCustomScenario {
            name: custom.name.clone(),
            reason,
        };
        if custom.points.is_empty() {
            return Err(invalid("no points".into()));
        }
        let mut points: Vec<(f64, f64)> = custom.points.iter().map(|[y, c]| (*y, *c)).collect();
        if let Some((year, coverage)) = points
            .iter()
            .find(|(y, c)| !y.is_finite() || !(0.0..=1.0).contains(c))
        {
            return Err(invalid(format!("point ({year}, {coverage}) out of range")));
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        if points.windows(2).any(|w| w[0].0 == w[1].0) {
            return Err(invalid("duplicate year".into()));
        }
        Ok(Self {
            name: custom.name.clone(),
            points,
        })
    }
}

impl CoverageStrategy for Piecewise {
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage_at(&self, year: f64) -> f64 {
        let (first, last) = (self.points[0], self.points[self.points.len() - 1]);
        if year <= first.0 {
            return first.1;
        }
        if year >= last.0 {
            return last.1;
        }
        let upper = self.points.partition_point(|(y, _)| *y <= year);
        let ((y0, c0), (y1, c1)) = (self.points[upper - 1], self.points[upper]);
        c0 + (year - y0) / (y1 - y0) * (c1 - c0)
    }
}

/// Adapts a closure into a named strategy.
pub struct FnStrategy<F> {
    name: String,
    coverage: F,
}

impl<F> FnStrategy<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    /// Wraps `coverage` under `name`.
    pub fn new(name: impl Into<String>, coverage: F) -> Self {
        Self {
            name: name.into(),
            coverage,
        }
    }
}

impl<F> CoverageStrategy for FnStrategy<F>
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn coverage_at(&self, year: f64) -> f64 {
        (self.coverage)(year)
    }
}

/// Canonical lookup key: lower case, `-` and spaces folded into `_`.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|ch| match ch {
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Name-indexed set of strategies.
#[derive(Clone, Default)]
pub struct ScenarioCatalog {
    entries: IndexMap<String, Arc<dyn CoverageStrategy>>,
}

impl fmt::Debug for ScenarioCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.values().map(|s| s.name())).finish()
    }
}

impl ScenarioCatalog {
    /// Catalog holding the built-in strategies.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::default();
        let builtins: [Arc<dyn CoverageStrategy>; 5] = [
            Arc::new(Aggressive::default()),
            Arc::new(Conservative::default()),
            Arc::new(LateStart::default()),
            Arc::new(Phased::default()),
            Arc::new(BudgetConstrained::default()),
        ];
        for strategy in builtins {
            catalog
                .entries
                .insert(normalize_name(strategy.name()), strategy);
        }
        catalog
    }

    /// Adds a strategy; names must be unique after normalization.
    pub fn register(&mut self, strategy: Arc<dyn CoverageStrategy>) -> Result<(), ConfigError> {
        let key = normalize_name(strategy.name());
        if self.entries.contains_key(&key) {
            return Err(ConfigError::DuplicateScenario(strategy.name().to_string()));
        }
        self.entries.insert(key, strategy);
        Ok(())
    }

    /// Looks a strategy up by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CoverageStrategy>, ConfigError> {
        self.entries
            .get(&normalize_name(name))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownScenario(name.to_string()))
    }

    /// Whether a strategy with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    /// Display names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.values().map(|s| s.name().to_string()).collect()
    }
}

/// Checks one coverage series against the strategy contract.
pub fn check_coverage(scenario: &str, trial: usize, coverage: &[f64], horizon: usize) -> SimulationResult<()> {
    let violation = |reason: String| SimulationError::ScenarioContract {
        scenario: scenario.to_string(),
        trial,
        reason,
    };
    if coverage.len() != horizon {
        return Err(violation(format!(
            "returned {} values for a {horizon}-year horizon",
            coverage.len()
        )));
    }
    if let Some((idx, value)) = coverage
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || !(0.0..=1.0).contains(*v))
    {
        return Err(violation(format!("coverage {value} in year {} is outside [0, 1]", idx + 1)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(strategy: &dyn CoverageStrategy, years: usize) -> Vec<f64> {
        strategy.coverage(&TimeAxis::new(years).unwrap())
    }

    #[test]
    fn aggressive_reaches_half_ceiling_at_midpoint() {
        assert!((Aggressive::default().coverage_at(4.0) - 0.49).abs() < 1e-12);
        let late = series(&Aggressive::default(), 20);
        assert!(late[9..].iter().all(|&c| (0.97..=0.98).contains(&c)));
    }

    #[test]
    fn conservative_grows_eighteen_percent() {
        let values = series(&Conservative::default(), 7);
        let expected = [0.18, 0.36, 0.54, 0.72, 0.90, 1.0, 1.0];
        for (got, want) in values.iter().zip(expected) {
            assert!((got - want).abs() < 1e-12);
        }
        assert_eq!(Conservative::default().coverage_at(0.0), 0.0);
    }

    #[test]
    fn late_start_waits_for_delay() {
        let strategy = LateStart::default();
        assert_eq!(strategy.coverage_at(2.99), 0.0);
        assert_eq!(strategy.coverage_at(3.0), 0.0);
        assert!(strategy.coverage_at(3.1) > 0.0);
        assert!((strategy.coverage_at(5.0) - 0.36).abs() < 1e-12);
        assert_eq!(strategy.coverage_at(15.0), 1.0);
    }

    #[test]
    fn phased_and_budget_shapes() {
        let phased = series(&Phased::default(), 4);
        assert!((phased[0] - 0.30).abs() < 1e-12);
        assert!((phased[3] - 0.66).abs() < 1e-12);
        let budget = series(&BudgetConstrained::default(), 10);
        assert!((budget[3] - 0.45).abs() < 1e-12);
        assert!((budget[5] - 0.45).abs() < 1e-12);
        assert!((budget[9] - 0.85).abs() < 1e-12);
    }

    #[test]
    fn builtins_are_monotone_and_bounded() {
        let catalog = ScenarioCatalog::builtin();
        for name in catalog.names() {
            let strategy = catalog.resolve(&name).unwrap();
            let values = series(strategy.as_ref(), 30);
            assert!(values.iter().all(|c| (0.0..=1.0).contains(c)), "{name}");
            assert!(values.windows(2).all(|w| w[1] >= w[0]), "{name}");
        }
    }

    #[test]
    fn late_start_is_slowest_early() {
        let axis = TimeAxis::new(3).unwrap();
        let late = LateStart::default().coverage(&axis);
        let conservative = Conservative::default().coverage(&axis);
        let aggressive = Aggressive::default().coverage(&axis);
        for i in 0..3 {
            assert!(late[i] <= conservative[i] && late[i] <= aggressive[i]);
        }
    }

    #[test]
    fn catalog_resolves_loose_names() {
        let catalog = ScenarioCatalog::builtin();
        assert_eq!(catalog.resolve("late-start").unwrap().name(), "Late_Start");
        assert_eq!(catalog.resolve("budget constrained").unwrap().name(), "Budget_Constrained");
        assert_eq!(
            catalog.resolve("Unknown").unwrap_err(),
            ConfigError::UnknownScenario("Unknown".into())
        );
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut catalog = ScenarioCatalog::builtin();
        let dup = Arc::new(FnStrategy::new("aggressive", |_| 1.0));
        assert!(matches!(catalog.register(dup), Err(ConfigError::DuplicateScenario(_))));
        catalog
            .register(Arc::new(FnStrategy::new("Instant", |_| 1.0)))
            .unwrap();
        assert!(catalog.contains("instant"));
    }

    #[test]
    fn piecewise_interpolates() {
        let strategy = Piecewise::new(&CustomScenario {
            name: "Pilot".into(),
            points: vec![[5.0, 1.0], [1.0, 0.2]],
        })
        .unwrap();
        assert_eq!(strategy.coverage_at(0.0), 0.2);
        assert!((strategy.coverage_at(3.0) - 0.6).abs() < 1e-12);
        assert_eq!(strategy.coverage_at(8.0), 1.0);
        let bad = CustomScenario {
            name: "Broken".into(),
            points: vec![[1.0, 1.5]],
        };
        assert!(Piecewise::new(&bad).is_err());
    }

    #[test]
    fn contract_check_reports_defects() {
        assert!(check_coverage("ok", 0, &[0.0, 0.5, 1.0], 3).is_ok());
        let short = check_coverage("short", 2, &[0.1], 3).unwrap_err();
        assert!(matches!(short, SimulationError::ScenarioContract { trial: 2, .. }));
        assert!(check_coverage("high", 0, &[0.1, 1.2, 1.0], 3).is_err());
        assert!(check_coverage("nan", 0, &[f64::NAN, 0.5, 1.0], 3).is_err());
    }
}
