use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    capability::ProjectionPoint,
    config::{default_algorithms, Algorithm, SimulationConfig},
};

/// Read-only reference data: attack costs and an optional capability projection.
///
/// ```toml
/// [[algorithms]]
/// name = "RSA-2048"
/// attack_cost = 10.0
/// class = "classical"
///
/// [[projections]]
/// year = 1.0
/// log_capability = 5.4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceData {
    /// Algorithm catalogue.
    pub algorithms: Vec<Algorithm>,
    /// Capability projection points.
    pub projections: Vec<ProjectionPoint>,
}

impl ReferenceData {
    /// Built-in reference set (RSA-2048, Kyber-512, no projection).
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            algorithms: default_algorithms(),
            projections: Vec::new(),
        }
    }

    /// Loads a reference TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading reference data {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing reference data {}", path.display()))
    }

    /// Attack cost of a named algorithm.
    #[must_use]
    pub fn attack_cost(&self, name: &str) -> Option<f64> {
        self.algorithms
            .iter()
            .find(|algo| algo.name == name)
            .map(|algo| algo.attack_cost)
    }

    /// Merges into a configuration: known algorithms take the reference cost and
    /// class, unknown ones are appended, and a non-empty projection replaces the
    /// configured one.
    pub fn apply(&self, config: &mut SimulationConfig) {
        for reference in &self.algorithms {
            match config
                .algorithms
                .iter_mut()
                .find(|algo| algo.name == reference.name)
            {
                Some(existing) => {
                    existing.attack_cost = reference.attack_cost;
                    existing.class = reference.class;
                }
                None => config.algorithms.push(reference.clone()),
            }
        }
        if !self.projections.is_empty() {
            config.projection = self.projections.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AlgorithmClass;
    use tempfile::tempdir;

    #[test]
    fn builtin_costs() {
        let data = ReferenceData::builtin();
        assert_eq!(data.attack_cost("RSA-2048"), Some(10.0));
        assert_eq!(data.attack_cost("Kyber-512"), Some(18.0));
        assert_eq!(data.attack_cost("ECC-256"), None);
    }

    #[test]
    fn load_and_apply() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reference.toml");
        fs::write(
            &path,
            r#"
[[algorithms]]
name = "RSA-2048"
attack_cost = 11.5

[[algorithms]]
name = "ECC-256"
attack_cost = 9.0
class = "classical"

[[algorithms]]
name = "Dilithium-2"
attack_cost = 19.0
class = "post_quantum"

[[projections]]
year = 1.0
log_capability = 5.5

[[projections]]
year = 10.0
log_capability = 9.0
"#,
        )
        .unwrap();
        let data = ReferenceData::load(&path).unwrap();
        let mut config = SimulationConfig::default();
        data.apply(&mut config);
        assert_eq!(config.algorithm("RSA-2048").unwrap().attack_cost, 11.5);
        assert_eq!(config.algorithm("Kyber-512").unwrap().attack_cost, 18.0);
        assert_eq!(
            config.algorithm("Dilithium-2").unwrap().class,
            AlgorithmClass::PostQuantum
        );
        assert_eq!(config.algorithms.len(), 4);
        assert_eq!(config.projection.len(), 2);
        config.validate().unwrap();
    }

    #[test]
    fn malformed_file_has_context() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[[algorithms]]\nname = 3\n").unwrap();
        let err = ReferenceData::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("parsing reference data"));
    }
}
