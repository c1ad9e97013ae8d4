use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Yearly simulation axis `1..=horizon`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAxis {
    years: Vec<u32>,
}

impl TimeAxis {
    /// Builds the axis for a horizon of `years`.
    pub fn new(years: usize) -> Result<Self, ConfigError> {
        let horizon = u32::try_from(years).map_err(|_| ConfigError::InvalidParameter {
            name: "years",
            value: years as f64,
            expected: "horizon fits in u32",
        })?;
        if horizon == 0 {
            return Err(ConfigError::EmptyHorizon);
        }
        Ok(Self {
            years: (1..=horizon).collect(),
        })
    }

    /// Number of years.
    #[must_use]
    pub fn len(&self) -> usize {
        self.years.len()
    }

    /// Always false for a constructed axis.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Year indices.
    #[must_use]
    pub fn years(&self) -> &[u32] {
        &self.years
    }

    /// Year indices as `f64`, the form the models consume.
    pub fn iter_f64(&self) -> impl Iterator<Item = f64> + '_ {
        self.years.iter().map(|&year| f64::from(year))
    }
}
