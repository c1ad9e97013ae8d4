//! Cross-trial aggregation: running moments, streaming quantiles, exact percentiles.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SimulationError, SimulationResult};

/// Percentile band reported around each per-year mean.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PercentileBand {
    /// Lower quantile in `(0, 1)`.
    pub lower: f64,
    /// Upper quantile in `(0, 1)`.
    pub upper: f64,
}

impl Default for PercentileBand {
    fn default() -> Self {
        Self {
            lower: 0.05,
            upper: 0.95,
        }
    }
}

impl PercentileBand {
    /// Requires `0 < lower < upper < 1`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.lower > 0.0 && self.lower < self.upper && self.upper < 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "band",
                value: if self.lower > 0.0 { self.upper } else { self.lower },
                expected: "0 < lower < upper < 1",
            });
        }
        Ok(())
    }
}

/// Welford running mean and variance.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    /// Adds one observation.
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Observations seen.
    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Mean, zero when empty.
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample standard deviation, zero below two observations.
    #[must_use]
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

/// Linear-interpolated percentile of an ascending slice (`q` in `[0, 1]`).
#[must_use]
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

/// P² streaming quantile estimator (Jain & Chlamtac) using five markers.
///
/// Exact until five observations have been seen.
#[derive(Debug, Clone, PartialEq)]
pub struct P2Quantile {
    quantile: f64,
    count: usize,
    heights: [f64; 5],
    positions: [f64; 5],
    desired: [f64; 5],
    increments: [f64; 5],
}

impl P2Quantile {
    /// Estimator for quantile `q` in `(0, 1)`.
    #[must_use]
    pub fn new(quantile: f64) -> Self {
        let q = quantile;
        Self {
            quantile: q,
            count: 0,
            heights: [0.0; 5],
            positions: [1.0, 2.0, 3.0, 4.0, 5.0],
            desired: [1.0, 1.0 + 2.0 * q, 1.0 + 4.0 * q, 3.0 + 2.0 * q, 5.0],
            increments: [0.0, q / 2.0, q, (1.0 + q) / 2.0, 1.0],
        }
    }

    /// Adds one observation.
    pub fn observe(&mut self, value: f64) {
        if self.count < 5 {
            self.heights[self.count] = value;
            self.count += 1;
            if self.count == 5 {
                self.heights.sort_by(f64::total_cmp);
            }
            return;
        }
        self.count += 1;

        let cell = if value < self.heights[0] {
            self.heights[0] = value;
            0
        } else if value >= self.heights[4] {
            self.heights[4] = value;
            3
        } else {
            (1..5).find(|&i| value < self.heights[i]).map_or(3, |i| i - 1)
        };

        for position in &mut self.positions[cell + 1..] {
            *position += 1.0;
        }
        for (desired, increment) in self.desired.iter_mut().zip(self.increments) {
            *desired += increment;
        }

        for i in 1..4 {
            let drift = self.desired[i] - self.positions[i];
            let room_up = self.positions[i + 1] - self.positions[i] > 1.0;
            let room_down = self.positions[i - 1] - self.positions[i] < -1.0;
            if (drift >= 1.0 && room_up) || (drift <= -1.0 && room_down) {
                let step = drift.signum();
                let candidate = self.parabolic(i, step);
                self.heights[i] = if self.heights[i - 1] < candidate && candidate < self.heights[i + 1] {
                    candidate
                } else {
                    self.linear(i, step)
                };
                self.positions[i] += step;
            }
        }
    }

    fn parabolic(&self, i: usize, step: f64) -> f64 {
        let (q, n) = (&self.heights, &self.positions);
        q[i] + step / (n[i + 1] - n[i - 1])
            * ((n[i] - n[i - 1] + step) * (q[i + 1] - q[i]) / (n[i + 1] - n[i])
                + (n[i + 1] - n[i] - step) * (q[i] - q[i - 1]) / (n[i] - n[i - 1]))
    }

    fn linear(&self, i: usize, step: f64) -> f64 {
        let j = if step > 0.0 { i + 1 } else { i - 1 };
        self.heights[i] + step * (self.heights[j] - self.heights[i]) / (self.positions[j] - self.positions[i])
    }

    /// Current estimate, zero before any observation.
    #[must_use]
    pub fn estimate(&self) -> f64 {
        if self.count >= 5 {
            return self.heights[2];
        }
        let mut seen = self.heights[..self.count].to_vec();
        seen.sort_by(f64::total_cmp);
        percentile(&seen, self.quantile)
    }
}

/// Per-year summary of one series across trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    /// Cross-trial mean per year.
    pub mean: Vec<f64>,
    /// Cross-trial sample standard deviation per year.
    pub std_dev: Vec<f64>,
    /// Lower band per year.
    pub lower: Vec<f64>,
    /// Upper band per year.
    pub upper: Vec<f64>,
}

#[derive(Debug, Clone)]
enum BandEstimator {
    Streaming {
        lower: Vec<P2Quantile>,
        upper: Vec<P2Quantile>,
    },
    Exact {
        samples: Vec<Vec<f64>>,
    },
}

/// Folds per-trial series into a [`SeriesSummary`].
#[derive(Debug, Clone)]
pub struct SeriesAccumulator {
    label: String,
    band: PercentileBand,
    moments: Vec<RunningStats>,
    estimator: BandEstimator,
}

impl SeriesAccumulator {
    /// Streaming accumulator: memory independent of the trial count.
    #[must_use]
    pub fn streaming(label: impl Into<String>, years: usize, band: PercentileBand) -> Self {
        Self {
            label: label.into(),
            band,
            moments: vec![RunningStats::default(); years],
            estimator: BandEstimator::Streaming {
                lower: vec![P2Quantile::new(band.lower); years],
                upper: vec![P2Quantile::new(band.upper); years],
            },
        }
    }

    /// Keeps every sample so bands are exact percentiles.
    #[must_use]
    pub fn exact(label: impl Into<String>, years: usize, band: PercentileBand) -> Self {
        Self {
            label: label.into(),
            band,
            moments: vec![RunningStats::default(); years],
            estimator: BandEstimator::Exact {
                samples: vec![Vec::new(); years],
            },
        }
    }

    /// Adds one trial's series; its length must match the horizon.
    pub fn push(&mut self, series: &[f64]) -> SimulationResult<()> {
        if series.len() != self.moments.len() {
            return Err(SimulationError::SeriesLength {
                series: self.label.clone(),
                expected: self.moments.len(),
                actual: series.len(),
            });
        }
        for (stats, &value) in self.moments.iter_mut().zip(series) {
            stats.push(value);
        }
        match &mut self.estimator {
            BandEstimator::Streaming { lower, upper } => {
                for ((lo, hi), &value) in lower.iter_mut().zip(upper.iter_mut()).zip(series) {
                    lo.observe(value);
                    hi.observe(value);
                }
            }
            BandEstimator::Exact { samples } => {
                for (bucket, &value) in samples.iter_mut().zip(series) {
                    bucket.push(value);
                }
            }
        }
        Ok(())
    }

    /// Produces the per-year summary.
    #[must_use]
    pub fn finish(self) -> SeriesSummary {
        let mean = self.moments.iter().map(RunningStats::mean).collect();
        let std_dev = self.moments.iter().map(RunningStats::std_dev).collect();
        let (lower, upper) = match self.estimator {
            BandEstimator::Streaming { lower, upper } => (
                lower.iter().map(P2Quantile::estimate).collect(),
                upper.iter().map(P2Quantile::estimate).collect(),
            ),
            BandEstimator::Exact { mut samples } => samples
                .iter_mut()
                .map(|bucket| {
                    bucket.sort_by(f64::total_cmp);
                    (percentile(bucket, self.band.lower), percentile(bucket, self.band.upper))
                })
                .unzip(),
        };
        SeriesSummary {
            mean,
            std_dev,
            lower,
            upper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helper::trial_rng;
    use rand::Rng;

    #[test]
    fn running_stats_matches_closed_form() {
        let mut stats = RunningStats::default();
        for value in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stats.push(value);
        }
        assert_eq!(stats.count(), 8);
        assert!((stats.mean() - 5.0).abs() < 1e-12);
        assert!((stats.std_dev() - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.5), 3.0);
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert!((percentile(&sorted, 0.9) - 4.6).abs() < 1e-12);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn p2_is_exact_for_few_samples() {
        let mut estimator = P2Quantile::new(0.5);
        for value in [3.0, 1.0, 2.0] {
            estimator.observe(value);
        }
        assert_eq!(estimator.estimate(), 2.0);
    }

    #[test]
    fn p2_tracks_uniform_quantiles() {
        let mut rng = trial_rng(11, 0);
        let mut p05 = P2Quantile::new(0.05);
        let mut p95 = P2Quantile::new(0.95);
        for _ in 0..20_000 {
            let value: f64 = rng.gen();
            p05.observe(value);
            p95.observe(value);
        }
        assert!((p05.estimate() - 0.05).abs() < 0.01);
        assert!((p95.estimate() - 0.95).abs() < 0.01);
    }

    #[test]
    fn accumulator_rejects_wrong_length() {
        let mut acc = SeriesAccumulator::streaming("risk/RSA-2048", 3, PercentileBand::default());
        let err = acc.push(&[0.1, 0.2]).unwrap_err();
        assert!(matches!(err, SimulationError::SeriesLength { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn exact_and_streaming_agree_on_means() {
        let band = PercentileBand::default();
        let mut streaming = SeriesAccumulator::streaming("s", 2, band);
        let mut exact = SeriesAccumulator::exact("s", 2, band);
        for trial in 0..50 {
            let value = f64::from(trial);
            streaming.push(&[value, 2.0 * value]).unwrap();
            exact.push(&[value, 2.0 * value]).unwrap();
        }
        let (s, e) = (streaming.finish(), exact.finish());
        assert_eq!(s.mean, e.mean);
        assert!((e.mean[0] - 24.5).abs() < 1e-12);
        assert!((e.lower[0] - 2.45).abs() < 1e-12);
        assert!((e.upper[1] - 93.1).abs() < 1e-9);
        assert!(s.lower[0] <= s.upper[0]);
    }

    #[test]
    fn band_validation() {
        assert!(PercentileBand::default().validate().is_ok());
        assert!(PercentileBand { lower: 0.9, upper: 0.1 }.validate().is_err());
        assert!(PercentileBand { lower: 0.0, upper: 0.5 }.validate().is_err());
    }
}
