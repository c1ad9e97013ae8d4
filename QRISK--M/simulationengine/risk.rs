//! Residual quantum risk: logistic map from adversarial capability to break probability.

/// Bound applied to the logistic exponent.
///
/// `exp(±36)` keeps `1 / (1 + exp(z))` finite and strictly inside `(0, 1)` in `f64`.
pub const LOGISTIC_EXPONENT_LIMIT: f64 = 36.0;

/// Probability that an adversary at `capability` (log10 ops) breaks an algorithm
/// whose attack costs `attack_cost` (log10 ops).
///
/// `alpha` sets the steepness around the break-even point, where the result is
/// exactly `0.5`.
#[must_use]
pub fn residual_risk(capability: f64, attack_cost: f64, alpha: f64) -> f64 {
    let exponent =
        (-alpha * (capability - attack_cost)).clamp(-LOGISTIC_EXPONENT_LIMIT, LOGISTIC_EXPONENT_LIMIT);
    1.0 / (1.0 + exponent.exp())
}

/// Elementwise [`residual_risk`] over a capability trajectory.
#[must_use]
pub fn risk_series(trajectory: &[f64], attack_cost: f64, alpha: f64) -> Vec<f64> {
    trajectory
        .iter()
        .map(|&capability| residual_risk(capability, attack_cost, alpha))
        .collect()
}

/// Index of the first year whose risk strictly exceeds one half, 1-based.
#[must_use]
pub fn critical_year(risk: &[f64]) -> Option<u32> {
    risk.iter()
        .position(|&value| value > 0.5)
        .and_then(|idx| u32::try_from(idx + 1).ok())
}
