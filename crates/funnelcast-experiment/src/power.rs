//! Sample-size planning for a two-proportion experiment.

use tracing::{debug, instrument};

use crate::distribution::{normal_cdf, normal_quantile};
use crate::error::ExperimentError;
use crate::significance::cohens_h;

const MAX_ITERATIONS: usize = 200;

/// Required group size for detecting a relative improvement.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PowerAnalysis {
    /// Current conversion rate.
    pub baseline_rate: f64,
    /// `baseline_rate * (1 + improvement)`.
    pub target_rate: f64,
    /// Cohen's h between baseline and target.
    pub effect_size: f64,
    /// Two-sided significance level.
    pub alpha: f64,
    /// Target probability of detecting the effect.
    pub power: f64,
    /// Applicants needed in each of control and treatment.
    pub sample_size_per_group: u64,
}

impl PowerAnalysis {
    /// Applicants needed across both groups.
    #[must_use]
    pub fn total_sample_size(&self) -> u64 {
        self.sample_size_per_group.saturating_mul(2)
    }
}

/// Smallest per-group size at which a two-sided z-test on Cohen's h reaches `power`.
///
/// Solves `Φ(h·√(n/2) − z) + Φ(−h·√(n/2) − z) = power` for `n`, where
/// `z = Φ⁻¹(1 − alpha/2)`, and rounds up.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ExperimentError::InvalidRate`] | `baseline_rate` not in (0, 1) |
/// | [`ExperimentError::TargetRateOutOfRange`] | improved rate not in (0, 1) |
/// | [`ExperimentError::InvalidAlpha`] | `alpha` not in (0, 1) |
/// | [`ExperimentError::InvalidPower`] | `power` not in (0, 1) |
/// | [`ExperimentError::ZeroEffect`] | the improvement leaves the rate unchanged |
#[instrument(level = "debug")]
pub fn power_analysis(
    baseline_rate: f64,
    improvement: f64,
    alpha: f64,
    power: f64,
) -> Result<PowerAnalysis, ExperimentError> {
    if !(baseline_rate > 0.0 && baseline_rate < 1.0) {
        return Err(ExperimentError::InvalidRate {
            rate: baseline_rate,
        });
    }
    let target_rate = baseline_rate * (1.0 + improvement);
    if !(target_rate > 0.0 && target_rate < 1.0) {
        return Err(ExperimentError::TargetRateOutOfRange {
            target: target_rate,
        });
    }
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ExperimentError::InvalidAlpha { alpha });
    }
    if !(power > 0.0 && power < 1.0) {
        return Err(ExperimentError::InvalidPower { power });
    }
    let effect_size = cohens_h(baseline_rate, target_rate);
    if effect_size == 0.0 {
        return Err(ExperimentError::ZeroEffect { improvement });
    }

    let z = normal_quantile(1.0 - alpha / 2.0);
    let n = solve_sample_size(effect_size.abs(), z, power);
    let sample_size_per_group = (n.ceil() as u64).max(1);

    debug!(effect_size, z, n, sample_size_per_group, "sample size solved");

    Ok(PowerAnalysis {
        baseline_rate,
        target_rate,
        effect_size,
        alpha,
        power,
        sample_size_per_group,
    })
}

/// Power of the two-sided test at `n` per group.
fn achieved_power(h: f64, z: f64, n: f64) -> f64 {
    let shift = h * (n / 2.0).sqrt();
    normal_cdf(shift - z) + normal_cdf(-shift - z)
}

/// Bisect for the `n` at which power crosses `target`.
fn solve_sample_size(h: f64, z: f64, target: f64) -> f64 {
    let mut lo = 0.0;
    let mut hi = 1.0;
    for _ in 0..MAX_ITERATIONS {
        if achieved_power(h, z, hi) >= target {
            break;
        }
        lo = hi;
        hi *= 2.0;
    }
    for _ in 0..MAX_ITERATIONS {
        let mid = 0.5 * (lo + hi);
        if achieved_power(h, z, mid) >= target {
            hi = mid;
        } else {
            lo = mid;
        }
        if hi - lo <= 1e-9 * hi.max(1.0) {
            break;
        }
    }
    hi
}
