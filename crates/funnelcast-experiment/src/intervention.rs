//! What-if simulation of a pass-rate improvement at one stage.

use rand::SeedableRng;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use tracing::{info, instrument};

use funnelcast_features::{FunnelRecord, Status};

use crate::error::ExperimentError;
use crate::funnel::ratio;
use crate::significance::{SignificanceResult, significance};

/// z-score of a two-sided 95 % normal interval.
const Z_95: f64 = 1.96;

/// Projected effect of lifting a stage's pass rate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InterventionOutcome {
    /// Stage the intervention targets.
    pub stage: String,
    /// Records the projection is based on.
    pub sample_size: u64,
    /// Fraction of sampled records not rejected.
    pub baseline_pass_rate: f64,
    /// `min(baseline_pass_rate · (1 + improvement), 1)`.
    pub new_pass_rate: f64,
    /// Sampled records not rejected.
    pub baseline_passed: u64,
    /// `⌊sample_size · new_pass_rate⌋`.
    pub expected_passed: u64,
    /// `expected_passed − baseline_passed`.
    pub additional_passed: i64,
    /// Realized lift in percent after capping; 0 when the baseline is 0.
    pub improvement_pct: f64,
}

impl InterventionOutcome {
    /// Chi-square test of the baseline (control) against the projection (treatment).
    ///
    /// # Errors
    ///
    /// As [`significance`]; a fully passing stage gives
    /// [`ExperimentError::DegenerateProportion`].
    pub fn significance(&self, alpha: f64) -> Result<SignificanceResult, ExperimentError> {
        significance(
            self.baseline_passed,
            self.sample_size,
            self.expected_passed,
            self.sample_size,
            alpha,
        )
    }
}

/// Project the pass-rate lift `improvement` at `stage`.
///
/// When `sample_size` is given, that many stage records (or all, if fewer)
/// are drawn without replacement using a ChaCha8 RNG seeded with `seed`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ExperimentError::InvalidImprovement`] | `improvement` negative or non-finite |
/// | [`ExperimentError::EmptySample`] | `sample_size` is `Some(0)` |
/// | [`ExperimentError::UnknownStage`] | no record has stage `stage` |
#[instrument(skip(records), fields(n_records = records.len()))]
pub fn simulate_intervention(
    records: &[FunnelRecord],
    stage: &str,
    improvement: f64,
    sample_size: Option<usize>,
    seed: u64,
) -> Result<InterventionOutcome, ExperimentError> {
    if !(improvement.is_finite() && improvement >= 0.0) {
        return Err(ExperimentError::InvalidImprovement { improvement });
    }
    if sample_size == Some(0) {
        return Err(ExperimentError::EmptySample);
    }

    let stage_records: Vec<&FunnelRecord> = records.iter().filter(|r| r.stage == stage).collect();
    if stage_records.is_empty() {
        return Err(ExperimentError::UnknownStage {
            stage: stage.to_string(),
        });
    }

    let sampled: Vec<&FunnelRecord> = match sample_size {
        Some(n) if n < stage_records.len() => {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut indices = sample(&mut rng, stage_records.len(), n).into_vec();
            indices.sort_unstable();
            indices.into_iter().map(|i| stage_records[i]).collect()
        }
        _ => stage_records,
    };

    let n = sampled.len() as u64;
    let baseline_passed = sampled.iter().filter(|r| r.status != Status::Rejected).count() as u64;
    let baseline_pass_rate = ratio(baseline_passed, n);
    let new_pass_rate = (baseline_pass_rate * (1.0 + improvement)).min(1.0);
    let expected_passed = (n as f64 * new_pass_rate).floor() as u64;
    let additional_passed = expected_passed as i64 - baseline_passed as i64;
    let improvement_pct = if baseline_pass_rate > 0.0 {
        (new_pass_rate - baseline_pass_rate) / baseline_pass_rate * 100.0
    } else {
        0.0
    };

    info!(
        stage,
        sample_size = n,
        baseline_pass_rate,
        new_pass_rate,
        additional_passed,
        "intervention simulated"
    );

    Ok(InterventionOutcome {
        stage: stage.to_string(),
        sample_size: n,
        baseline_pass_rate,
        new_pass_rate,
        baseline_passed,
        expected_passed,
        additional_passed,
        improvement_pct,
    })
}

/// A symmetric normal-approximation interval around a proportion.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ConfidenceInterval {
    /// The observed proportion.
    pub rate: f64,
    /// `rate − half_width`.
    pub lower: f64,
    /// `rate + half_width`.
    pub upper: f64,
    /// `1.96 · √(rate·(1 − rate)/n)`.
    pub half_width: f64,
}

/// 95 % Wald interval for a proportion observed over `n` trials.
///
/// Bounds are not clipped to `[0, 1]`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ExperimentError::InvalidRate`] | `rate` outside `[0, 1]` |
/// | [`ExperimentError::ZeroDenominator`] | `n` is 0 |
pub fn proportion_confidence_interval(rate: f64, n: u64) -> Result<ConfidenceInterval, ExperimentError> {
    if !(0.0..=1.0).contains(&rate) {
        return Err(ExperimentError::InvalidRate { rate });
    }
    if n == 0 {
        return Err(ExperimentError::ZeroDenominator { group: "sample" });
    }
    let half_width = Z_95 * (rate * (1.0 - rate) / n as f64).sqrt();
    Ok(ConfidenceInterval {
        rate,
        lower: rate - half_width,
        upper: rate + half_width,
        half_width,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::funnel::fixtures::{record, small_funnel};

    fn technical_round(n_pass: usize, n_reject: usize) -> Vec<FunnelRecord> {
        (0..n_pass + n_reject)
            .map(|i| {
                let status = if i < n_pass { Status::Passed } else { Status::Rejected };
                record(&format!("T{i}"), "Referral", "Sales", 3, status, Some(10.0))
            })
            .collect()
    }

    #[test]
    fn uplift_projection() {
        let records = technical_round(60, 40);
        let outcome = simulate_intervention(&records, "Technical Round", 0.25, None, 42).unwrap();
        assert_eq!(outcome.sample_size, 100);
        assert_eq!(outcome.baseline_passed, 60);
        assert!((outcome.baseline_pass_rate - 0.6).abs() < 1e-12);
        assert!((outcome.new_pass_rate - 0.75).abs() < 1e-12);
        assert_eq!(outcome.expected_passed, 75);
        assert_eq!(outcome.additional_passed, 15);
        assert!((outcome.improvement_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn rate_capped_at_one() {
        let records = technical_round(90, 10);
        let outcome = simulate_intervention(&records, "Technical Round", 0.5, None, 42).unwrap();
        assert_eq!(outcome.new_pass_rate, 1.0);
        assert_eq!(outcome.expected_passed, 100);
    }

    #[test]
    fn sampling_is_seeded() {
        let records = technical_round(300, 200);
        let a = simulate_intervention(&records, "Technical Round", 0.1, Some(100), 7).unwrap();
        let b = simulate_intervention(&records, "Technical Round", 0.1, Some(100), 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.sample_size, 100);

        let all = simulate_intervention(&records, "Technical Round", 0.1, Some(10_000), 7).unwrap();
        assert_eq!(all.sample_size, 500);
    }

    #[test]
    fn projection_feeds_significance() {
        let records = technical_round(50, 50);
        let outcome = simulate_intervention(&records, "Technical Round", 0.4, None, 1).unwrap();
        let verdict = outcome.significance(0.05).unwrap();
        assert_eq!(verdict.control_success, 50);
        assert_eq!(verdict.treatment_success, 70);
        assert!(verdict.is_significant);
    }

    #[test]
    fn invalid_requests_rejected() {
        assert!(matches!(
            simulate_intervention(&small_funnel(), "Final Interview", 0.1, None, 1).unwrap_err(),
            ExperimentError::UnknownStage { .. }
        ));
        assert!(matches!(
            simulate_intervention(&small_funnel(), "Screening", 0.1, Some(0), 1).unwrap_err(),
            ExperimentError::EmptySample
        ));
        assert!(matches!(
            simulate_intervention(&small_funnel(), "Screening", -0.1, None, 1).unwrap_err(),
            ExperimentError::InvalidImprovement { .. }
        ));
    }

    // --- confidence interval ---

    #[test]
    fn wald_interval() {
        let ci = proportion_confidence_interval(0.5, 100).unwrap();
        assert!((ci.half_width - 0.098).abs() < 1e-12);
        assert!((ci.lower - 0.402).abs() < 1e-12);
        assert!((ci.upper - 0.598).abs() < 1e-12);
        assert_eq!(proportion_confidence_interval(1.0, 10).unwrap().half_width, 0.0);
        assert!(proportion_confidence_interval(0.5, 0).is_err());
        assert!(proportion_confidence_interval(1.2, 10).is_err());
    }
}
