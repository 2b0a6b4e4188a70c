//! Two-proportion chi-square test with Yates' continuity correction.

use tracing::{debug, instrument};

use crate::distribution::chi2_sf_1df;
use crate::error::ExperimentError;

/// Verdict of a control/treatment comparison.
///
/// Rates are fractions in `[0, 1]`; `relative_improvement` is a percentage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SignificanceResult {
    /// Successes in the control group.
    pub control_success: u64,
    /// Size of the control group.
    pub control_total: u64,
    /// Successes in the treatment group.
    pub treatment_success: u64,
    /// Size of the treatment group.
    pub treatment_total: u64,
    /// `control_success / control_total`.
    pub control_rate: f64,
    /// `treatment_success / treatment_total`.
    pub treatment_rate: f64,
    /// Yates-corrected chi-square statistic.
    pub chi_square: f64,
    /// Upper-tail probability of `chi_square` under one degree of freedom.
    pub p_value: f64,
    /// Significance level the verdict was taken at.
    pub alpha: f64,
    /// `p_value < alpha`.
    pub is_significant: bool,
    /// Cohen's h, `2·asin(√p_t) − 2·asin(√p_c)`.
    pub cohens_h: f64,
    /// `(p_t − p_c) / p_c` in percent; 0 when the control rate is 0.
    pub relative_improvement: f64,
}

/// Test whether the treatment success rate differs from control.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ExperimentError::InvalidAlpha`] | `alpha` not in (0, 1) |
/// | [`ExperimentError::ZeroDenominator`] | a group total is 0 |
/// | [`ExperimentError::InvalidCounts`] | successes exceed a group total |
/// | [`ExperimentError::DegenerateProportion`] | both groups are all-success or all-failure |
#[instrument(level = "debug")]
pub fn significance(
    control_success: u64,
    control_total: u64,
    treatment_success: u64,
    treatment_total: u64,
    alpha: f64,
) -> Result<SignificanceResult, ExperimentError> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(ExperimentError::InvalidAlpha { alpha });
    }
    check_group("control", control_success, control_total)?;
    check_group("treatment", treatment_success, treatment_total)?;

    let observed = [
        [control_success as f64, (control_total - control_success) as f64],
        [treatment_success as f64, (treatment_total - treatment_success) as f64],
    ];
    let row_totals = [control_total as f64, treatment_total as f64];
    let column_totals = [
        observed[0][0] + observed[1][0],
        observed[0][1] + observed[1][1],
    ];
    if column_totals[0] == 0.0 {
        return Err(ExperimentError::DegenerateProportion { outcome: "failure" });
    }
    if column_totals[1] == 0.0 {
        return Err(ExperimentError::DegenerateProportion { outcome: "success" });
    }
    let grand_total = row_totals[0] + row_totals[1];

    let mut chi_square = 0.0;
    for (row, row_total) in observed.iter().zip(row_totals) {
        for (&o, column_total) in row.iter().zip(column_totals) {
            let expected = row_total * column_total / grand_total;
            let deviation = (o - expected).abs();
            // Yates: shrink each deviation by 0.5 without crossing zero.
            let corrected = deviation - deviation.min(0.5);
            chi_square += corrected * corrected / expected;
        }
    }
    let p_value = chi2_sf_1df(chi_square);

    let control_rate = control_success as f64 / control_total as f64;
    let treatment_rate = treatment_success as f64 / treatment_total as f64;
    let cohens_h = cohens_h(control_rate, treatment_rate);
    let relative_improvement = if control_rate > 0.0 {
        (treatment_rate - control_rate) / control_rate * 100.0
    } else {
        0.0
    };

    debug!(chi_square, p_value, cohens_h, "chi-square test computed");

    Ok(SignificanceResult {
        control_success,
        control_total,
        treatment_success,
        treatment_total,
        control_rate,
        treatment_rate,
        chi_square,
        p_value,
        alpha,
        is_significant: p_value < alpha,
        cohens_h,
        relative_improvement,
    })
}

/// Cohen's h effect size between two proportions.
#[must_use]
pub fn cohens_h(from_rate: f64, to_rate: f64) -> f64 {
    2.0 * (to_rate.sqrt().asin() - from_rate.sqrt().asin())
}

fn check_group(group: &'static str, successes: u64, total: u64) -> Result<(), ExperimentError> {
    if total == 0 {
        return Err(ExperimentError::ZeroDenominator { group });
    }
    if successes > total {
        return Err(ExperimentError::InvalidCounts {
            group,
            successes,
            total,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_lift_is_significant() {
        let result = significance(50, 100, 70, 100, 0.05).unwrap();
        assert!((result.control_rate - 0.5).abs() < 1e-12);
        assert!((result.treatment_rate - 0.7).abs() < 1e-12);
        assert!(result.treatment_rate > result.control_rate);
        // deviations of 10 shrink to 9.5 over expected counts 60/40/60/40
        let expected_chi = 9.5_f64.powi(2) * (2.0 / 60.0 + 2.0 / 40.0);
        assert!((result.chi_square - expected_chi).abs() < 1e-9);
        assert!(result.p_value < 0.01);
        assert!(result.is_significant);
        assert!(result.cohens_h > 0.0);
        assert!((result.relative_improvement - 40.0).abs() < 1e-9);
    }

    #[test]
    fn one_success_difference_is_not_significant() {
        let result = significance(50, 100, 51, 100, 0.05).unwrap();
        assert_eq!(result.chi_square, 0.0);
        assert_eq!(result.p_value, 1.0);
        assert!(!result.is_significant);
    }

    #[test]
    fn zero_control_rate_has_zero_relative_improvement() {
        let result = significance(0, 50, 5, 50, 0.05).unwrap();
        assert_eq!(result.relative_improvement, 0.0);
    }

    #[test]
    fn zero_total_rejected() {
        assert!(matches!(
            significance(0, 0, 1, 10, 0.05).unwrap_err(),
            ExperimentError::ZeroDenominator { group: "control" }
        ));
        assert!(matches!(
            significance(1, 10, 0, 0, 0.05).unwrap_err(),
            ExperimentError::ZeroDenominator { group: "treatment" }
        ));
    }

    #[test]
    fn degenerate_columns_rejected() {
        assert!(matches!(
            significance(10, 10, 20, 20, 0.05).unwrap_err(),
            ExperimentError::DegenerateProportion { outcome: "success" }
        ));
        assert!(matches!(
            significance(0, 10, 0, 20, 0.05).unwrap_err(),
            ExperimentError::DegenerateProportion { outcome: "failure" }
        ));
    }

    #[test]
    fn invalid_inputs_rejected() {
        assert!(matches!(
            significance(11, 10, 1, 10, 0.05).unwrap_err(),
            ExperimentError::InvalidCounts { successes: 11, .. }
        ));
        assert!(matches!(
            significance(1, 10, 1, 10, 1.0).unwrap_err(),
            ExperimentError::InvalidAlpha { .. }
        ));
    }
}
