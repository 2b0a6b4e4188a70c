/// Errors from experiment statistics and funnel aggregation.
#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    /// Returned when a group total is zero.
    #[error("{group} group total is zero")]
    ZeroDenominator {
        /// Which group, `control` or `treatment`.
        group: &'static str,
    },

    /// Returned when successes exceed the group total.
    #[error("{group} group has {successes} successes out of {total}")]
    InvalidCounts {
        /// Which group, `control` or `treatment`.
        group: &'static str,
        /// Reported successes.
        successes: u64,
        /// Reported total.
        total: u64,
    },

    /// Returned when a contingency column is empty, so expected counts are zero.
    #[error("chi-square undefined: every observation is a {outcome}")]
    DegenerateProportion {
        /// The outcome shared by every observation, `success` or `failure`.
        outcome: &'static str,
    },

    /// Returned when the daily throughput is not positive.
    #[error("daily volume must be positive, got {daily_volume}")]
    ZeroThroughput {
        /// The daily volume supplied.
        daily_volume: f64,
    },

    /// Returned when alpha is not in (0, 1).
    #[error("alpha must be in (0, 1), got {alpha}")]
    InvalidAlpha {
        /// The invalid alpha.
        alpha: f64,
    },

    /// Returned when the target power is not in (0, 1).
    #[error("power must be in (0, 1), got {power}")]
    InvalidPower {
        /// The invalid power.
        power: f64,
    },

    /// Returned when a rate is outside its valid range.
    #[error("rate {rate} is out of range")]
    InvalidRate {
        /// The invalid rate.
        rate: f64,
    },

    /// Returned when the improved target rate leaves (0, 1).
    #[error("target rate {target} is outside (0, 1)")]
    TargetRateOutOfRange {
        /// `baseline * (1 + improvement)`.
        target: f64,
    },

    /// Returned when the improvement produces no effect.
    #[error("improvement of {improvement} yields zero effect size")]
    ZeroEffect {
        /// The improvement supplied.
        improvement: f64,
    },

    /// Returned when an improvement factor is negative or non-finite.
    #[error("improvement must be finite and non-negative, got {improvement}")]
    InvalidImprovement {
        /// The invalid improvement.
        improvement: f64,
    },

    /// Returned when no record belongs to the requested stage.
    #[error("stage {stage:?} has no records")]
    UnknownStage {
        /// The requested stage name.
        stage: String,
    },

    /// Returned when a sample size of zero is requested.
    #[error("sample size must be at least 1")]
    EmptySample,
}
