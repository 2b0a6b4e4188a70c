//! Experiment evaluation for recruitment funnels.
//!
//! Chi-square significance with Cohen's h, two-proportion power analysis,
//! run-duration planning, per-stage and per-source conversion aggregates,
//! and stage-level intervention simulation.

mod distribution;
mod duration;
mod error;
mod funnel;
mod intervention;
mod power;
mod significance;

pub use distribution::{chi2_sf_1df, normal_cdf, normal_quantile};
pub use duration::recommend_duration;
pub use error::ExperimentError;
pub use funnel::{
    FunnelFilter, OverallMetrics, SourceMetrics, StageMetrics, overall_metrics, source_metrics,
    stage_metrics,
};
pub use intervention::{
    ConfidenceInterval, InterventionOutcome, proportion_confidence_interval, simulate_intervention,
};
pub use power::{PowerAnalysis, power_analysis};
pub use significance::{SignificanceResult, cohens_h, significance};
