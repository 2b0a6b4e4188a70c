//! Run-length recommendation from applicant throughput.

use crate::error::ExperimentError;

/// Days needed to collect `sample_size_per_group` applicants in each of two groups.
///
/// # Errors
///
/// Returns [`ExperimentError::ZeroThroughput`] if `daily_volume` is not a
/// positive finite number.
pub fn recommend_duration(daily_volume: f64, sample_size_per_group: u64) -> Result<u64, ExperimentError> {
    if !(daily_volume > 0.0 && daily_volume.is_finite()) {
        return Err(ExperimentError::ZeroThroughput { daily_volume });
    }
    let total_needed = 2.0 * sample_size_per_group as f64;
    Ok((total_needed / daily_volume).ceil() as u64)
}
