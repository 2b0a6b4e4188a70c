//! Binary drop-off target.

use crate::record::{FunnelRecord, Status};

/// Label of a record whose applicant dropped out at that stage.
pub const DROP_OFF: usize = 1;

/// Label of a record whose applicant stayed in the funnel.
pub const RETAINED: usize = 0;

/// Label each record: [`DROP_OFF`] when its status is `Rejected`, else [`RETAINED`].
#[must_use]
pub fn label(records: &[FunnelRecord]) -> Vec<usize> {
    records
        .iter()
        .map(|record| match record.status {
            Status::Rejected => DROP_OFF,
            Status::Passed | Status::Hired => RETAINED,
        })
        .collect()
}

/// Fraction of labels equal to [`DROP_OFF`]. Zero for an empty slice.
#[must_use]
pub fn drop_off_rate(labels: &[usize]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    let positives = labels.iter().filter(|&&l| l == DROP_OFF).count();
    positives as f64 / labels.len() as f64
}
