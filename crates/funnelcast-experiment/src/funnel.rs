//! Funnel conversion aggregates.
//!
//! All rates are fractions in `[0, 1]` and are 0 for an empty group.

use std::collections::{BTreeMap, BTreeSet};

use funnelcast_features::{FunnelRecord, Status};

/// Pass and drop-off counts at one hiring stage.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageMetrics {
    /// Stage name.
    pub stage: String,
    /// Lowest stage sequence seen for this stage name.
    pub stage_sequence: u32,
    /// Records at this stage.
    pub applicants: u64,
    /// Records that were not rejected (`Passed` or `Hired`).
    pub passed: u64,
    /// Records that were rejected.
    pub rejected: u64,
    /// `passed / applicants`.
    pub pass_rate: f64,
    /// `rejected / applicants`.
    pub drop_off_rate: f64,
}

/// Hire yield of one recruiting source.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceMetrics {
    /// Source channel.
    pub source: String,
    /// Distinct applicants from this source.
    pub total_applicants: u64,
    /// Hired records from this source.
    pub hired: u64,
    /// `hired / total_applicants`.
    pub hire_rate: f64,
}

/// Headline funnel numbers.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverallMetrics {
    /// Distinct applicants.
    pub total_applicants: u64,
    /// Hired records.
    pub hired_count: u64,
    /// `hired_count / total_applicants`.
    pub hire_rate: f64,
    /// Mean days since application over hired records, if any have a value.
    pub avg_time_to_hire: Option<f64>,
}

/// Restricts [`overall_metrics`] to one source and/or department.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunnelFilter {
    source: Option<String>,
    department: Option<String>,
}

impl FunnelFilter {
    /// A filter that keeps every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only records from `source`.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Keep only records from `department`.
    #[must_use]
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    fn matches(&self, record: &FunnelRecord) -> bool {
        self.source.as_deref().is_none_or(|s| record.source == s)
            && self.department.as_deref().is_none_or(|d| record.department == d)
    }
}

/// Per-stage pass and drop-off rates, ordered by stage sequence then name.
#[must_use]
pub fn stage_metrics(records: &[FunnelRecord]) -> Vec<StageMetrics> {
    let mut by_stage: BTreeMap<&str, (u32, u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = by_stage
            .entry(record.stage.as_str())
            .or_insert((record.stage_sequence, 0, 0));
        entry.0 = entry.0.min(record.stage_sequence);
        entry.1 += 1;
        if record.status == Status::Rejected {
            entry.2 += 1;
        }
    }

    let mut metrics: Vec<StageMetrics> = by_stage
        .into_iter()
        .map(|(stage, (stage_sequence, applicants, rejected))| {
            let passed = applicants - rejected;
            StageMetrics {
                stage: stage.to_string(),
                stage_sequence,
                applicants,
                passed,
                rejected,
                pass_rate: ratio(passed, applicants),
                drop_off_rate: ratio(rejected, applicants),
            }
        })
        .collect();
    metrics.sort_by(|a, b| a.stage_sequence.cmp(&b.stage_sequence).then_with(|| a.stage.cmp(&b.stage)));
    metrics
}

/// Per-source hire rates, most hires first, ties by source name.
#[must_use]
pub fn source_metrics(records: &[FunnelRecord]) -> Vec<SourceMetrics> {
    let mut by_source: BTreeMap<&str, (BTreeSet<&str>, u64)> = BTreeMap::new();
    for record in records {
        let entry = by_source.entry(record.source.as_str()).or_default();
        entry.0.insert(record.applicant_id.as_str());
        if record.status == Status::Hired {
            entry.1 += 1;
        }
    }

    let mut metrics: Vec<SourceMetrics> = by_source
        .into_iter()
        .map(|(source, (applicants, hired))| {
            let total_applicants = applicants.len() as u64;
            SourceMetrics {
                source: source.to_string(),
                total_applicants,
                hired,
                hire_rate: ratio(hired, total_applicants),
            }
        })
        .collect();
    // BTreeMap order makes the stable sort break ties by name.
    metrics.sort_by(|a, b| b.hired.cmp(&a.hired));
    metrics
}

/// Applicant count, hire rate, and mean time to hire over the filtered records.
#[must_use]
pub fn overall_metrics(records: &[FunnelRecord], filter: &FunnelFilter) -> OverallMetrics {
    let mut applicants = BTreeSet::new();
    let mut hired_count = 0u64;
    let mut days_sum = 0.0;
    let mut days_count = 0usize;

    for record in records.iter().filter(|r| filter.matches(r)) {
        applicants.insert(record.applicant_id.as_str());
        if record.status == Status::Hired {
            hired_count += 1;
            if let Some(days) = record.days_since_application
                && days.is_finite()
            {
                days_sum += days;
                days_count += 1;
            }
        }
    }

    let total_applicants = applicants.len() as u64;
    OverallMetrics {
        total_applicants,
        hired_count,
        hire_rate: ratio(hired_count, total_applicants),
        avg_time_to_hire: (days_count > 0).then(|| days_sum / days_count as f64),
    }
}

pub(crate) fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
