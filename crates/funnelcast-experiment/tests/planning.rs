//! An experiment plan from funnel records: baseline, projection, verdict, sizing.

use chrono::NaiveDate;

use funnelcast_experiment::{
    ExperimentError, power_analysis, proportion_confidence_interval, recommend_duration,
    significance, simulate_intervention, stage_metrics,
};
use funnelcast_features::{ApplicantId, FunnelRecord, Status};

/// 400 applicants reach the technical round; every third is rejected there.
fn technical_round_records() -> Vec<FunnelRecord> {
    let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
    (0..400)
        .map(|i| FunnelRecord {
            applicant_id: ApplicantId::new(format!("APP-{i:05}")),
            source: "Company Website".to_string(),
            job_role: "Healthcare Representative".to_string(),
            department: "Sales".to_string(),
            age: Some(35.0),
            gender: "Female".to_string(),
            education: Some(4.0),
            education_field: "Technical Degree".to_string(),
            application_date: date,
            stage: "Technical Round".to_string(),
            stage_sequence: 4,
            stage_date: date,
            status: if i % 3 == 0 { Status::Rejected } else { Status::Passed },
            days_since_application: Some(21.0),
        })
        .collect()
}

#[test]
fn plan_an_intervention() {
    let records = technical_round_records();

    let stages = stage_metrics(&records);
    assert_eq!(stages.len(), 1);
    let baseline = stages[0].pass_rate;

    let outcome = simulate_intervention(&records, "Technical Round", 0.15, Some(300), 42).unwrap();
    assert_eq!(outcome.sample_size, 300);
    assert!(outcome.new_pass_rate > outcome.baseline_pass_rate);
    assert!(outcome.additional_passed > 0);

    let verdict = outcome.significance(0.05).unwrap();
    assert_eq!(verdict.control_total, 300);
    assert!(verdict.cohens_h > 0.0);

    let plan = power_analysis(baseline, 0.15, 0.05, 0.80).unwrap();
    let days = recommend_duration(40.0, plan.sample_size_per_group).unwrap();
    assert_eq!(days, (2 * plan.sample_size_per_group).div_ceil(40));

    let ci = proportion_confidence_interval(verdict.control_rate, verdict.control_total).unwrap();
    assert!(ci.lower < verdict.control_rate && verdict.control_rate < ci.upper);
}

#[test]
fn reference_verdicts() {
    let lift = significance(50, 100, 70, 100, 0.05).unwrap();
    assert!(lift.treatment_rate > lift.control_rate);
    assert!(lift.is_significant);

    let flat = significance(50, 100, 51, 100, 0.05).unwrap();
    assert!(!flat.is_significant);

    let n80 = power_analysis(0.20, 0.15, 0.05, 0.80).unwrap();
    let n95 = power_analysis(0.20, 0.15, 0.05, 0.95).unwrap();
    assert!(n80.sample_size_per_group > 0);
    assert!(n95.sample_size_per_group > n80.sample_size_per_group);
}

#[test]
fn zero_inputs_are_rejected() {
    assert!(matches!(
        significance(0, 0, 0, 0, 0.05).unwrap_err(),
        ExperimentError::ZeroDenominator { .. }
    ));
    assert!(matches!(
        recommend_duration(0.0, 100).unwrap_err(),
        ExperimentError::ZeroThroughput { .. }
    ));
}
