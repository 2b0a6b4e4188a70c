//! End-to-end integration tests: CSV -> train/aggregate -> JSON -> deserialize.

use std::fs;
use std::path::{Path, PathBuf};

use funnelcast_experiment::{
    FunnelFilter, overall_metrics, power_analysis, recommend_duration, simulate_intervention,
    source_metrics, stage_metrics,
};
use funnelcast_features::{
    FeatureEncoder, FeatureError, FittedEncodingState, StratifiedSplit, label, stratified_split,
    transform,
};
use funnelcast_io::{FunnelReader, IoError, ResultWriter, RunName, TrainingSummary};
use funnelcast_model::{Algorithm, TrainedModel, TrainerConfig, evaluate, train};
use tempfile::TempDir;

/// Path to the test fixture directory.
fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[test]
fn train_round_trip() {
    // 1. Read and split
    let records = FunnelReader::new(&fixture_path("funnel_small.csv"))
        .read()
        .expect("fixture should parse");
    assert_eq!(records.len(), 83);

    let labels = label(&records);
    let split = stratified_split(&labels, 0.25, 42).unwrap();
    let train_records = StratifiedSplit::select(&records, &split.train);
    let test_records = StratifiedSplit::select(&records, &split.test);
    let train_labels = StratifiedSplit::select(&labels, &split.train);
    let test_labels = StratifiedSplit::select(&labels, &split.test);

    // 2. Encode, train, evaluate
    let (train_matrix, state) = FeatureEncoder::default()
        .fit_transform_with_vocabulary(&train_records, &records)
        .unwrap();
    let test_matrix = transform(&test_records, &state).unwrap();
    let config = TrainerConfig::new(Algorithm::Bagged).with_seed(7);
    let model = train(
        train_matrix.rows(),
        &train_labels,
        train_matrix.feature_names(),
        &config,
    )
    .unwrap();
    let evaluation = evaluate(&model, test_matrix.rows(), &test_labels).unwrap();

    // 3. Persist artifacts and reports
    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), RunName::new("train_rt").unwrap()).unwrap();
    model.save(writer.model_path()).unwrap();
    state.save(writer.encoder_path()).unwrap();
    writer
        .write_evaluation(
            &model,
            &evaluation,
            &[],
            TrainingSummary {
                n_train: train_records.len(),
                n_test: test_records.len(),
                n_synthetic: 0,
            },
        )
        .unwrap();

    // 4. Deserialize back and verify
    let content = read_json(&dir.path().join("train_rt_evaluation.json"));
    assert_eq!(content["run"], "train_rt");
    assert_eq!(content["algorithm"], serde_json::to_value(Algorithm::Bagged).unwrap());
    assert_eq!(content["training"]["n_test"], test_records.len());
    let auc = content["metrics"]["roc_auc"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&auc));
    let importances = content["feature_importances"].as_array().unwrap();
    assert_eq!(importances.len(), train_matrix.n_features());
    assert_eq!(importances[0]["rank"], 1);
    assert!(content["candidates"].as_array().unwrap().is_empty());

    let total: u64 = content["confusion_matrix"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|row| row.as_array().unwrap())
        .map(|v| v.as_u64().unwrap())
        .sum();
    assert_eq!(total, test_records.len() as u64);

    // 5. Reload the artifacts and score the held-out records
    let reloaded = TrainedModel::load(writer.model_path()).unwrap();
    let reloaded_state = FittedEncodingState::load(writer.encoder_path()).unwrap();
    let rescored = transform(&test_records, &reloaded_state).unwrap();
    let probabilities = reloaded.predict_drop_off_probability(rescored.rows()).unwrap();
    assert_eq!(
        probabilities,
        model.predict_drop_off_probability(test_matrix.rows()).unwrap()
    );

    writer.write_predictions(&test_records, &probabilities).unwrap();
    let content = read_json(&dir.path().join("train_rt_predictions.json"));
    assert_eq!(content["n_records"], test_records.len());
    assert_eq!(
        content["predictions"][0]["applicant_id"],
        test_records[0].applicant_id.as_str()
    );
}

#[test]
fn funnel_report_round_trip() {
    let records = FunnelReader::new(&fixture_path("funnel_small.csv"))
        .read()
        .unwrap();

    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), RunName::new("report").unwrap()).unwrap();
    let stages = stage_metrics(&records);
    writer
        .write_funnel(
            &overall_metrics(&records, &FunnelFilter::new()),
            &stages,
            &source_metrics(&records),
        )
        .unwrap();

    let content = read_json(&dir.path().join("report_funnel.json"));
    assert_eq!(content["overall"]["total_applicants"], 24);
    assert_eq!(content["overall"]["hired_count"], 10);

    let stage_names: Vec<&str> = content["stages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["stage"].as_str().unwrap())
        .collect();
    assert_eq!(
        stage_names,
        vec!["Application Received", "Screening", "Technical Round", "HR Interview", "Offer"]
    );
    // every applicant has an application record
    assert_eq!(content["stages"][0]["applicants"], 24);
    assert_eq!(content["sources"].as_array().unwrap().len(), 4);
}

#[test]
fn experiment_plan_round_trip() {
    let records = FunnelReader::new(&fixture_path("funnel_small.csv"))
        .read()
        .unwrap();
    let dir = TempDir::new().unwrap();
    let writer = ResultWriter::new(dir.path(), RunName::new("plan").unwrap()).unwrap();

    let outcome = simulate_intervention(&records, "Screening", 0.2, None, 42).unwrap();
    let verdict = outcome.significance(0.05).ok();
    writer.write_intervention(&outcome, verdict.as_ref()).unwrap();
    let content = read_json(&dir.path().join("plan_intervention.json"));
    assert_eq!(content["stage"], "Screening");
    assert_eq!(content["sample_size"], outcome.sample_size);

    let analysis = power_analysis(0.20, 0.15, 0.05, 0.80).unwrap();
    let days = recommend_duration(100.0, analysis.sample_size_per_group).unwrap();
    writer.write_power(&analysis, Some((100.0, days))).unwrap();
    let content = read_json(&dir.path().join("plan_power.json"));
    assert_eq!(content["duration_days"], days);
    assert_eq!(content["baseline_rate"], 0.20);
}

#[test]
fn reader_fixture_files_match_expected_errors() {
    // in_progress.csv -> no terminal status
    let result = FunnelReader::new(&fixture_path("in_progress.csv")).read();
    assert!(
        matches!(
            result,
            Err(IoError::InvalidFunnel {
                source: FeatureError::MissingTerminalStatus { .. },
                ..
            })
        ),
        "in_progress.csv should give MissingTerminalStatus, got: {result:?}"
    );

    // scoring files may hold open histories
    let records = FunnelReader::new(&fixture_path("in_progress.csv"))
        .with_validation(false)
        .read()
        .unwrap();
    assert_eq!(records.len(), 2);

    // out_of_order.csv -> stage sequence goes backwards after a pass
    let result = FunnelReader::new(&fixture_path("out_of_order.csv")).read();
    assert!(
        matches!(
            result,
            Err(IoError::InvalidFunnel {
                source: FeatureError::NonMonotonicStage { .. },
                ..
            })
        ),
        "out_of_order.csv should give NonMonotonicStage, got: {result:?}"
    );
}
