//! JSON result writer for training, scoring and experiment outputs.

use std::fs;
use std::path::{Path, PathBuf};

use funnelcast_experiment::{
    InterventionOutcome, OverallMetrics, PowerAnalysis, SignificanceResult, SourceMetrics,
    StageMetrics,
};
use funnelcast_features::FunnelRecord;
use funnelcast_model::{
    Algorithm, ClassMetrics, DECISION_THRESHOLD, Evaluation, Hyperparameters, Metrics,
    RankedFeature, TrainedModel,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::RunName;

/// Writes pipeline results to JSON files.
///
/// Creates the output directory on construction if it does not exist.
/// Output files are named `{run}_{kind}.json`; binary artifacts go to
/// `{run}_model.bin` and `{run}_encoder.bin`.
pub struct ResultWriter {
    output_dir: PathBuf,
    run: RunName,
}

impl ResultWriter {
    /// Create a new writer targeting the given directory and run name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::OutputDirCreate`] if the directory cannot be created.
    #[instrument(skip_all, fields(dir = %output_dir.display(), run = %run))]
    pub fn new(output_dir: &Path, run: RunName) -> Result<Self, IoError> {
        fs::create_dir_all(output_dir).map_err(|e| IoError::OutputDirCreate {
            path: output_dir.to_path_buf(),
            source: e,
        })?;
        debug!("output directory ready");
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            run,
        })
    }

    /// Write a held-out model evaluation to `{run}_evaluation.json`.
    ///
    /// `candidates` lists every algorithm's held-out metrics when several
    /// were compared; pass an empty slice otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_evaluation(
        &self,
        model: &TrainedModel,
        evaluation: &Evaluation,
        candidates: &[(Algorithm, Evaluation)],
        training: TrainingSummary,
    ) -> Result<(), IoError> {
        let artifact = EvaluationArtifact {
            run: self.run.as_str(),
            algorithm: model.algorithm(),
            hyperparameters: model.hyperparameters(),
            training,
            metrics: evaluation.metrics,
            confusion_matrix: evaluation.confusion.as_rows(),
            class_metrics: evaluation.confusion.class_metrics(),
            feature_importances: &evaluation.importances,
            candidates: candidates
                .iter()
                .map(|(algorithm, evaluation)| CandidateEntry {
                    algorithm: *algorithm,
                    metrics: evaluation.metrics,
                })
                .collect(),
        };
        let path = self.write_json("evaluation", &artifact)?;
        info!(path = %path.display(), "evaluation written");
        Ok(())
    }

    /// Write per-record drop-off probabilities to `{run}_predictions.json`.
    ///
    /// `records` and `probabilities` are parallel slices.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all, fields(n_records = records.len()))]
    pub fn write_predictions(
        &self,
        records: &[FunnelRecord],
        probabilities: &[f64],
    ) -> Result<(), IoError> {
        let predictions: Vec<PredictionEntry> = records
            .iter()
            .zip(probabilities)
            .map(|(record, &drop_off_probability)| PredictionEntry {
                applicant_id: record.applicant_id.as_str(),
                stage: &record.stage,
                stage_sequence: record.stage_sequence,
                drop_off_probability,
                predicted_drop_off: drop_off_probability > DECISION_THRESHOLD,
            })
            .collect();

        let artifact = PredictionsArtifact {
            run: self.run.as_str(),
            n_records: predictions.len(),
            n_predicted_drop_off: predictions.iter().filter(|p| p.predicted_drop_off).count(),
            threshold: DECISION_THRESHOLD,
            predictions,
        };
        let path = self.write_json("predictions", &artifact)?;
        info!(path = %path.display(), "predictions written");
        Ok(())
    }

    /// Write a two-group significance verdict to `{run}_significance.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_significance(&self, result: &SignificanceResult) -> Result<(), IoError> {
        let artifact = RunArtifact {
            run: self.run.as_str(),
            result,
        };
        let path = self.write_json("significance", &artifact)?;
        info!(path = %path.display(), "significance written");
        Ok(())
    }

    /// Write a sample-size plan to `{run}_power.json`.
    ///
    /// `duration` carries the daily volume and the recommended run length in
    /// days when a throughput was supplied.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_power(
        &self,
        analysis: &PowerAnalysis,
        duration: Option<(f64, u64)>,
    ) -> Result<(), IoError> {
        let artifact = PowerArtifact {
            run: self.run.as_str(),
            analysis,
            total_sample_size: analysis.total_sample_size(),
            daily_volume: duration.map(|(volume, _)| volume),
            duration_days: duration.map(|(_, days)| days),
        };
        let path = self.write_json("power", &artifact)?;
        info!(path = %path.display(), "power analysis written");
        Ok(())
    }

    /// Write funnel conversion aggregates to `{run}_funnel.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_funnel(
        &self,
        overall: &OverallMetrics,
        stages: &[StageMetrics],
        sources: &[SourceMetrics],
    ) -> Result<(), IoError> {
        let artifact = FunnelArtifact {
            run: self.run.as_str(),
            overall,
            stages,
            sources,
        };
        let path = self.write_json("funnel", &artifact)?;
        info!(path = %path.display(), "funnel report written");
        Ok(())
    }

    /// Write an intervention projection to `{run}_intervention.json`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be written.
    #[instrument(skip_all)]
    pub fn write_intervention(
        &self,
        outcome: &InterventionOutcome,
        significance: Option<&SignificanceResult>,
    ) -> Result<(), IoError> {
        let artifact = InterventionArtifact {
            run: self.run.as_str(),
            outcome,
            significance,
        };
        let path = self.write_json("intervention", &artifact)?;
        info!(path = %path.display(), "intervention written");
        Ok(())
    }

    /// Return the path where the model binary should be saved.
    ///
    /// Does not write anything; just computes `{output_dir}/{run}_model.bin`.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_model.bin", self.run.as_str()))
    }

    /// Return the path where the fitted encoder should be saved.
    #[must_use]
    pub fn encoder_path(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}_encoder.bin", self.run.as_str()))
    }

    fn write_json<T: Serialize>(&self, kind: &str, artifact: &T) -> Result<PathBuf, IoError> {
        let path = self
            .output_dir
            .join(format!("{}_{kind}.json", self.run.as_str()));
        let json = serde_json::to_string_pretty(artifact).map_err(|e| IoError::SerializeJson {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, &json).map_err(|e| IoError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}

/// Row counts of the data a model was trained and evaluated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrainingSummary {
    /// Training rows before resampling.
    pub n_train: usize,
    /// Held-out rows.
    pub n_test: usize,
    /// Synthetic rows added by the resampler (0 when disabled).
    pub n_synthetic: usize,
}

// --- Shadow structs for JSON serialization ---

#[derive(Serialize)]
struct EvaluationArtifact<'a> {
    run: &'a str,
    algorithm: Algorithm,
    hyperparameters: &'a Hyperparameters,
    training: TrainingSummary,
    metrics: Metrics,
    confusion_matrix: &'a [[usize; 2]; 2],
    class_metrics: Vec<ClassMetrics>,
    feature_importances: &'a [RankedFeature],
    candidates: Vec<CandidateEntry>,
}

#[derive(Serialize)]
struct CandidateEntry {
    algorithm: Algorithm,
    metrics: Metrics,
}

#[derive(Serialize)]
struct PredictionsArtifact<'a> {
    run: &'a str,
    n_records: usize,
    n_predicted_drop_off: usize,
    threshold: f64,
    predictions: Vec<PredictionEntry<'a>>,
}

#[derive(Serialize)]
struct PredictionEntry<'a> {
    applicant_id: &'a str,
    stage: &'a str,
    stage_sequence: u32,
    drop_off_probability: f64,
    predicted_drop_off: bool,
}

#[derive(Serialize)]
struct RunArtifact<'a, T> {
    run: &'a str,
    #[serde(flatten)]
    result: &'a T,
}

#[derive(Serialize)]
struct PowerArtifact<'a> {
    run: &'a str,
    #[serde(flatten)]
    analysis: &'a PowerAnalysis,
    total_sample_size: u64,
    daily_volume: Option<f64>,
    duration_days: Option<u64>,
}

#[derive(Serialize)]
struct FunnelArtifact<'a> {
    run: &'a str,
    overall: &'a OverallMetrics,
    stages: &'a [StageMetrics],
    sources: &'a [SourceMetrics],
}

#[derive(Serialize)]
struct InterventionArtifact<'a> {
    run: &'a str,
    #[serde(flatten)]
    outcome: &'a InterventionOutcome,
    significance: Option<&'a SignificanceResult>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use funnelcast_experiment::{
        FunnelFilter, overall_metrics, power_analysis, significance, source_metrics, stage_metrics,
    };
    use funnelcast_features::{ApplicantId, Status};
    use tempfile::TempDir;

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn record(applicant: &str, sequence: u32, status: Status) -> FunnelRecord {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        FunnelRecord {
            applicant_id: ApplicantId::new(applicant),
            source: "Referral".to_string(),
            job_role: "Sales Executive".to_string(),
            department: "Sales".to_string(),
            age: Some(29.0),
            gender: "Female".to_string(),
            education: Some(2.0),
            education_field: "Marketing".to_string(),
            application_date: date,
            stage: format!("Stage {sequence}"),
            stage_sequence: sequence,
            stage_date: date,
            status,
            days_since_application: Some(f64::from(sequence) * 3.0),
        }
    }

    fn writer(dir: &TempDir, run: &str) -> ResultWriter {
        ResultWriter::new(dir.path(), RunName::new(run).unwrap()).unwrap()
    }

    #[test]
    fn write_significance_json_structure() {
        let dir = TempDir::new().unwrap();
        let result = significance(50, 100, 70, 100, 0.05).unwrap();
        writer(&dir, "ab_test").write_significance(&result).unwrap();

        let content = read_json(&dir.path().join("ab_test_significance.json"));
        assert_eq!(content["run"], "ab_test");
        assert_eq!(content["control_success"], 50);
        assert_eq!(content["treatment_total"], 100);
        assert_eq!(content["is_significant"], true);
        assert!(content["p_value"].is_number());
        assert!(content["cohens_h"].is_number());
    }

    #[test]
    fn write_power_with_and_without_duration() {
        let dir = TempDir::new().unwrap();
        let analysis = power_analysis(0.20, 0.15, 0.05, 0.80).unwrap();

        writer(&dir, "plan").write_power(&analysis, Some((100.0, 59))).unwrap();
        let content = read_json(&dir.path().join("plan_power.json"));
        assert_eq!(content["sample_size_per_group"], analysis.sample_size_per_group);
        assert_eq!(content["total_sample_size"], analysis.total_sample_size());
        assert_eq!(content["duration_days"], 59);

        writer(&dir, "bare").write_power(&analysis, None).unwrap();
        let content = read_json(&dir.path().join("bare_power.json"));
        assert!(content["duration_days"].is_null());
        assert!(content["daily_volume"].is_null());
    }

    #[test]
    fn write_funnel_json_structure() {
        let dir = TempDir::new().unwrap();
        let records = vec![
            record("A", 1, Status::Passed),
            record("A", 2, Status::Hired),
            record("B", 1, Status::Rejected),
        ];
        writer(&dir, "funnel_q1")
            .write_funnel(
                &overall_metrics(&records, &FunnelFilter::new()),
                &stage_metrics(&records),
                &source_metrics(&records),
            )
            .unwrap();

        let content = read_json(&dir.path().join("funnel_q1_funnel.json"));
        assert_eq!(content["overall"]["total_applicants"], 2);
        assert_eq!(content["overall"]["hired_count"], 1);
        assert_eq!(content["stages"].as_array().unwrap().len(), 2);
        assert_eq!(content["sources"][0]["source"], "Referral");
    }

    #[test]
    fn write_predictions_flags_threshold() {
        let dir = TempDir::new().unwrap();
        let records = vec![record("A", 1, Status::Passed), record("B", 1, Status::Passed)];
        writer(&dir, "score")
            .write_predictions(&records, &[0.8, 0.5])
            .unwrap();

        let content = read_json(&dir.path().join("score_predictions.json"));
        assert_eq!(content["n_records"], 2);
        assert_eq!(content["n_predicted_drop_off"], 1);
        let predictions = content["predictions"].as_array().unwrap();
        assert_eq!(predictions[0]["applicant_id"], "A");
        assert_eq!(predictions[0]["predicted_drop_off"], true);
        // exactly at the threshold is retained
        assert_eq!(predictions[1]["predicted_drop_off"], false);
    }

    #[test]
    fn writer_creates_output_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested").join("deep");
        let writer = ResultWriter::new(&nested, RunName::new("nested_test").unwrap()).unwrap();
        let result = significance(10, 40, 12, 40, 0.05).unwrap();
        writer.write_significance(&result).unwrap();
        assert!(nested.join("nested_test_significance.json").exists());
    }

    #[test]
    fn artifact_paths() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir, "run1");
        assert_eq!(writer.model_path(), dir.path().join("run1_model.bin"));
        assert_eq!(writer.encoder_path(), dir.path().join("run1_encoder.bin"));
    }
}
