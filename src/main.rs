use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use funnelcast_experiment::{
    ConfidenceInterval, FunnelFilter, InterventionOutcome, OverallMetrics, SignificanceResult,
    SourceMetrics, StageMetrics, overall_metrics, power_analysis, proportion_confidence_interval,
    recommend_duration, significance, simulate_intervention, source_metrics, stage_metrics,
};
use funnelcast_features::{
    FeatureEncoder, FittedEncodingState, FunnelRecord, Smote, SmoteConfig, StratifiedSplit,
    drop_off_rate, label, stratified_split, transform,
};
use funnelcast_io::{FunnelReader, ResultWriter, RunName, TrainingSummary};
use funnelcast_model::{
    Algorithm, DECISION_THRESHOLD, TrainedModel, TrainerConfig, evaluate, train,
    train_and_compare,
};

#[derive(Parser)]
#[command(name = "funnelcast")]
#[command(about = "Recruitment funnel drop-off prediction and experiment evaluation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for reproducibility
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Train a drop-off classifier and evaluate it on a held-out split
    Train {
        /// Path to the funnel CSV file
        #[arg(long)]
        data: PathBuf,

        /// Run name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        run: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Ensemble family: "bagged" or "boosted"
        #[arg(long, default_value = "bagged")]
        algorithm: String,

        /// Train both families and keep the higher held-out ROC-AUC
        #[arg(long, default_value_t = false)]
        compare: bool,

        /// Select hyperparameters by cross-validated grid search
        #[arg(long, default_value_t = false)]
        tune: bool,

        /// Number of cross-validation folds used by --tune
        #[arg(long, default_value_t = 3)]
        cv_folds: usize,

        /// Fraction of records held out for evaluation
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        /// Skip SMOTE rebalancing of the training partition
        #[arg(long, default_value_t = false)]
        no_smote: bool,

        /// Neighbours considered when synthesizing minority samples
        #[arg(long, default_value_t = 5)]
        k_neighbors: usize,
    },

    /// Score funnel records with a trained model
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the fitted encoder binary
        #[arg(long)]
        encoder: PathBuf,

        /// Path to the funnel CSV file to score
        #[arg(long)]
        data: PathBuf,

        /// Run name for output files
        #[arg(long)]
        run: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Chi-square test of a control group against a treatment group
    Significance {
        /// Conversions in the control group
        #[arg(long)]
        control_success: u64,

        /// Size of the control group
        #[arg(long)]
        control_total: u64,

        /// Conversions in the treatment group
        #[arg(long)]
        treatment_success: u64,

        /// Size of the treatment group
        #[arg(long)]
        treatment_total: u64,

        /// Significance level
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Sample size (and optionally run length) needed to detect an improvement
    Power {
        /// Current conversion rate
        #[arg(long)]
        baseline: f64,

        /// Relative improvement to detect (0.15 = +15%)
        #[arg(long)]
        improvement: f64,

        /// Significance level
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,

        /// Probability of detecting the improvement
        #[arg(long, default_value_t = 0.8)]
        power: f64,

        /// Applicants entering the experiment per day
        #[arg(long)]
        daily_volume: Option<f64>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Project the effect of improving one stage's pass rate
    Simulate {
        /// Path to the funnel CSV file
        #[arg(long)]
        data: PathBuf,

        /// Stage to improve
        #[arg(long)]
        stage: String,

        /// Relative pass-rate improvement (0.15 = +15%)
        #[arg(long)]
        improvement: f64,

        /// Draw this many stage records instead of using all of them
        #[arg(long)]
        sample_size: Option<usize>,

        /// Significance level for the projected comparison
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Stage, source and overall conversion metrics
    Funnel {
        /// Path to the funnel CSV file
        #[arg(long)]
        data: PathBuf,

        /// Restrict overall metrics to one source
        #[arg(long)]
        source: Option<String>,

        /// Restrict overall metrics to one department
        #[arg(long)]
        department: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

/// Optional JSON artifact for commands whose result is also printed.
#[derive(clap::Args, Debug, Clone)]
struct OutputArgs {
    /// Run name for output files; nothing is written when omitted
    #[arg(long)]
    run: Option<String>,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

impl OutputArgs {
    fn writer(&self) -> Result<Option<ResultWriter>> {
        let Some(run) = &self.run else {
            return Ok(None);
        };
        let run = RunName::new(run.as_str())?;
        Ok(Some(ResultWriter::new(&self.output_dir, run)?))
    }
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    run: String,
    algorithm: Algorithm,
    n_train: usize,
    n_test: usize,
    n_synthetic: usize,
    train_drop_off_rate: f64,
    accuracy: f64,
    roc_auc: f64,
    f1: f64,
    top_features: Vec<String>,
    model_path: PathBuf,
    encoder_path: PathBuf,
}

#[derive(Serialize)]
struct PredictOutput {
    run: String,
    algorithm: Algorithm,
    n_records: usize,
    n_predicted_drop_off: usize,
    mean_drop_off_probability: f64,
}

#[derive(Serialize)]
struct FunnelOutput<'a> {
    overall: &'a OverallMetrics,
    stages: &'a [StageMetrics],
    sources: &'a [SourceMetrics],
}

#[derive(Serialize)]
struct PowerOutput {
    baseline_rate: f64,
    target_rate: f64,
    effect_size: f64,
    sample_size_per_group: u64,
    total_sample_size: u64,
    duration_days: Option<u64>,
}

#[derive(Serialize)]
struct SimulateOutput {
    #[serde(flatten)]
    outcome: InterventionOutcome,
    baseline_interval: ConfidenceInterval,
    projected_interval: ConfidenceInterval,
    significance: Option<SignificanceResult>,
}

fn parse_algorithm(s: &str) -> Result<Algorithm> {
    Algorithm::ALL
        .into_iter()
        .find(|a| a.as_str() == s)
        .with_context(|| format!("unknown algorithm: {s} (expected bagged or boosted)"))
}

fn read_funnel(path: &Path, validate: bool) -> Result<Vec<FunnelRecord>> {
    FunnelReader::new(path)
        .with_validation(validate)
        .read()
        .with_context(|| format!("failed to read funnel CSV {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Configure Rayon thread pool
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Train {
            data,
            run,
            output_dir,
            algorithm,
            compare,
            tune,
            cv_folds,
            test_fraction,
            no_smote,
            k_neighbors,
        } => {
            let run_name = RunName::new(run.as_str())?;
            let algorithm = parse_algorithm(&algorithm)?;

            // 1. Read and split records before any fitting
            let records = read_funnel(&data, true)?;
            let labels = label(&records);
            let split = stratified_split(&labels, test_fraction, cli.seed)
                .context("failed to split records")?;
            let train_records = StratifiedSplit::select(&records, &split.train);
            let test_records = StratifiedSplit::select(&records, &split.test);
            let train_labels = StratifiedSplit::select(&labels, &split.train);
            let test_labels = StratifiedSplit::select(&labels, &split.test);
            info!(
                n_train = train_records.len(),
                n_test = test_records.len(),
                drop_off_rate = drop_off_rate(&labels),
                "records split"
            );

            // 2. Fit the encoder on the training partition; category codes span all records
            let (train_matrix, state) = FeatureEncoder::default()
                .fit_transform_with_vocabulary(&train_records, &records)
                .context("failed to fit feature encoder")?;
            let test_matrix =
                transform(&test_records, &state).context("failed to encode held-out records")?;
            let feature_names = train_matrix.feature_names().to_vec();

            // 3. Rebalance the training partition
            let (train_features, train_labels_balanced, n_synthetic) = if no_smote {
                (train_matrix.into_rows(), train_labels.clone(), 0)
            } else {
                let smote = Smote::new(SmoteConfig::new(k_neighbors)?.with_seed(cli.seed));
                let resampled = smote
                    .resample(train_matrix.rows(), &train_labels)
                    .context("resampling failed")?;
                (resampled.features, resampled.labels, resampled.n_synthetic)
            };

            // 4. Train (and optionally compare) then evaluate
            let config = TrainerConfig::new(algorithm)
                .with_tune(tune)
                .with_cv_folds(cv_folds)
                .with_seed(cli.seed);
            let (model, evaluation, candidates) = if compare {
                let comparison = train_and_compare(
                    &train_features,
                    &train_labels_balanced,
                    test_matrix.rows(),
                    &test_labels,
                    &feature_names,
                    &config,
                )
                .context("model comparison failed")?;
                (comparison.best, comparison.best_evaluation, comparison.evaluations)
            } else {
                let model = train(&train_features, &train_labels_balanced, &feature_names, &config)
                    .context("training failed")?;
                let evaluation = evaluate(&model, test_matrix.rows(), &test_labels)
                    .context("evaluation failed")?;
                (model, evaluation, Vec::new())
            };
            info!(
                algorithm = %model.algorithm(),
                roc_auc = evaluation.metrics.roc_auc,
                accuracy = evaluation.metrics.accuracy,
                "model evaluated"
            );

            // 5. Persist artifacts and the evaluation report
            let writer = ResultWriter::new(&output_dir, run_name)?;
            model
                .save(writer.model_path())
                .context("failed to save model")?;
            state
                .save(writer.encoder_path())
                .context("failed to save encoder")?;
            info!(path = %writer.model_path().display(), "model saved");

            writer.write_evaluation(
                &model,
                &evaluation,
                &candidates,
                TrainingSummary {
                    n_train: train_records.len(),
                    n_test: test_records.len(),
                    n_synthetic,
                },
            )?;

            let output = TrainOutput {
                run,
                algorithm: model.algorithm(),
                n_train: train_records.len(),
                n_test: test_records.len(),
                n_synthetic,
                train_drop_off_rate: drop_off_rate(&train_labels),
                accuracy: evaluation.metrics.accuracy,
                roc_auc: evaluation.metrics.roc_auc,
                f1: evaluation.metrics.f1,
                top_features: evaluation
                    .importances
                    .iter()
                    .take(5)
                    .map(|f| f.name.clone())
                    .collect(),
                model_path: writer.model_path(),
                encoder_path: writer.encoder_path(),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Predict {
            model,
            encoder,
            data,
            run,
            output_dir,
        } => {
            let run_name = RunName::new(run.as_str())?;

            // 1. Load artifacts
            let trained = TrainedModel::load(&model).context("failed to load model")?;
            let state = FittedEncodingState::load(&encoder).context("failed to load encoder")?;
            info!(
                algorithm = %trained.algorithm(),
                n_features = trained.n_features(),
                "model loaded"
            );

            // 2. Read and encode; open histories are expected here
            let records = read_funnel(&data, false)?;
            let matrix = transform(&records, &state).context("failed to encode records")?;

            // 3. Score
            let probabilities = trained
                .predict_drop_off_probability(matrix.rows())
                .context("prediction failed")?;

            let writer = ResultWriter::new(&output_dir, run_name)?;
            writer.write_predictions(&records, &probabilities)?;

            let output = PredictOutput {
                run,
                algorithm: trained.algorithm(),
                n_records: records.len(),
                n_predicted_drop_off: probabilities
                    .iter()
                    .filter(|&&p| p > DECISION_THRESHOLD)
                    .count(),
                mean_drop_off_probability: probabilities.iter().sum::<f64>()
                    / probabilities.len() as f64,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Command::Significance {
            control_success,
            control_total,
            treatment_success,
            treatment_total,
            alpha,
            output,
        } => {
            let result = significance(
                control_success,
                control_total,
                treatment_success,
                treatment_total,
                alpha,
            )
            .context("significance test failed")?;
            info!(
                p_value = result.p_value,
                is_significant = result.is_significant,
                "significance computed"
            );

            if let Some(writer) = output.writer()? {
                writer.write_significance(&result)?;
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Power {
            baseline,
            improvement,
            alpha,
            power,
            daily_volume,
            output,
        } => {
            let analysis = power_analysis(baseline, improvement, alpha, power)
                .context("power analysis failed")?;
            let duration = daily_volume
                .map(|volume| {
                    recommend_duration(volume, analysis.sample_size_per_group)
                        .map(|days| (volume, days))
                })
                .transpose()
                .context("duration recommendation failed")?;

            if let Some(writer) = output.writer()? {
                writer.write_power(&analysis, duration)?;
            }

            let summary = PowerOutput {
                baseline_rate: analysis.baseline_rate,
                target_rate: analysis.target_rate,
                effect_size: analysis.effect_size,
                sample_size_per_group: analysis.sample_size_per_group,
                total_sample_size: analysis.total_sample_size(),
                duration_days: duration.map(|(_, days)| days),
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Simulate {
            data,
            stage,
            improvement,
            sample_size,
            alpha,
            output,
        } => {
            let records = read_funnel(&data, true)?;
            let outcome = simulate_intervention(&records, &stage, improvement, sample_size, cli.seed)
                .context("intervention simulation failed")?;

            // A stage everyone already passes has no testable contrast.
            let verdict = match outcome.significance(alpha) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(error = %e, "projected comparison not testable");
                    None
                }
            };

            if let Some(writer) = output.writer()? {
                writer.write_intervention(&outcome, verdict.as_ref())?;
            }

            let summary = SimulateOutput {
                baseline_interval: proportion_confidence_interval(
                    outcome.baseline_pass_rate,
                    outcome.sample_size,
                )?,
                projected_interval: proportion_confidence_interval(
                    outcome.new_pass_rate,
                    outcome.sample_size,
                )?,
                outcome,
                significance: verdict,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Funnel {
            data,
            source,
            department,
            output,
        } => {
            let records = read_funnel(&data, true)?;

            let mut filter = FunnelFilter::new();
            if let Some(source) = source {
                filter = filter.with_source(source);
            }
            if let Some(department) = department {
                filter = filter.with_department(department);
            }

            let overall = overall_metrics(&records, &filter);
            let stages = stage_metrics(&records);
            let sources = source_metrics(&records);
            info!(
                total_applicants = overall.total_applicants,
                hire_rate = overall.hire_rate,
                "funnel aggregated"
            );

            if let Some(writer) = output.writer()? {
                writer.write_funnel(&overall, &stages, &sources)?;
            }

            let summary = FunnelOutput {
                overall: &overall,
                stages: &stages,
                sources: &sources,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
