//! Training entry points: fixed defaults or cross-validated grid search.

use tracing::{info, instrument};

use crate::config::Algorithm;
use crate::cv::CrossValidation;
use crate::error::ModelError;
use crate::grid::{GridSearch, Hyperparameters, ParamGrid};
use crate::metrics::{Evaluation, evaluate};
use crate::model::TrainedModel;
use crate::tree::{require_both_classes, validate_training_data};

/// How [`train`] chooses and fits an ensemble.
///
/// # Defaults
///
/// | Parameter   | Default  |
/// |-------------|----------|
/// | `algorithm` | `Bagged` |
/// | `tune`      | `false`  |
/// | `cv_folds`  | 3        |
/// | `seed`      | 42       |
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrainerConfig {
    algorithm: Algorithm,
    tune: bool,
    cv_folds: usize,
    seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Bagged,
            tune: false,
            cv_folds: 3,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    /// Train `algorithm` with default settings for everything else.
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Enable or disable grid search.
    #[must_use]
    pub fn with_tune(mut self, tune: bool) -> Self {
        self.tune = tune;
        self
    }

    /// Set the number of grid-search folds.
    #[must_use]
    pub fn with_cv_folds(mut self, cv_folds: usize) -> Self {
        self.cv_folds = cv_folds;
        self
    }

    /// Set the seed used for fold shuffling and ensemble training.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the algorithm.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Return the algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Return whether grid search is enabled.
    #[must_use]
    pub fn tune(&self) -> bool {
        self.tune
    }

    /// Return the number of grid-search folds.
    #[must_use]
    pub fn cv_folds(&self) -> usize {
        self.cv_folds
    }

    /// Return the seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Fit a drop-off classifier.
///
/// With `tune` off the algorithm's default configuration is fitted. With
/// `tune` on, every [`ParamGrid`] candidate is scored by stratified
/// cross-validated ROC-AUC and the winner is refit on all of `features`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::EmptyDataset`] | `features` is empty |
/// | [`ModelError::FeatureNameMismatch`] | `feature_names` length differs from the row width |
/// | [`ModelError::DegenerateTrainingSet`] | only one class is present |
/// | [`ModelError::InvalidFoldCount`] | `tune` with fewer than 2 folds |
/// | [`ModelError::TooFewSamplesForFolds`] | `tune` and a class is smaller than the fold count |
/// | Other model errors | From underlying validation and training |
#[instrument(skip_all, fields(algorithm = %config.algorithm, tune = config.tune, n_samples = features.len()))]
pub fn train(
    features: &[Vec<f64>],
    labels: &[usize],
    feature_names: &[String],
    config: &TrainerConfig,
) -> Result<TrainedModel, ModelError> {
    let n_features = validate_training_data(features, labels)?;
    if feature_names.len() != n_features {
        return Err(ModelError::FeatureNameMismatch {
            n_features,
            n_names: feature_names.len(),
        });
    }
    require_both_classes(labels)?;

    let params = if config.tune {
        let cv = CrossValidation::new(config.cv_folds)?.with_seed(config.seed);
        let grid = ParamGrid::for_algorithm(config.algorithm, config.seed);
        let search = GridSearch::new(cv).run(&grid, features, labels)?;
        info!(best_score = search.best_score(), "selected grid candidate");
        search.best_params().clone()
    } else {
        Hyperparameters::default_for(config.algorithm, config.seed)
    };

    let ensemble = params.fit(features, labels)?;
    let model = TrainedModel::new(ensemble, feature_names.to_vec(), params);

    if let Some(top) = model.importances().first() {
        info!(top_feature = %top.name, importance = top.importance, "training complete");
    }
    Ok(model)
}

/// The winner of [`train_and_compare`] plus every candidate's held-out report.
#[derive(Debug, Clone)]
pub struct Comparison {
    /// The model with the highest held-out ROC-AUC.
    pub best: TrainedModel,
    /// Its held-out evaluation.
    pub best_evaluation: Evaluation,
    /// Held-out evaluation of each algorithm, in [`Algorithm::ALL`] order.
    pub evaluations: Vec<(Algorithm, Evaluation)>,
}

/// Train both ensemble families and keep the one with the higher held-out ROC-AUC.
///
/// `config.algorithm()` is ignored; ties go to the boosted model.
///
/// # Errors
///
/// Any error of [`train`] or [`evaluate`].
#[instrument(skip_all, fields(tune = config.tune, n_train = train_features.len(), n_test = test_features.len()))]
pub fn train_and_compare(
    train_features: &[Vec<f64>],
    train_labels: &[usize],
    test_features: &[Vec<f64>],
    test_labels: &[usize],
    feature_names: &[String],
    config: &TrainerConfig,
) -> Result<Comparison, ModelError> {
    let mut candidates: Vec<(TrainedModel, Evaluation)> = Vec::with_capacity(Algorithm::ALL.len());
    for algorithm in Algorithm::ALL {
        let candidate_config = config.clone().with_algorithm(algorithm);
        let model = train(train_features, train_labels, feature_names, &candidate_config)?;
        let evaluation = evaluate(&model, test_features, test_labels)?;
        info!(%algorithm, roc_auc = evaluation.metrics.roc_auc, "candidate evaluated");
        candidates.push((model, evaluation));
    }

    let roc_aucs: Vec<f64> = candidates.iter().map(|(_, e)| e.metrics.roc_auc).collect();
    let best_index = best_by_auc(&roc_aucs);

    let evaluations = candidates
        .iter()
        .map(|(model, evaluation)| (model.algorithm(), evaluation.clone()))
        .collect();
    let (best, best_evaluation) = candidates.swap_remove(best_index);
    info!(algorithm = %best.algorithm(), roc_auc = best_evaluation.metrics.roc_auc, "selected model");

    Ok(Comparison {
        best,
        best_evaluation,
        evaluations,
    })
}

/// Index of the highest score. Later entries win ties.
fn best_by_auc(roc_aucs: &[f64]) -> usize {
    let mut best = 0;
    for (i, &auc) in roc_aucs.iter().enumerate().skip(1) {
        if auc >= roc_aucs[best] {
            best = i;
        }
    }
    best
}
