//! Stratified k-fold cross-validation scored by ROC-AUC.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::error::ModelError;
use crate::grid::Hyperparameters;
use crate::metrics::roc_auc;
use crate::predict::predict_proba_batch;
use crate::tree::N_CLASSES;

/// Cross-validation configuration.
///
/// Construct via [`CrossValidation::new`], then chain `with_seed` if desired.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    n_folds: usize,
    seed: u64,
}

/// Results of stratified k-fold cross-validation.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationResult {
    /// Held-out ROC-AUC for each fold.
    pub fold_scores: Vec<f64>,
    /// Mean ROC-AUC across folds.
    pub mean_score: f64,
    /// Population standard deviation of fold scores.
    pub std_score: f64,
}

impl CrossValidation {
    /// Create a new cross-validation config with the given number of folds.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidFoldCount`] if `n_folds` < 2.
    pub fn new(n_folds: usize) -> Result<Self, ModelError> {
        if n_folds < 2 {
            return Err(ModelError::InvalidFoldCount { n_folds });
        }
        Ok(Self { n_folds, seed: 42 })
    }

    /// Set the random seed for fold shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of folds.
    #[must_use]
    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    /// Return the fold-shuffling seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Fit `params` on every fold's complement and score it on the fold.
    ///
    /// Folds are built per class, so every held-out fold contains both
    /// classes and its ROC-AUC is defined.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::EmptyDataset`] | Zero samples |
    /// | [`ModelError::LabelCountMismatch`] | `features` and `labels` differ in length |
    /// | [`ModelError::InvalidLabel`] | A label is not 0 or 1 |
    /// | [`ModelError::TooFewSamplesForFolds`] | A class has fewer samples than folds |
    /// | Other model errors | From underlying training |
    #[instrument(skip_all, fields(n_folds = self.n_folds, n_samples = features.len(), algorithm = %params.algorithm()))]
    pub fn evaluate(
        &self,
        params: &Hyperparameters,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<CrossValidationResult, ModelError> {
        if features.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        if features.len() != labels.len() {
            return Err(ModelError::LabelCountMismatch {
                n_samples: features.len(),
                n_labels: labels.len(),
            });
        }

        let fold_assignments = self.stratified_folds(labels)?;
        let mut fold_scores = Vec::with_capacity(self.n_folds);

        for fold in 0..self.n_folds {
            let mut train_features = Vec::new();
            let mut train_labels = Vec::new();
            let mut test_features = Vec::new();
            let mut test_labels = Vec::new();

            for (i, &assigned_fold) in fold_assignments.iter().enumerate() {
                if assigned_fold == fold {
                    test_features.push(features[i].clone());
                    test_labels.push(labels[i]);
                } else {
                    train_features.push(features[i].clone());
                    train_labels.push(labels[i]);
                }
            }

            let fold_params = params.clone().with_seed(params.seed().wrapping_add(fold as u64));
            let model = fold_params.fit(&train_features, &train_labels)?;
            let probabilities = predict_proba_batch(&model, &test_features)?;
            let score = roc_auc(&test_labels, &probabilities)?;
            fold_scores.push(score);

            debug!(fold, roc_auc = score, "fold completed");
        }

        let mean_score = fold_scores.iter().sum::<f64>() / self.n_folds as f64;
        let std_score = (fold_scores
            .iter()
            .map(|&s| (s - mean_score).powi(2))
            .sum::<f64>()
            / self.n_folds as f64)
            .sqrt();

        info!(mean_score, std_score, "cross-validation complete");

        Ok(CrossValidationResult {
            fold_scores,
            mean_score,
            std_score,
        })
    }

    /// Create stratified fold assignments.
    ///
    /// Groups samples by class, shuffles within each class, then
    /// round-robins across folds.
    fn stratified_folds(&self, labels: &[usize]) -> Result<Vec<usize>, ModelError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut class_indices: Vec<Vec<usize>> = vec![vec![]; N_CLASSES];
        for (sample_index, &label) in labels.iter().enumerate() {
            if label >= N_CLASSES {
                return Err(ModelError::InvalidLabel {
                    sample_index,
                    label,
                });
            }
            class_indices[label].push(sample_index);
        }

        for (class, indices) in class_indices.iter().enumerate() {
            if indices.len() < self.n_folds {
                return Err(ModelError::TooFewSamplesForFolds {
                    class,
                    count: indices.len(),
                    n_folds: self.n_folds,
                });
            }
        }

        let mut fold_assignments = vec![0usize; labels.len()];
        for indices in &mut class_indices {
            indices.shuffle(&mut rng);
            for (j, &idx) in indices.iter().enumerate() {
                fold_assignments[idx] = j % self.n_folds;
            }
        }

        Ok(fold_assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RandomForestConfig;

    fn separable_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            features.push(vec![i as f64 * 0.1, 0.5]);
            labels.push(0);
        }
        for i in 0..30 {
            features.push(vec![10.0 + i as f64 * 0.1, 0.5]);
            labels.push(1);
        }
        (features, labels)
    }

    fn small_forest() -> Hyperparameters {
        Hyperparameters::Bagged(RandomForestConfig::new(10).unwrap())
    }

    #[test]
    fn separable_folds_score_high() {
        let (features, labels) = separable_data();
        let cv = CrossValidation::new(3).unwrap().with_seed(7);
        let result = cv.evaluate(&small_forest(), &features, &labels).unwrap();
        assert_eq!(result.fold_scores.len(), 3);
        assert!(result.mean_score > 0.95, "mean = {}", result.mean_score);
        assert!(result.std_score >= 0.0);
    }

    #[test]
    fn same_seed_same_scores() {
        let (features, labels) = separable_data();
        let cv = CrossValidation::new(3).unwrap();
        let a = cv.evaluate(&small_forest(), &features, &labels).unwrap();
        let b = cv.evaluate(&small_forest(), &features, &labels).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn folds_are_stratified() {
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i % 4 == 0)).collect();
        let cv = CrossValidation::new(5).unwrap();
        let folds = cv.stratified_folds(&labels).unwrap();
        for fold in 0..5 {
            let positives = folds
                .iter()
                .zip(&labels)
                .filter(|&(&f, &l)| f == fold && l == 1)
                .count();
            assert_eq!(positives, 1);
        }
    }

    #[test]
    fn invalid_fold_count() {
        assert!(CrossValidation::new(0).is_err());
        assert!(CrossValidation::new(1).is_err());
    }

    #[test]
    fn too_few_samples_for_folds() {
        let features = vec![vec![1.0], vec![2.0], vec![10.0], vec![11.0], vec![12.0]];
        let labels = vec![0, 0, 1, 1, 1];
        let cv = CrossValidation::new(3).unwrap();
        let err = cv.evaluate(&small_forest(), &features, &labels).unwrap_err();
        assert!(matches!(
            err,
            ModelError::TooFewSamplesForFolds {
                class: 0,
                count: 2,
                n_folds: 3
            }
        ));
    }
}
