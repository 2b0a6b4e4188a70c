//! Gradient boosting on binary log-loss.
//!
//! Starts from the prior log-odds and adds one shrunken regression tree per
//! stage, each fitted to the pseudo-residuals `y - p` of a random subsample
//! drawn without replacement, with Newton leaf values `Σ(y - p) / Σ p(1 - p)`.

use rand::SeedableRng;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::config::GradientBoostingConfig;
use crate::error::ModelError;
use crate::regression_tree::{RegressionTree, RegressionTreeConfig};
use crate::tree::{require_both_classes, to_columns, validate_growth, validate_training_data};

/// A fitted gradient-boosted ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GradientBoosting {
    pub(crate) initial_score: f64,
    pub(crate) learning_rate: f64,
    pub(crate) stages: Vec<RegressionTree>,
    pub(crate) n_features: usize,
}

impl GradientBoosting {
    /// Return the raw log-odds score for one sample.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn decision_function(&self, sample: &[f64]) -> Result<f64, ModelError> {
        if sample.len() != self.n_features {
            return Err(ModelError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.initial_score
            + self.learning_rate * self.stages.iter().map(|t| t.score(sample)).sum::<f64>())
    }

    /// Return the drop-off probability for one sample.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<f64, ModelError> {
        Ok(sigmoid(self.decision_function(sample)?))
    }

    /// Mean of per-stage squared-error importances, renormalized to sum to 1.0.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for stage in &self.stages {
            for (acc, v) in totals.iter_mut().zip(stage.feature_importances()) {
                *acc += v;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the number of boosting stages.
    #[must_use]
    pub fn n_stages(&self) -> usize {
        self.stages.len()
    }

    /// Return the number of features this ensemble was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the prior log-odds every prediction starts from.
    #[must_use]
    pub fn initial_score(&self) -> f64 {
        self.initial_score
    }
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Train the boosted ensemble. Stages are sequential; score updates run in parallel.
#[instrument(skip_all, fields(n_stages = config.n_stages, n_samples = features.len()))]
pub(crate) fn train(
    config: &GradientBoostingConfig,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<GradientBoosting, ModelError> {
    if config.n_stages == 0 {
        return Err(ModelError::InvalidTreeCount { n_trees: 0 });
    }
    if !(config.learning_rate > 0.0 && config.learning_rate <= 1.0) {
        return Err(ModelError::InvalidLearningRate {
            learning_rate: config.learning_rate,
        });
    }
    if !(config.subsample > 0.0 && config.subsample <= 1.0) {
        return Err(ModelError::InvalidSubsample {
            subsample: config.subsample,
        });
    }
    let n_features = validate_training_data(features, labels)?;
    require_both_classes(labels)?;
    validate_growth(config.max_depth, config.min_samples_split, config.min_samples_leaf)?;

    let n_samples = features.len();
    let columns = to_columns(features, n_features);
    let targets: Vec<f64> = labels.iter().map(|&l| l as f64).collect();

    let positive_rate = targets.iter().sum::<f64>() / n_samples as f64;
    let initial_score = (positive_rate / (1.0 - positive_rate)).ln();
    let n_drawn = ((n_samples as f64) * config.subsample).ceil().max(1.0) as usize;
    let tree_config = RegressionTreeConfig {
        max_depth: config.max_depth,
        min_samples_split: config.min_samples_split,
        min_samples_leaf: config.min_samples_leaf,
    };

    info!(
        n_stages = config.n_stages,
        n_samples,
        n_features,
        learning_rate = config.learning_rate,
        n_drawn,
        initial_score,
        "training gradient boosting"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut scores = vec![initial_score; n_samples];
    let mut stages = Vec::with_capacity(config.n_stages);

    for stage in 0..config.n_stages {
        let probabilities: Vec<f64> = scores.par_iter().map(|&s| sigmoid(s)).collect();
        let residuals: Vec<f64> = targets
            .iter()
            .zip(&probabilities)
            .map(|(y, p)| y - p)
            .collect();
        let hessians: Vec<f64> = probabilities.iter().map(|p| p * (1.0 - p)).collect();

        let mut drawn = if n_drawn < n_samples {
            sample(&mut rng, n_samples, n_drawn).into_vec()
        } else {
            (0..n_samples).collect()
        };
        drawn.sort_unstable();

        let tree = RegressionTree::fit(&columns, &residuals, &hessians, &drawn, tree_config);

        scores
            .par_iter_mut()
            .zip(features.par_iter())
            .for_each(|(score, row)| *score += config.learning_rate * tree.score(row));

        if stage % 50 == 0 {
            debug!(stage, depth = tree.depth(), "boosting stage fitted");
        }
        stages.push(tree);
    }

    info!(n_stages = stages.len(), "gradient boosting training complete");

    Ok(GradientBoosting {
        initial_score,
        learning_rate: config.learning_rate,
        stages,
        n_features,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_data() -> (Vec<Vec<f64>>, Vec<usize>) {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let x = i as f64;
            features.push(vec![x, (i % 5) as f64]);
            labels.push(usize::from(i >= 28));
        }
        (features, labels)
    }

    #[test]
    fn learns_threshold() {
        let (features, labels) = make_data();
        let model = GradientBoostingConfig::new(50)
            .unwrap()
            .with_max_depth(Some(2))
            .fit(&features, &labels)
            .unwrap();
        for (sample, &label) in features.iter().zip(&labels) {
            let p = model.predict_proba(sample).unwrap();
            assert_eq!(usize::from(p > 0.5), label, "p = {p} at {sample:?}");
        }
    }

    #[test]
    fn initial_score_is_prior_log_odds() {
        let (features, labels) = make_data();
        let model = GradientBoostingConfig::new(1)
            .unwrap()
            .fit(&features, &labels)
            .unwrap();
        // 12 positives of 40
        assert!((model.initial_score() - (0.3f64 / 0.7).ln()).abs() < 1e-12);
    }

    #[test]
    fn importances_sum_to_one() {
        let (features, labels) = make_data();
        let model = GradientBoostingConfig::new(10).unwrap().fit(&features, &labels).unwrap();
        let imp = model.feature_importances();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-10);
        assert!(imp[0] > imp[1]);
    }

    #[test]
    fn deterministic_with_same_seed() {
        let (features, labels) = make_data();
        let config = GradientBoostingConfig::new(20).unwrap().with_seed(5);
        let a = config.fit(&features, &labels).unwrap();
        let b = config.fit(&features, &labels).unwrap();
        for sample in &features {
            assert_eq!(
                a.predict_proba(sample).unwrap().to_bits(),
                b.predict_proba(sample).unwrap().to_bits()
            );
        }
    }

    #[test]
    fn invalid_hyperparameters() {
        let (features, labels) = make_data();
        let err = GradientBoostingConfig::new(5)
            .unwrap()
            .with_learning_rate(0.0)
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidLearningRate { .. }));
        let err = GradientBoostingConfig::new(5)
            .unwrap()
            .with_subsample(1.2)
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidSubsample { .. }));
    }

    #[test]
    fn single_class_is_degenerate() {
        let err = GradientBoostingConfig::new(5)
            .unwrap()
            .fit(&[vec![0.0], vec![1.0]], &[0, 0])
            .unwrap_err();
        assert!(matches!(err, ModelError::DegenerateTrainingSet { class: 0, .. }));
    }

    #[test]
    fn sigmoid_bounds() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(40.0) <= 1.0);
        assert!(sigmoid(-40.0) >= 0.0);
    }
}
