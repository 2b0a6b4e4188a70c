//! Bagged Random Forest with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::ModelError;
use crate::tree::{
    DecisionTree, DecisionTreeConfig, require_both_classes, to_columns, validate_growth,
    validate_training_data,
};

/// A fitted Random Forest ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
}

impl RandomForest {
    /// Return the mean of the trees' drop-off probabilities for one sample.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict_proba(&self, sample: &[f64]) -> Result<f64, ModelError> {
        if sample.len() != self.n_features {
            return Err(ModelError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut total = 0.0;
        for tree in &self.trees {
            total += tree.predict_proba(sample)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    /// Mean of per-tree MDI importances, renormalized to sum to 1.0.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            for (acc, v) in totals.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the fitted trees.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Draw `draw_count` sample indices with replacement.
fn bootstrap_sample(n_samples: usize, draw_count: usize, rng: &mut impl Rng) -> Vec<usize> {
    (0..draw_count).map(|_| rng.gen_range(0..n_samples)).collect()
}

/// Train the Random Forest ensemble.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<RandomForest, ModelError> {
    if config.n_trees == 0 {
        return Err(ModelError::InvalidTreeCount { n_trees: 0 });
    }
    let n_features = validate_training_data(features, labels)?;
    require_both_classes(labels)?;
    validate_growth(config.max_depth, config.min_samples_split, config.min_samples_leaf)?;

    let max_features = config.max_features.resolve(n_features)?;
    if config.bootstrap_fraction <= 0.0 || config.bootstrap_fraction > 1.0 {
        return Err(ModelError::InvalidBootstrapFraction {
            fraction: config.bootstrap_fraction,
        });
    }

    let n_samples = features.len();
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;
    // Class weights come from the full training set, not each bootstrap.
    let weights = config.class_weight.sample_weights(labels);
    let columns = to_columns(features, n_features);

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        max_features,
        draw_count,
        class_weight = ?config.class_weight,
        "training random forest"
    );

    // Per-tree seeds from the master RNG keep results independent of thread scheduling.
    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let tree_config = DecisionTreeConfig::new()
        .with_criterion(config.criterion)
        .with_max_depth(config.max_depth)
        .with_min_samples_split(config.min_samples_split)
        .with_min_samples_leaf(config.min_samples_leaf)
        .with_max_features(Some(max_features));

    let trees: Vec<DecisionTree> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let bootstrap = bootstrap_sample(n_samples, draw_count, &mut rng);
            tree_config
                .clone()
                .with_seed(rng.r#gen())
                .grow(&columns, labels, &weights, &bootstrap, max_features)
        })
        .collect();

    debug!(
        n_trees_trained = trees.len(),
        mean_depth = trees.iter().map(DecisionTree::depth).sum::<usize>() as f64 / trees.len() as f64,
        "tree training complete"
    );
    info!("random forest training complete");

    Ok(RandomForest { trees, n_features })
}
