//! Configuration builders for the two ensemble families.

use std::fmt;

use crate::boost::GradientBoosting;
use crate::error::ModelError;
use crate::forest::RandomForest;
use crate::split::SplitCriterion;

/// The ensemble family to train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Algorithm {
    /// Random forest: bootstrap-aggregated CART trees.
    Bagged,
    /// Gradient-boosted regression trees on log-loss.
    Boosted,
}

impl Algorithm {
    /// Both families, in comparison order.
    pub const ALL: [Algorithm; 2] = [Algorithm::Bagged, Algorithm::Boosted];

    /// Lowercase name used in logs and reports.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Algorithm::Bagged => "bagged",
            Algorithm::Boosted => "boosted",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy for determining the number of features to consider at each split.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MaxFeatures {
    /// Square root of total features.
    Sqrt,
    /// Log base 2 of total features.
    Log2,
    /// A fraction of total features (must be in (0.0, 1.0]).
    Fraction(f64),
    /// A fixed count.
    Fixed(usize),
    /// All features (no subsampling).
    All,
}

impl MaxFeatures {
    /// Resolve to a concrete count for `n_features` columns.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidMaxFeatures`] if the count is outside `[1, n_features]`.
    pub fn resolve(self, n_features: usize) -> Result<usize, ModelError> {
        let resolved = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor().max(1.0) as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor().max(1.0) as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f).floor().max(1.0) as usize,
            MaxFeatures::Fixed(n) => n,
            MaxFeatures::All => n_features,
        };
        if resolved == 0 || resolved > n_features {
            return Err(ModelError::InvalidMaxFeatures {
                max_features: resolved,
                n_features,
            });
        }
        Ok(resolved)
    }
}

/// How training samples are weighted by class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ClassWeight {
    /// Every sample counts once.
    Uniform,
    /// Each class gets weight `n_samples / (2 · class_count)`.
    Balanced,
}

impl ClassWeight {
    /// Per-sample weights for `labels`.
    #[must_use]
    pub fn sample_weights(self, labels: &[usize]) -> Vec<f64> {
        match self {
            ClassWeight::Uniform => vec![1.0; labels.len()],
            ClassWeight::Balanced => {
                let mut counts = [0usize; 2];
                for &l in labels {
                    counts[l] += 1;
                }
                let n = labels.len() as f64;
                let class_weight = counts.map(|c| if c == 0 { 0.0 } else { n / (2.0 * c as f64) });
                labels.iter().map(|&l| class_weight[l]).collect()
            }
        }
    }
}

/// Configuration for bagged Random Forest training.
///
/// Construct via [`RandomForestConfig::new`] or [`Default`], then chain
/// `with_*` methods.
///
/// # Defaults
///
/// | Parameter            | Default    |
/// |----------------------|------------|
/// | `n_trees`            | 200        |
/// | `max_features`       | `Sqrt`     |
/// | `max_depth`          | `Some(20)` |
/// | `min_samples_split`  | 5          |
/// | `min_samples_leaf`   | 2          |
/// | `criterion`          | `Gini`     |
/// | `class_weight`       | `Balanced` |
/// | `seed`               | 42         |
/// | `bootstrap_fraction` | 1.0        |
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) max_features: MaxFeatures,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) class_weight: ClassWeight,
    pub(crate) seed: u64,
    pub(crate) bootstrap_fraction: f64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_features: MaxFeatures::Sqrt,
            max_depth: Some(20),
            min_samples_split: 5,
            min_samples_leaf: 2,
            criterion: SplitCriterion::Gini,
            class_weight: ClassWeight::Balanced,
            seed: 42,
            bootstrap_fraction: 1.0,
        }
    }
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees and default
    /// values for everything else.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, ModelError> {
        if n_trees == 0 {
            return Err(ModelError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            ..Self::default()
        })
    }

    // --- Setters ---

    /// Set the max features strategy.
    #[must_use]
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf after a split.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the class weighting scheme.
    #[must_use]
    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the bootstrap fraction (proportion of samples drawn per tree).
    #[must_use]
    pub fn with_bootstrap_fraction(mut self, bootstrap_fraction: f64) -> Self {
        self.bootstrap_fraction = bootstrap_fraction;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return the max features strategy.
    #[must_use]
    pub fn max_features(&self) -> MaxFeatures {
        self.max_features
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the class weighting scheme.
    #[must_use]
    pub fn class_weight(&self) -> ClassWeight {
        self.class_weight
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the bootstrap fraction.
    #[must_use]
    pub fn bootstrap_fraction(&self) -> f64 {
        self.bootstrap_fraction
    }

    /// Train a Random Forest on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]`: row-major layout.
    /// `labels[sample_idx]`: 0 (retained) or 1 (drop-off).
    ///
    /// # Errors
    ///
    /// | Variant                                  | When                                              |
    /// |------------------------------------------|---------------------------------------------------|
    /// | [`ModelError::InvalidTreeCount`]         | `n_trees` is zero                                 |
    /// | [`ModelError::EmptyDataset`]             | `features` is empty                               |
    /// | [`ModelError::DegenerateTrainingSet`]    | only one class is present                         |
    /// | [`ModelError::FeatureCountMismatch`]     | rows have inconsistent lengths                    |
    /// | [`ModelError::NonFiniteValue`]           | any value is NaN or infinite                      |
    /// | [`ModelError::InvalidMaxFeatures`]       | resolved max_features is outside [1, n_features]  |
    /// | [`ModelError::InvalidBootstrapFraction`] | bootstrap_fraction is not in (0.0, 1.0]           |
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<RandomForest, ModelError> {
        crate::forest::train(self, features, labels)
    }
}

/// Configuration for gradient-boosted trees on binary log-loss.
///
/// # Defaults
///
/// | Parameter           | Default   |
/// |---------------------|-----------|
/// | `n_stages`          | 200       |
/// | `learning_rate`     | 0.1       |
/// | `max_depth`         | `Some(5)` |
/// | `min_samples_split` | 2         |
/// | `min_samples_leaf`  | 1         |
/// | `subsample`         | 0.8       |
/// | `seed`              | 42        |
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GradientBoostingConfig {
    pub(crate) n_stages: usize,
    pub(crate) learning_rate: f64,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) subsample: f64,
    pub(crate) seed: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self {
            n_stages: 200,
            learning_rate: 0.1,
            max_depth: Some(5),
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 0.8,
            seed: 42,
        }
    }
}

impl GradientBoostingConfig {
    /// Create a new config with the given number of boosting stages.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidTreeCount`] if `n_stages` is zero.
    pub fn new(n_stages: usize) -> Result<Self, ModelError> {
        if n_stages == 0 {
            return Err(ModelError::InvalidTreeCount { n_trees: n_stages });
        }
        Ok(Self {
            n_stages,
            ..Self::default()
        })
    }

    // --- Setters ---

    /// Set the shrinkage applied to every stage.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the maximum depth of each stage tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the minimum number of samples required to attempt a split.
    #[must_use]
    pub fn with_min_samples_split(mut self, min_samples_split: usize) -> Self {
        self.min_samples_split = min_samples_split;
        self
    }

    /// Set the minimum number of samples required in each leaf.
    #[must_use]
    pub fn with_min_samples_leaf(mut self, min_samples_leaf: usize) -> Self {
        self.min_samples_leaf = min_samples_leaf;
        self
    }

    /// Set the fraction of samples drawn (without replacement) per stage.
    #[must_use]
    pub fn with_subsample(mut self, subsample: f64) -> Self {
        self.subsample = subsample;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the number of boosting stages.
    #[must_use]
    pub fn n_stages(&self) -> usize {
        self.n_stages
    }

    /// Return the learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Return the maximum depth of each stage tree.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the minimum samples required to split a node.
    #[must_use]
    pub fn min_samples_split(&self) -> usize {
        self.min_samples_split
    }

    /// Return the minimum samples required in each leaf.
    #[must_use]
    pub fn min_samples_leaf(&self) -> usize {
        self.min_samples_leaf
    }

    /// Return the subsample fraction.
    #[must_use]
    pub fn subsample(&self) -> f64 {
        self.subsample
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a gradient-boosted ensemble.
    ///
    /// # Errors
    ///
    /// | Variant                               | When                                  |
    /// |---------------------------------------|---------------------------------------|
    /// | [`ModelError::InvalidTreeCount`]      | `n_stages` is zero                    |
    /// | [`ModelError::InvalidLearningRate`]   | learning rate not in (0.0, 1.0]       |
    /// | [`ModelError::InvalidSubsample`]      | subsample not in (0.0, 1.0]           |
    /// | [`ModelError::EmptyDataset`]          | `features` is empty                   |
    /// | [`ModelError::DegenerateTrainingSet`] | only one class is present             |
    /// | [`ModelError::NonFiniteValue`]        | any value is NaN or infinite          |
    pub fn fit(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<GradientBoosting, ModelError> {
        crate::boost::train(self, features, labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forest_defaults() {
        let config = RandomForestConfig::default();
        assert_eq!(config.n_trees(), 200);
        assert_eq!(config.max_depth(), Some(20));
        assert_eq!(config.min_samples_split(), 5);
        assert_eq!(config.min_samples_leaf(), 2);
        assert_eq!(config.class_weight(), ClassWeight::Balanced);
        assert_eq!(config.seed(), 42);
    }

    #[test]
    fn boosting_defaults() {
        let config = GradientBoostingConfig::default();
        assert_eq!(config.n_stages(), 200);
        assert_eq!(config.max_depth(), Some(5));
        assert!((config.learning_rate() - 0.1).abs() < f64::EPSILON);
        assert!((config.subsample() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_counts_rejected() {
        assert!(matches!(
            RandomForestConfig::new(0).unwrap_err(),
            ModelError::InvalidTreeCount { n_trees: 0 }
        ));
        assert!(GradientBoostingConfig::new(0).is_err());
    }

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(19).unwrap(), 4);
        assert_eq!(MaxFeatures::Log2.resolve(19).unwrap(), 4);
        assert_eq!(MaxFeatures::All.resolve(19).unwrap(), 19);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(19).unwrap(), 9);
        assert!(MaxFeatures::Fixed(20).resolve(19).is_err());
    }

    #[test]
    fn balanced_weights_equalize_class_mass() {
        let labels = vec![0, 0, 0, 0, 0, 0, 1, 1];
        let weights = ClassWeight::Balanced.sample_weights(&labels);
        let mass0: f64 = weights[..6].iter().sum();
        let mass1: f64 = weights[6..].iter().sum();
        assert!((mass0 - mass1).abs() < 1e-12);
        assert!((mass0 + mass1 - 8.0).abs() < 1e-12);
        assert_eq!(ClassWeight::Uniform.sample_weights(&labels), vec![1.0; 8]);
    }
}
