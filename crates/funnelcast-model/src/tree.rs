use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::{
    ModelError,
    node::{Node, NodeIndex, arena_depth, impurity_importances, leaf_value},
    split::{SplitCriterion, find_best_split},
};

/// Number of target classes: retained (0) and drop-off (1).
pub(crate) const N_CLASSES: usize = 2;

/// Configuration for a single CART classification tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default               |
/// |---------------------|-----------------------|
/// | `criterion`         | `Gini`                |
/// | `max_depth`         | `None` (unlimited)    |
/// | `min_samples_split` | 2                     |
/// | `min_samples_leaf`  | 1                     |
/// | `max_features`      | `None` (all features) |
/// | `seed`              | 42                    |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    pub(crate) max_features: Option<usize>,
    pub(crate) seed: u64,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the maximum tree depth.
    ///
    /// `None` means grow until all leaves are pure or stopping conditions
    /// are met. `Some(d)` limits depth to `d` levels (root is depth 0).
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

    /// Set the maximum number of features to consider at each split.
    ///
    /// `None` means consider all features.
    #[must_use]
    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
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

    /// Return the maximum features to consider per split, if set.
    #[must_use]
    pub fn max_features(&self) -> Option<usize> {
        self.max_features
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a tree with unit sample weights.
    ///
    /// See [`DecisionTreeConfig::fit_weighted`] for the layout and errors.
    ///
    /// # Errors
    ///
    /// As [`DecisionTreeConfig::fit_weighted`].
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, ModelError> {
        let weights = vec![1.0; features.len()];
        self.fit_weighted(features, labels, &weights)
    }

    /// Train a tree where each sample counts with its weight in every
    /// impurity and leaf-probability computation.
    ///
    /// `features[sample_idx][feature_idx]`: row-major layout.
    /// `labels[sample_idx]`: 0 (retained) or 1 (drop-off).
    ///
    /// # Errors
    ///
    /// | Variant                                 | When                                            |
    /// |-----------------------------------------|-------------------------------------------------|
    /// | [`ModelError::EmptyDataset`]            | `features` is empty                             |
    /// | [`ModelError::ZeroFeatures`]            | rows have zero feature columns                  |
    /// | [`ModelError::LabelCountMismatch`]      | `labels` or `weights` length differs            |
    /// | [`ModelError::InvalidLabel`]            | a label is not 0 or 1                           |
    /// | [`ModelError::FeatureCountMismatch`]    | rows have inconsistent lengths                  |
    /// | [`ModelError::NonFiniteValue`]          | any value is NaN or infinite                    |
    /// | [`ModelError::InvalidMaxFeatures`]      | `max_features` resolves outside [1, n_features] |
    /// | [`ModelError::InvalidMaxDepth`]         | `max_depth` is `Some(0)`                        |
    /// | [`ModelError::InvalidMinSamplesSplit`]  | `min_samples_split` < 2                         |
    /// | [`ModelError::InvalidMinSamplesLeaf`]   | `min_samples_leaf` < 1                          |
    #[instrument(skip_all, fields(n_samples = features.len()))]
    pub fn fit_weighted(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        weights: &[f64],
    ) -> Result<DecisionTree, ModelError> {
        let n_features = validate_training_data(features, labels)?;
        if weights.len() != features.len() {
            return Err(ModelError::LabelCountMismatch {
                n_samples: features.len(),
                n_labels: weights.len(),
            });
        }
        validate_growth(self.max_depth, self.min_samples_split, self.min_samples_leaf)?;

        let max_features = self.max_features.unwrap_or(n_features);
        if max_features == 0 || max_features > n_features {
            return Err(ModelError::InvalidMaxFeatures {
                max_features,
                n_features,
            });
        }

        let columns = to_columns(features, n_features);
        let sample_indices: Vec<usize> = (0..features.len()).collect();
        Ok(self.grow(&columns, labels, weights, &sample_indices, max_features))
    }

    /// Grow a tree on pre-validated column-major data.
    ///
    /// `sample_indices` may repeat an index (bootstrap draws).
    pub(crate) fn grow(
        &self,
        columns: &[Vec<f64>],
        labels: &[usize],
        weights: &[f64],
        sample_indices: &[usize],
        max_features: usize,
    ) -> DecisionTree {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut arena: Vec<Node> = Vec::new();
        let mut builder = Builder {
            columns,
            labels,
            weights,
            config: self,
            max_features,
            rng: &mut rng,
            arena: &mut arena,
        };
        let root = builder.build(sample_indices, 0);

        debug!(
            root_index = root.index(),
            n_nodes = arena.len(),
            "decision tree built"
        );

        DecisionTree {
            nodes: arena,
            n_features: columns.len(),
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check a row-major binary training set and return its feature count.
pub(crate) fn validate_training_data(
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<usize, ModelError> {
    if features.is_empty() {
        return Err(ModelError::EmptyDataset);
    }
    if labels.len() != features.len() {
        return Err(ModelError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    if let Some((sample_index, &label)) =
        labels.iter().enumerate().find(|(_, l)| **l >= N_CLASSES)
    {
        return Err(ModelError::InvalidLabel {
            sample_index,
            label,
        });
    }

    let n_features = features[0].len();
    if n_features == 0 {
        return Err(ModelError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(n_features)
}

/// Reject label sets where only one class is present.
pub(crate) fn require_both_classes(labels: &[usize]) -> Result<(), ModelError> {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == labels.len() {
        return Err(ModelError::DegenerateTrainingSet {
            class: usize::from(positives > 0),
            n_samples: labels.len(),
        });
    }
    Ok(())
}

/// Check the growth limits shared by classification and regression trees.
pub(crate) fn validate_growth(
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
) -> Result<(), ModelError> {
    if let Some(d) = max_depth
        && d == 0
    {
        return Err(ModelError::InvalidMaxDepth { max_depth: 0 });
    }
    if min_samples_split < 2 {
        return Err(ModelError::InvalidMinSamplesSplit { min_samples_split });
    }
    if min_samples_leaf < 1 {
        return Err(ModelError::InvalidMinSamplesLeaf { min_samples_leaf });
    }
    Ok(())
}

/// Transpose row-major samples into one `Vec` per feature.
pub(crate) fn to_columns(features: &[Vec<f64>], n_features: usize) -> Vec<Vec<f64>> {
    (0..n_features)
        .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
        .collect()
}

struct Builder<'a, R> {
    columns: &'a [Vec<f64>],
    labels: &'a [usize],
    weights: &'a [f64],
    config: &'a DecisionTreeConfig,
    max_features: usize,
    rng: &'a mut R,
    arena: &'a mut Vec<Node>,
}

impl<R: rand::Rng> Builder<'_, R> {
    /// Recursively build the subtree for `sample_indices`, returning its root.
    fn build(&mut self, sample_indices: &[usize], depth: usize) -> NodeIndex {
        let n_samples = sample_indices.len();

        let mut class_totals = [0.0f64; N_CLASSES];
        for &si in sample_indices {
            class_totals[self.labels[si]] += self.weights[si];
        }
        let total: f64 = class_totals.iter().sum();
        let impurity = self.config.criterion.impurity(&class_totals, total);

        let depth_exceeded = self.config.max_depth.is_some_and(|max_d| depth >= max_d);
        let too_few = n_samples < self.config.min_samples_split;
        let pure = impurity.value() == 0.0;

        let split = if too_few || pure || depth_exceeded {
            None
        } else {
            find_best_split(
                self.columns,
                self.labels,
                self.weights,
                sample_indices,
                N_CLASSES,
                &self.config.criterion,
                self.max_features,
                self.config.min_samples_leaf,
                &mut *self.rng,
            )
        };

        let Some(split) = split else {
            let value = if total > 0.0 { class_totals[1] / total } else { 0.0 };
            let idx = self.arena.len();
            self.arena.push(Node::Leaf {
                value,
                impurity,
                n_samples,
            });
            return NodeIndex::new(idx);
        };

        // Reserve the slot, recurse, then overwrite with the split.
        let node_idx = self.arena.len();
        self.arena.push(Node::Leaf {
            value: 0.0,
            impurity,
            n_samples,
        });
        let left = self.build(&split.left_indices, depth + 1);
        let right = self.build(&split.right_indices, depth + 1);
        self.arena[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: split.impurity_decrease,
        };
        NodeIndex::new(node_idx)
    }
}

/// A fitted CART classification tree.
///
/// Each leaf stores the weighted fraction of drop-off samples that reached it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl DecisionTree {
    /// Return the drop-off probability for a single sample.
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
        Ok(leaf_value(&self.nodes, sample))
    }

    /// Predict the class label (1 when the drop-off probability exceeds 0.5).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<usize, ModelError> {
        Ok(usize::from(self.predict_proba(sample)? > 0.5))
    }

    /// Mean Decrease in Impurity feature importances, summing to 1.0
    /// (all zeros for a single-leaf tree).
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        impurity_importances(&self.nodes, self.n_features)
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree. A single leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        arena_depth(&self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<usize>) {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        (features, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn empty_dataset_error() {
        let err = DecisionTreeConfig::new().fit(&[], &[]).unwrap_err();
        assert!(matches!(err, ModelError::EmptyDataset));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let features = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let tree = DecisionTreeConfig::new().fit(&features, &[0, 0, 0]).unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.predict_proba(&[2.0, 3.0]).unwrap(), 0.0);
    }

    #[test]
    fn linearly_separable_correct_split() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        assert_eq!(tree.predict(&[2.0, 0.0]).unwrap(), 0);
        assert_eq!(tree.predict(&[11.0, 0.0]).unwrap(), 1);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn xor_needs_depth_at_least_2() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let tree = DecisionTreeConfig::new()
            .fit(&features, &[0, 1, 1, 0])
            .unwrap();
        assert!(tree.depth() >= 2);
    }

    #[test]
    fn weights_shift_leaf_probability() {
        // One unsplittable leaf with 3 retained and 1 drop-off sample.
        let features = vec![vec![0.0]; 4];
        let labels = vec![0, 0, 0, 1];
        let plain = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        assert!((plain.predict_proba(&[0.0]).unwrap() - 0.25).abs() < 1e-12);

        let weighted = DecisionTreeConfig::new()
            .fit_weighted(&features, &labels, &[1.0, 1.0, 1.0, 3.0])
            .unwrap();
        assert!((weighted.predict_proba(&[0.0]).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn feature_importances_sum_to_one() {
        let features = vec![
            vec![1.0, 100.0],
            vec![2.0, 200.0],
            vec![3.0, 300.0],
            vec![10.0, 100.0],
            vec![11.0, 200.0],
            vec![12.0, 300.0],
        ];
        let tree = DecisionTreeConfig::new()
            .fit(&features, &[0, 0, 0, 1, 1, 1])
            .unwrap();
        let sum: f64 = tree.feature_importances().iter().sum();
        assert!((sum - 1.0).abs() < 1e-10, "sum = {sum}");
    }

    #[test]
    fn max_depth_limits_tree() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
        ];
        let tree = DecisionTreeConfig::new()
            .with_max_depth(Some(1))
            .fit(&features, &[0, 1, 1, 0])
            .unwrap();
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn prediction_feature_mismatch() {
        let (features, labels) = separable();
        let tree = DecisionTreeConfig::new().fit(&features, &labels).unwrap();
        let err = tree.predict(&[1.0]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::PredictionFeatureMismatch { expected: 2, got: 1 }
        ));
    }

    #[test]
    fn input_validation_errors() {
        let config = DecisionTreeConfig::new();
        let err = config.fit(&[vec![1.0, 2.0], vec![3.0]], &[0, 1]).unwrap_err();
        assert!(matches!(err, ModelError::FeatureCountMismatch { .. }));

        let err = config.fit(&[vec![1.0, f64::NAN], vec![3.0, 4.0]], &[0, 1]).unwrap_err();
        assert!(matches!(err, ModelError::NonFiniteValue { sample_index: 0, feature_index: 1 }));

        let err = config.fit(&[vec![1.0]], &[3]).unwrap_err();
        assert!(matches!(err, ModelError::InvalidLabel { label: 3, .. }));

        let err = config.fit(&[vec![1.0]], &[0, 1]).unwrap_err();
        assert!(matches!(err, ModelError::LabelCountMismatch { .. }));
    }

    #[test]
    fn invalid_growth_limits() {
        let (features, labels) = separable();
        let err = DecisionTreeConfig::new()
            .with_max_depth(Some(0))
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidMaxDepth { .. }));
        let err = DecisionTreeConfig::new()
            .with_min_samples_split(1)
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidMinSamplesSplit { .. }));
        let err = DecisionTreeConfig::new()
            .with_max_features(Some(3))
            .fit(&features, &labels)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidMaxFeatures { .. }));
    }
}
