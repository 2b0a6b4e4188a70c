//! Least-squares regression trees used as boosting stages.
//!
//! Splits minimize the summed squared error of the pseudo-residuals; each
//! leaf stores a one-step Newton estimate `Σ residual / Σ hessian` so the
//! tree output is directly a log-odds update.

use crate::node::{FeatureIndex, Impurity, Node, NodeIndex, arena_depth, impurity_importances, leaf_value};
use crate::split::partition;

/// Hessian sums below this produce a zero leaf update.
const MIN_HESSIAN: f64 = 1e-12;

/// Growth limits for a boosting stage.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegressionTreeConfig {
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
}

/// A fitted regression tree over column-major features.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegressionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
}

impl RegressionTree {
    /// Fit on pre-validated `columns[feature_idx][sample_idx]`, using only
    /// `sample_indices`.
    pub(crate) fn fit(
        columns: &[Vec<f64>],
        residuals: &[f64],
        hessians: &[f64],
        sample_indices: &[usize],
        config: RegressionTreeConfig,
    ) -> Self {
        let mut nodes = Vec::new();
        let mut builder = Builder {
            columns,
            residuals,
            hessians,
            config,
            nodes: &mut nodes,
        };
        builder.build(sample_indices, 0);
        Self {
            nodes,
            n_features: columns.len(),
        }
    }

    /// Return the leaf score for a sample with the expected feature count.
    pub(crate) fn score(&self, sample: &[f64]) -> f64 {
        leaf_value(&self.nodes, sample)
    }

    /// Squared-error reduction per feature, normalized to sum to 1.0.
    #[must_use]
    pub fn feature_importances(&self) -> Vec<f64> {
        impurity_importances(&self.nodes, self.n_features)
    }

    /// Return the maximum depth of the tree.
    #[must_use]
    pub fn depth(&self) -> usize {
        arena_depth(&self.nodes)
    }

    /// Return the total number of nodes.
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

struct Builder<'a> {
    columns: &'a [Vec<f64>],
    residuals: &'a [f64],
    hessians: &'a [f64],
    config: RegressionTreeConfig,
    nodes: &'a mut Vec<Node>,
}

struct Best {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl Builder<'_> {
    fn build(&mut self, sample_indices: &[usize], depth: usize) -> NodeIndex {
        let n_samples = sample_indices.len();
        let n = n_samples as f64;
        let (sum, sum_sq) = sample_indices.iter().fold((0.0, 0.0), |(s, q), &si| {
            let r = self.residuals[si];
            (s + r, q + r * r)
        });
        let sse = (sum_sq - sum * sum / n).max(0.0);
        let impurity = Impurity::new(sse / n);

        let depth_exceeded = self.config.max_depth.is_some_and(|max_d| depth >= max_d);
        let too_few = n_samples < self.config.min_samples_split;

        let best = if too_few || depth_exceeded || sse <= 0.0 {
            None
        } else {
            self.find_split(sample_indices, sum, sse)
        };

        let Some(best) = best else {
            let h: f64 = sample_indices.iter().map(|&si| self.hessians[si]).sum();
            let value = if h > MIN_HESSIAN { sum / h } else { 0.0 };
            let idx = self.nodes.len();
            self.nodes.push(Node::Leaf {
                value,
                impurity,
                n_samples,
            });
            return NodeIndex::new(idx);
        };

        let (left_indices, right_indices) =
            partition(&self.columns[best.feature], sample_indices, best.threshold);

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: 0.0,
            impurity,
            n_samples,
        });
        let left = self.build(&left_indices, depth + 1);
        let right = self.build(&right_indices, depth + 1);
        self.nodes[node_idx] = Node::Split {
            feature: FeatureIndex::new(best.feature),
            threshold: best.threshold,
            left,
            right,
            impurity,
            n_samples,
            impurity_decrease: best.decrease,
        };
        NodeIndex::new(node_idx)
    }

    /// Exhaustive scan over every feature for the largest SSE reduction.
    fn find_split(&self, sample_indices: &[usize], total: f64, parent_sse: f64) -> Option<Best> {
        let n_samples = sample_indices.len();
        let min_leaf = self.config.min_samples_leaf;
        let mut best: Option<Best> = None;

        for (feature, column) in self.columns.iter().enumerate() {
            let mut sorted: Vec<(f64, f64)> = sample_indices
                .iter()
                .map(|&si| (column[si], self.residuals[si]))
                .collect();
            sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for i in 0..(n_samples - 1) {
                left_sum += sorted[i].1;
                let n_left = i + 1;
                let n_right = n_samples - n_left;
                if sorted[i].0 == sorted[i + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let right_sum = total - left_sum;
                // SSE(parent) - SSE(left) - SSE(right) reduces to this form.
                let gain = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64
                    - total * total / n_samples as f64;
                if best.as_ref().is_none_or(|b| gain > b.decrease) {
                    best = Some(Best {
                        feature,
                        threshold: (sorted[i].0 + sorted[i + 1].0) / 2.0,
                        decrease: gain.clamp(0.0, parent_sse),
                    });
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_depth: Option<usize>) -> RegressionTreeConfig {
        RegressionTreeConfig {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn step_function_recovered() {
        let columns = vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]];
        let residuals = vec![-1.0, -1.0, -1.0, 2.0, 2.0, 2.0];
        let hessians = vec![1.0; 6];
        let indices: Vec<usize> = (0..6).collect();
        let tree = RegressionTree::fit(&columns, &residuals, &hessians, &indices, config(Some(3)));
        assert_eq!(tree.depth(), 1);
        assert!((tree.score(&[2.0]) + 1.0).abs() < 1e-12);
        assert!((tree.score(&[5.5]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn newton_leaf_divides_by_hessian() {
        let columns = vec![vec![0.0, 0.0]];
        let residuals = vec![0.5, 0.5];
        let hessians = vec![0.25, 0.25];
        let tree = RegressionTree::fit(&columns, &residuals, &hessians, &[0, 1], config(None));
        assert_eq!(tree.n_nodes(), 1);
        assert!((tree.score(&[0.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn only_selected_samples_used() {
        let columns = vec![vec![0.0, 0.0, 0.0]];
        let residuals = vec![1.0, 1.0, 100.0];
        let hessians = vec![1.0; 3];
        let tree = RegressionTree::fit(&columns, &residuals, &hessians, &[0, 1], config(None));
        assert!((tree.score(&[0.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn importances_follow_informative_feature() {
        let columns = vec![
            vec![5.0, 5.0, 5.0, 5.0],
            vec![1.0, 2.0, 3.0, 4.0],
        ];
        let residuals = vec![0.0, 0.0, 1.0, 1.0];
        let hessians = vec![1.0; 4];
        let tree = RegressionTree::fit(&columns, &residuals, &hessians, &[0, 1, 2, 3], config(None));
        let imp = tree.feature_importances();
        assert_eq!(imp[0], 0.0);
        assert!((imp[1] - 1.0).abs() < 1e-12);
    }
}
