use std::collections::VecDeque;
use std::fmt;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Index into a `Vec<Node>` arena, identifying a specific node in a tree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a new node index from a zero-based arena position.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node impurity: Gini/entropy for classification trees, variance for
/// regression trees.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Impurity(f64);

impl Impurity {
    /// Create a new impurity value.
    pub(crate) fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw impurity value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Impurity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A node in a tree arena.
///
/// Trees are stored as `Vec<Node>` with children referenced by
/// [`NodeIndex`]. The root is always at index 0.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// An interior split node.
    Split {
        /// Feature used for the split.
        feature: FeatureIndex,
        /// Threshold value: samples with feature <= threshold go left.
        threshold: f64,
        /// Index of the left child node.
        left: NodeIndex,
        /// Index of the right child node.
        right: NodeIndex,
        /// Impurity at this node before splitting.
        impurity: Impurity,
        /// Number of training samples that reached this node.
        n_samples: usize,
        /// Weighted decrease in impurity from this split.
        impurity_decrease: f64,
    },
    /// A terminal leaf node.
    Leaf {
        /// Leaf output: the weighted drop-off fraction in a classification
        /// tree, the additive score in a regression tree.
        value: f64,
        /// Impurity at this leaf.
        impurity: Impurity,
        /// Number of training samples in this leaf.
        n_samples: usize,
    },
}

impl Node {
    /// Return the impurity at this node (before splitting for interior nodes).
    #[must_use]
    pub fn impurity(&self) -> Impurity {
        match self {
            Node::Split { impurity, .. } | Node::Leaf { impurity, .. } => *impurity,
        }
    }

    /// Return the number of training samples that reached this node.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        match self {
            Node::Split { n_samples, .. } | Node::Leaf { n_samples, .. } => *n_samples,
        }
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// Walk from the root to a leaf and return its value.
///
/// Goes left when `sample[feature] <= threshold`, right otherwise.
pub(crate) fn leaf_value(nodes: &[Node], sample: &[f64]) -> f64 {
    let mut idx = 0usize;
    loop {
        match &nodes[idx] {
            Node::Leaf { value, .. } => return *value,
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                idx = if sample[feature.index()] <= *threshold {
                    left.index()
                } else {
                    right.index()
                };
            }
        }
    }
}

/// Mean decrease in impurity per feature, normalized to sum to 1.0.
///
/// All zeros when the arena is a single leaf.
pub(crate) fn impurity_importances(nodes: &[Node], n_features: usize) -> Vec<f64> {
    let mut totals = vec![0.0f64; n_features];
    for node in nodes {
        if let Node::Split {
            feature,
            impurity_decrease,
            ..
        } = node
        {
            totals[feature.index()] += impurity_decrease;
        }
    }
    let sum: f64 = totals.iter().sum();
    if sum > 0.0 {
        totals.iter_mut().for_each(|v| *v /= sum);
    }
    totals
}

/// Maximum root-to-leaf depth; a lone root leaf has depth 0.
pub(crate) fn arena_depth(nodes: &[Node]) -> usize {
    if nodes.is_empty() {
        return 0;
    }
    let mut max_depth = 0usize;
    let mut queue = VecDeque::new();
    queue.push_back((0usize, 0usize));
    while let Some((node_idx, d)) = queue.pop_front() {
        match &nodes[node_idx] {
            Node::Leaf { .. } => max_depth = max_depth.max(d),
            Node::Split { left, right, .. } => {
                queue.push_back((left.index(), d + 1));
                queue.push_back((right.index(), d + 1));
            }
        }
    }
    max_depth
}
