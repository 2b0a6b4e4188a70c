//! Confusion matrix and per-class classification metrics.

use std::fmt;

use crate::error::ModelError;

/// Class display names in label order.
const CLASS_NAMES: [&str; 2] = ["retained", "drop_off"];

/// A 2x2 confusion matrix for drop-off classification.
///
/// Entry `matrix[true_class][predicted_class]` counts how many samples
/// with true label `true_class` were predicted as `predicted_class`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ConfusionMatrix {
    matrix: [[usize; 2]; 2],
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassMetrics {
    /// The class index.
    pub class: usize,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this class.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from true and predicted labels.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::EmptyDataset`] | Zero labels provided |
    /// | [`ModelError::LabelCountMismatch`] | Slices differ in length |
    /// | [`ModelError::InvalidLabel`] | A label is not 0 or 1 |
    pub fn from_labels(true_labels: &[usize], predicted: &[usize]) -> Result<Self, ModelError> {
        if true_labels.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        if true_labels.len() != predicted.len() {
            return Err(ModelError::LabelCountMismatch {
                n_samples: predicted.len(),
                n_labels: true_labels.len(),
            });
        }
        let mut matrix = [[0usize; 2]; 2];
        for (sample_index, (&t, &p)) in true_labels.iter().zip(predicted).enumerate() {
            if t > 1 || p > 1 {
                return Err(ModelError::InvalidLabel {
                    sample_index,
                    label: t.max(p),
                });
            }
            matrix[t][p] += 1;
        }
        Ok(Self { matrix })
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct = self.matrix[0][0] + self.matrix[1][1];
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        (0..2)
            .map(|c| {
                let other = 1 - c;
                let tp = self.matrix[c][c];
                let fp = self.matrix[other][c];
                let fn_ = self.matrix[c][other];
                let support = tp + fn_;
                let precision = if tp + fp == 0 {
                    0.0
                } else {
                    tp as f64 / (tp + fp) as f64
                };
                let recall = if support == 0 {
                    0.0
                } else {
                    tp as f64 / support as f64
                };
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    class: c,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Drop-offs predicted as drop-offs.
    #[must_use]
    pub fn true_positives(&self) -> usize {
        self.matrix[1][1]
    }

    /// Retained samples predicted as drop-offs.
    #[must_use]
    pub fn false_positives(&self) -> usize {
        self.matrix[0][1]
    }

    /// Retained samples predicted as retained.
    #[must_use]
    pub fn true_negatives(&self) -> usize {
        self.matrix[0][0]
    }

    /// Drop-offs predicted as retained.
    #[must_use]
    pub fn false_negatives(&self) -> usize {
        self.matrix[1][0]
    }

    /// Return the total number of samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[[usize; 2]; 2] {
        &self.matrix
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "")?;
        for name in CLASS_NAMES {
            write!(f, " {:>10}", format!("pred_{name}"))?;
        }
        writeln!(f)?;
        for (name, row) in CLASS_NAMES.iter().zip(&self.matrix) {
            write!(f, "{:>10}", format!("true_{name}"))?;
            for val in row {
                write!(f, " {val:>10}")?;
            }
            writeln!(f)?;
        }
        writeln!(f)?;
        writeln!(f, "{:>10} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1", "support")?;
        for m in self.class_metrics() {
            writeln!(
                f,
                "{:>10} {:>9.3} {:>9.3} {:>9.3} {:>9}",
                CLASS_NAMES[m.class], m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}
