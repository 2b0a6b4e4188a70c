//! Held-out evaluation: accuracy, ROC-AUC, F1, confusion counts.

use tracing::{info, instrument};

use crate::confusion::ConfusionMatrix;
use crate::error::ModelError;
use crate::importance::RankedFeature;
use crate::model::TrainedModel;
use crate::predict::labels_from_probabilities;

/// Scalar quality metrics of a model on one labelled set.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Metrics {
    /// Fraction of samples whose thresholded prediction equals the label.
    pub accuracy: f64,
    /// Area under the ROC curve of the drop-off probabilities.
    pub roc_auc: f64,
    /// F1 score of the drop-off class at the 0.5 threshold.
    pub f1: f64,
}

/// Full evaluation report.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Evaluation {
    /// Scalar metrics.
    pub metrics: Metrics,
    /// Confusion counts at the 0.5 threshold.
    pub confusion: ConfusionMatrix,
    /// The model's stored importance ranking.
    pub importances: Vec<RankedFeature>,
}

/// Score a trained model on held-out data.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::EmptyDataset`] | `features` is empty |
/// | [`ModelError::LabelCountMismatch`] | lengths differ |
/// | [`ModelError::InvalidLabel`] | a label is not 0 or 1 |
/// | [`ModelError::UndefinedAuc`] | only one class in `labels` |
/// | [`ModelError::PredictionFeatureMismatch`] | wrong feature count |
#[instrument(skip_all, fields(algorithm = %model.algorithm(), n_samples = features.len()))]
pub fn evaluate(
    model: &TrainedModel,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<Evaluation, ModelError> {
    if features.len() != labels.len() {
        return Err(ModelError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    let probabilities = model.predict_drop_off_probability(features)?;
    let roc_auc = roc_auc(labels, &probabilities)?;
    let predicted = labels_from_probabilities(&probabilities);
    let confusion = ConfusionMatrix::from_labels(labels, &predicted)?;

    let metrics = Metrics {
        accuracy: confusion.accuracy(),
        roc_auc,
        f1: drop_off_f1(&confusion),
    };
    info!(
        accuracy = metrics.accuracy,
        roc_auc = metrics.roc_auc,
        f1 = metrics.f1,
        "model evaluated"
    );

    Ok(Evaluation {
        metrics,
        confusion,
        importances: model.importances().to_vec(),
    })
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores receive the average of the ranks they span, so a constant
/// scorer yields exactly 0.5.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ModelError::LabelCountMismatch`] | lengths differ |
/// | [`ModelError::InvalidLabel`] | a label is not 0 or 1 |
/// | [`ModelError::UndefinedAuc`] | either class is absent |
pub fn roc_auc(labels: &[usize], scores: &[f64]) -> Result<f64, ModelError> {
    if labels.len() != scores.len() {
        return Err(ModelError::LabelCountMismatch {
            n_samples: scores.len(),
            n_labels: labels.len(),
        });
    }
    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|(_, l)| **l > 1) {
        return Err(ModelError::InvalidLabel {
            sample_index,
            label,
        });
    }
    let n_positive = labels.iter().filter(|&&l| l == 1).count();
    let n_negative = labels.len() - n_positive;
    if n_positive == 0 || n_negative == 0 {
        return Err(ModelError::UndefinedAuc {
            n_positive,
            n_negative,
        });
    }

    let mut pairs: Vec<(f64, usize)> = scores.iter().copied().zip(labels.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut rank_sum_positive = 0.0;
    let mut i = 0;
    while i < pairs.len() {
        let mut j = i;
        while j + 1 < pairs.len() && pairs[j + 1].0 == pairs[i].0 {
            j += 1;
        }
        // 1-based ranks i+1 ..= j+1
        let average_rank = (i + j + 2) as f64 / 2.0;
        let positives_in_group = pairs[i..=j].iter().filter(|(_, l)| *l == 1).count();
        rank_sum_positive += average_rank * positives_in_group as f64;
        i = j + 1;
    }

    let n_pos = n_positive as f64;
    let u = rank_sum_positive - n_pos * (n_pos + 1.0) / 2.0;
    Ok(u / (n_pos * n_negative as f64))
}

/// F1 of the drop-off class.
///
/// # Errors
///
/// As [`ConfusionMatrix::from_labels`].
pub fn f1_score(labels: &[usize], predicted: &[usize]) -> Result<f64, ModelError> {
    Ok(drop_off_f1(&ConfusionMatrix::from_labels(labels, predicted)?))
}

fn drop_off_f1(confusion: &ConfusionMatrix) -> f64 {
    confusion.class_metrics()[1].f1
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- ROC-AUC ---

    #[test]
    fn perfect_ranking() {
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_ranking() {
        let auc = roc_auc(&[1, 1, 0, 0], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn constant_scores_give_half() {
        let auc = roc_auc(&[0, 1, 0, 1, 1], &[0.3; 5]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn known_value_with_tie() {
        // pairs (pos, neg): (0.8 vs 0.1) win, (0.8 vs 0.4) win,
        // (0.4 vs 0.1) win, (0.4 vs 0.4) tie -> 3.5 / 4
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.4, 0.8]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn single_class_undefined() {
        let err = roc_auc(&[1, 1, 1], &[0.2, 0.5, 0.9]).unwrap_err();
        assert!(matches!(
            err,
            ModelError::UndefinedAuc { n_positive: 3, n_negative: 0 }
        ));
    }

    // --- F1 ---

    #[test]
    fn f1_of_drop_off_class() {
        // tp 2, fp 1, fn 1 -> precision 2/3, recall 2/3
        let f1 = f1_score(&[1, 1, 1, 0, 0], &[1, 1, 0, 1, 0]).unwrap();
        assert!((f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn f1_without_positive_predictions_is_zero() {
        assert_eq!(f1_score(&[1, 0], &[0, 0]).unwrap(), 0.0);
    }
}
