//! Batch prediction over any [`DropOffClassifier`].

use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::ensemble::DropOffClassifier;
use crate::error::ModelError;

/// Probability above which a sample is labelled a drop-off.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Drop-off probabilities for a batch of samples, computed in parallel.
///
/// # Errors
///
/// Returns [`ModelError::PredictionFeatureMismatch`] if any sample has the wrong feature count.
pub fn predict_proba_batch<C>(model: &C, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>
where
    C: DropOffClassifier + ?Sized,
{
    features
        .into_par_iter()
        .map(|sample| model.predict_proba(sample))
        .collect()
}

/// Label each probability: 1 when strictly above [`DECISION_THRESHOLD`].
#[must_use]
pub fn labels_from_probabilities(probabilities: &[f64]) -> Vec<usize> {
    probabilities
        .iter()
        .map(|&p| usize::from(p > DECISION_THRESHOLD))
        .collect()
}

/// Hard drop-off labels for a batch of samples.
///
/// # Errors
///
/// Returns [`ModelError::PredictionFeatureMismatch`] if any sample has the wrong feature count.
pub fn predict_batch<C>(model: &C, features: &[Vec<f64>]) -> Result<Vec<usize>, ModelError>
where
    C: DropOffClassifier + ?Sized,
{
    Ok(labels_from_probabilities(&predict_proba_batch(model, features)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RandomForestConfig;

    #[test]
    fn batch_matches_individual() {
        let features: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i >= 12)).collect();
        let forest = RandomForestConfig::new(8).unwrap().fit(&features, &labels).unwrap();

        let batch = predict_proba_batch(&forest, &features).unwrap();
        for (sample, p) in features.iter().zip(&batch) {
            assert_eq!(forest.predict_proba(sample).unwrap(), *p);
        }
        assert_eq!(predict_batch(&forest, &features).unwrap(), labels_from_probabilities(&batch));
    }

    #[test]
    fn threshold_is_strict() {
        assert_eq!(labels_from_probabilities(&[0.49, 0.5, 0.51]), vec![0, 0, 1]);
    }
}
