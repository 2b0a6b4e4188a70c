//! The immutable trained-model bundle.

use crate::config::Algorithm;
use crate::ensemble::{DropOffClassifier, Ensemble};
use crate::error::ModelError;
use crate::grid::Hyperparameters;
use crate::importance::{RankedFeature, rank_features};
use crate::predict::{labels_from_probabilities, predict_proba_batch};

/// A fitted ensemble together with its column names and importance ranking.
///
/// Produced by [`crate::train`] or [`TrainedModel::load`]; never mutated
/// afterwards.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub(crate) ensemble: Ensemble,
    pub(crate) feature_names: Vec<String>,
    pub(crate) importances: Vec<RankedFeature>,
    pub(crate) hyperparameters: Hyperparameters,
}

impl TrainedModel {
    /// Bundle a fitted ensemble, ranking its impurity importances.
    pub(crate) fn new(
        ensemble: Ensemble,
        feature_names: Vec<String>,
        hyperparameters: Hyperparameters,
    ) -> Self {
        let importances = rank_features(&ensemble.feature_importances(), &feature_names);
        Self {
            ensemble,
            feature_names,
            importances,
            hyperparameters,
        }
    }

    /// Drop-off probability for each row of `features`.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] if a row has the wrong width.
    pub fn predict_drop_off_probability(&self, features: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        predict_proba_batch(&self.ensemble, features)
    }

    /// Hard drop-off labels (probability strictly above 0.5).
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] if a row has the wrong width.
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, ModelError> {
        Ok(labels_from_probabilities(&self.predict_drop_off_probability(features)?))
    }

    /// Return the ensemble family.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.hyperparameters.algorithm()
    }

    /// Borrow the fitted ensemble.
    #[must_use]
    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    /// Return the feature column names in training order.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the importance ranking, most important first.
    #[must_use]
    pub fn importances(&self) -> &[RankedFeature] {
        &self.importances
    }

    /// Return the configuration the ensemble was fitted with.
    #[must_use]
    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    /// Number of feature columns expected per row.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.ensemble.n_features()
    }
}
