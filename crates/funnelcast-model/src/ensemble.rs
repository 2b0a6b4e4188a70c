//! The fitted-ensemble abstraction shared by bagging and boosting.

use crate::boost::GradientBoosting;
use crate::error::ModelError;
use crate::forest::RandomForest;

/// A fitted binary classifier that scores drop-off risk.
pub trait DropOffClassifier: Send + Sync {
    /// Number of feature columns expected per sample.
    fn n_features(&self) -> usize;

    /// Probability in `[0, 1]` that the sample is a drop-off.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] on a wrong-length sample.
    fn predict_proba(&self, sample: &[f64]) -> Result<f64, ModelError>;

    /// Normalized impurity-based importance of each feature column.
    fn feature_importances(&self) -> Vec<f64>;
}

impl DropOffClassifier for RandomForest {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, sample: &[f64]) -> Result<f64, ModelError> {
        RandomForest::predict_proba(self, sample)
    }

    fn feature_importances(&self) -> Vec<f64> {
        RandomForest::feature_importances(self)
    }
}

impl DropOffClassifier for GradientBoosting {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, sample: &[f64]) -> Result<f64, ModelError> {
        GradientBoosting::predict_proba(self, sample)
    }

    fn feature_importances(&self) -> Vec<f64> {
        GradientBoosting::feature_importances(self)
    }
}

/// One of the two supported ensemble families.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Ensemble {
    /// Bagged trees with averaged leaf probabilities.
    RandomForest(RandomForest),
    /// Additive log-odds trees.
    GradientBoosting(GradientBoosting),
}

impl Ensemble {
    fn inner(&self) -> &dyn DropOffClassifier {
        match self {
            Ensemble::RandomForest(forest) => forest,
            Ensemble::GradientBoosting(boosted) => boosted,
        }
    }
}

impl DropOffClassifier for Ensemble {
    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn predict_proba(&self, sample: &[f64]) -> Result<f64, ModelError> {
        self.inner().predict_proba(sample)
    }

    fn feature_importances(&self) -> Vec<f64> {
        self.inner().feature_importances()
    }
}

impl From<RandomForest> for Ensemble {
    fn from(forest: RandomForest) -> Self {
        Ensemble::RandomForest(forest)
    }
}

impl From<GradientBoosting> for Ensemble {
    fn from(boosted: GradientBoosting) -> Self {
        Ensemble::GradientBoosting(boosted)
    }
}
