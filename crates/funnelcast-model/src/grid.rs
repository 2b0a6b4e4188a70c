//! Hyperparameter grids and cross-validated grid search.

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{Algorithm, ClassWeight, GradientBoostingConfig, RandomForestConfig};
use crate::cv::{CrossValidation, CrossValidationResult};
use crate::ensemble::Ensemble;
use crate::error::ModelError;

/// A complete training configuration for one ensemble family.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Hyperparameters {
    /// Random forest settings.
    Bagged(RandomForestConfig),
    /// Gradient boosting settings.
    Boosted(GradientBoostingConfig),
}

impl Hyperparameters {
    /// Default settings for `algorithm`, seeded with `seed`.
    #[must_use]
    pub fn default_for(algorithm: Algorithm, seed: u64) -> Self {
        match algorithm {
            Algorithm::Bagged => Hyperparameters::Bagged(RandomForestConfig::default().with_seed(seed)),
            Algorithm::Boosted => {
                Hyperparameters::Boosted(GradientBoostingConfig::default().with_seed(seed))
            }
        }
    }

    /// The family these settings train.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Hyperparameters::Bagged(_) => Algorithm::Bagged,
            Hyperparameters::Boosted(_) => Algorithm::Boosted,
        }
    }

    /// Return the training seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        match self {
            Hyperparameters::Bagged(config) => config.seed(),
            Hyperparameters::Boosted(config) => config.seed(),
        }
    }

    /// Replace the training seed.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        match self {
            Hyperparameters::Bagged(config) => Hyperparameters::Bagged(config.with_seed(seed)),
            Hyperparameters::Boosted(config) => Hyperparameters::Boosted(config.with_seed(seed)),
        }
    }

    /// Fit the configured ensemble.
    ///
    /// # Errors
    ///
    /// Any error of [`RandomForestConfig::fit`] or [`GradientBoostingConfig::fit`].
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<Ensemble, ModelError> {
        match self {
            Hyperparameters::Bagged(config) => config.fit(features, labels).map(Ensemble::from),
            Hyperparameters::Boosted(config) => config.fit(features, labels).map(Ensemble::from),
        }
    }
}

/// The candidate configurations searched for one algorithm.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    algorithm: Algorithm,
    candidates: Vec<Hyperparameters>,
}

impl ParamGrid {
    /// The fixed search grid for `algorithm`.
    ///
    /// | Algorithm | Axes |
    /// |---|---|
    /// | `Bagged`  | trees {100, 200} × depth {10, 20, none} × split {2, 5} × leaf {1, 2} |
    /// | `Boosted` | depth {3, 5, 7} × learning rate {0.01, 0.1} × stages {100, 200} × subsample {0.8, 1.0} |
    ///
    /// Bagged candidates use uniform class weights; only the untuned
    /// default forest balances classes.
    #[must_use]
    pub fn for_algorithm(algorithm: Algorithm, seed: u64) -> Self {
        let mut candidates = Vec::new();
        match algorithm {
            Algorithm::Bagged => {
                for n_trees in [100, 200] {
                    for max_depth in [Some(10), Some(20), None] {
                        for min_samples_split in [2, 5] {
                            for min_samples_leaf in [1, 2] {
                                let config = RandomForestConfig {
                                    n_trees,
                                    ..RandomForestConfig::default()
                                }
                                .with_max_depth(max_depth)
                                .with_min_samples_split(min_samples_split)
                                .with_min_samples_leaf(min_samples_leaf)
                                .with_class_weight(ClassWeight::Uniform)
                                .with_seed(seed);
                                candidates.push(Hyperparameters::Bagged(config));
                            }
                        }
                    }
                }
            }
            Algorithm::Boosted => {
                for max_depth in [3, 5, 7] {
                    for learning_rate in [0.01, 0.1] {
                        for n_stages in [100, 200] {
                            for subsample in [0.8, 1.0] {
                                let config = GradientBoostingConfig {
                                    n_stages,
                                    ..GradientBoostingConfig::default()
                                }
                                .with_max_depth(Some(max_depth))
                                .with_learning_rate(learning_rate)
                                .with_subsample(subsample)
                                .with_seed(seed);
                                candidates.push(Hyperparameters::Boosted(config));
                            }
                        }
                    }
                }
            }
        }
        Self {
            algorithm,
            candidates,
        }
    }

    /// A grid over an explicit candidate list.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyDataset`] if `candidates` is empty.
    pub fn from_candidates(
        algorithm: Algorithm,
        candidates: Vec<Hyperparameters>,
    ) -> Result<Self, ModelError> {
        if candidates.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        Ok(Self {
            algorithm,
            candidates,
        })
    }

    /// Return the searched algorithm.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Return the candidate configurations in search order.
    #[must_use]
    pub fn candidates(&self) -> &[Hyperparameters] {
        &self.candidates
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the grid has no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// One scored grid candidate.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    /// The configuration evaluated.
    pub params: Hyperparameters,
    /// Its cross-validation scores.
    pub cv: CrossValidationResult,
}

/// Outcome of a grid search.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// Index into `scores` of the winning candidate.
    pub best_index: usize,
    /// Every candidate with its scores, in grid order.
    pub scores: Vec<ScoredCandidate>,
}

impl GridSearchResult {
    /// The winning configuration.
    #[must_use]
    pub fn best_params(&self) -> &Hyperparameters {
        &self.scores[self.best_index].params
    }

    /// Mean cross-validated ROC-AUC of the winner.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.scores[self.best_index].cv.mean_score
    }
}

/// Cross-validated exhaustive search over a [`ParamGrid`].
#[derive(Debug, Clone)]
pub struct GridSearch {
    cv: CrossValidation,
}

impl GridSearch {
    /// Search with the given fold scheme.
    #[must_use]
    pub fn new(cv: CrossValidation) -> Self {
        Self { cv }
    }

    /// Score every candidate in parallel and pick the highest mean ROC-AUC.
    ///
    /// Ties go to the earlier candidate in grid order.
    ///
    /// # Errors
    ///
    /// The first error raised by [`CrossValidation::evaluate`] on any candidate.
    #[instrument(skip_all, fields(algorithm = %grid.algorithm(), n_candidates = grid.len(), n_folds = self.cv.n_folds()))]
    pub fn run(
        &self,
        grid: &ParamGrid,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<GridSearchResult, ModelError> {
        let scores: Vec<ScoredCandidate> = grid
            .candidates
            .par_iter()
            .map(|params| {
                let cv = self.cv.evaluate(params, features, labels)?;
                debug!(mean_score = cv.mean_score, "candidate scored");
                Ok(ScoredCandidate {
                    params: params.clone(),
                    cv,
                })
            })
            .collect::<Result<_, ModelError>>()?;

        let mut best_index = 0;
        for (i, candidate) in scores.iter().enumerate().skip(1) {
            if candidate.cv.mean_score > scores[best_index].cv.mean_score {
                best_index = i;
            }
        }

        let result = GridSearchResult { best_index, scores };
        info!(best_score = result.best_score(), best_index, "grid search complete");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_sizes() {
        assert_eq!(ParamGrid::for_algorithm(Algorithm::Bagged, 42).len(), 24);
        assert_eq!(ParamGrid::for_algorithm(Algorithm::Boosted, 42).len(), 24);
    }

    #[test]
    fn grid_covers_axes() {
        let grid = ParamGrid::for_algorithm(Algorithm::Bagged, 3);
        let unlimited = grid
            .candidates()
            .iter()
            .filter(|c| matches!(c, Hyperparameters::Bagged(rf) if rf.max_depth().is_none()))
            .count();
        assert_eq!(unlimited, 8);
        assert!(grid.candidates().iter().all(|c| c.seed() == 3));
        assert!(grid.candidates().iter().all(
            |c| matches!(c, Hyperparameters::Bagged(rf) if rf.class_weight() == ClassWeight::Uniform)
        ));

        let boosted = ParamGrid::for_algorithm(Algorithm::Boosted, 3);
        let slow = boosted
            .candidates()
            .iter()
            .filter(|c| matches!(c, Hyperparameters::Boosted(gb) if gb.learning_rate() < 0.05))
            .count();
        assert_eq!(slow, 12);
    }

    #[test]
    fn hyperparameters_roundtrip_seed() {
        let params = Hyperparameters::default_for(Algorithm::Boosted, 1).with_seed(9);
        assert_eq!(params.seed(), 9);
        assert_eq!(params.algorithm(), Algorithm::Boosted);
    }

    #[test]
    fn search_prefers_better_candidate() {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let x = i as f64;
            features.push(vec![x, (i % 3) as f64]);
            labels.push(usize::from(i >= 20));
        }
        let weak = Hyperparameters::Boosted(
            GradientBoostingConfig::new(5)
                .unwrap()
                .with_learning_rate(0.01)
                .with_max_depth(Some(1)),
        );
        let strong = Hyperparameters::Bagged(RandomForestConfig::new(20).unwrap());
        let grid = ParamGrid::from_candidates(Algorithm::Bagged, vec![weak, strong]).unwrap();
        let search = GridSearch::new(CrossValidation::new(3).unwrap());
        let result = search.run(&grid, &features, &labels).unwrap();
        assert_eq!(result.scores.len(), 2);
        assert!(result.best_score() >= result.scores[0].cv.mean_score);
        assert!(result.best_score() > 0.9);
    }

    #[test]
    fn empty_candidate_list_rejected() {
        assert!(ParamGrid::from_candidates(Algorithm::Bagged, Vec::new()).is_err());
    }
}
