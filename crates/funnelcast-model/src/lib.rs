//! Drop-off classification: train, tune, evaluate, persist.
//!
//! Provides hand-rolled tree ensembles (a bagged random forest of CART
//! trees and gradient-boosted regression trees on log-loss), parallel
//! training via rayon, stratified cross-validated grid search scored by
//! ROC-AUC, held-out evaluation, and versioned model serialization.

mod boost;
mod config;
mod confusion;
mod cv;
mod ensemble;
mod error;
mod forest;
mod grid;
mod importance;
mod metrics;
mod model;
mod node;
mod predict;
mod regression_tree;
mod serialize;
mod split;
mod trainer;
mod tree;

pub use boost::GradientBoosting;
pub use config::{Algorithm, ClassWeight, GradientBoostingConfig, MaxFeatures, RandomForestConfig};
pub use confusion::{ClassMetrics, ConfusionMatrix};
pub use cv::{CrossValidation, CrossValidationResult};
pub use ensemble::{DropOffClassifier, Ensemble};
pub use error::ModelError;
pub use forest::RandomForest;
pub use grid::{GridSearch, GridSearchResult, Hyperparameters, ParamGrid, ScoredCandidate};
pub use importance::RankedFeature;
pub use metrics::{Evaluation, Metrics, evaluate, f1_score, roc_auc};
pub use model::TrainedModel;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use predict::{DECISION_THRESHOLD, labels_from_probabilities, predict_batch, predict_proba_batch};
pub use split::SplitCriterion;
pub use trainer::{Comparison, TrainerConfig, train, train_and_compare};
pub use tree::{DecisionTree, DecisionTreeConfig};
