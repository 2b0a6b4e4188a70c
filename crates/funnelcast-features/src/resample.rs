//! SMOTE class-balance resampling.
//!
//! Synthesizes minority-class rows by interpolating between a minority
//! sample and one of its `k` nearest minority neighbours until both classes
//! have the same count. Original rows keep their positions; synthetic rows
//! are appended after them.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::error::FeatureError;

/// Configuration for SMOTE resampling.
///
/// # Defaults
///
/// | Parameter     | Default |
/// |---------------|---------|
/// | `k_neighbors` | 5       |
/// | `seed`        | 42      |
#[derive(Debug, Clone)]
pub struct SmoteConfig {
    k_neighbors: usize,
    seed: u64,
}

impl Default for SmoteConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

impl SmoteConfig {
    /// Create a config with the given neighbour count.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::InvalidNeighborCount`] if `k_neighbors` is zero.
    pub fn new(k_neighbors: usize) -> Result<Self, FeatureError> {
        if k_neighbors == 0 {
            return Err(FeatureError::InvalidNeighborCount { k_neighbors });
        }
        Ok(Self {
            k_neighbors,
            ..Self::default()
        })
    }

    /// Set the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the neighbour count.
    #[must_use]
    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// A balanced dataset produced by [`Smote::resample`].
#[derive(Debug, Clone, PartialEq)]
pub struct Resampled {
    /// Original rows followed by synthetic minority rows.
    pub features: Vec<Vec<f64>>,
    /// Labels aligned with `features`.
    pub labels: Vec<usize>,
    /// Number of synthetic rows appended.
    pub n_synthetic: usize,
}

/// SMOTE resampler for binary labels.
#[derive(Debug, Clone, Default)]
pub struct Smote {
    config: SmoteConfig,
}

impl Smote {
    /// Create a resampler.
    #[must_use]
    pub fn new(config: SmoteConfig) -> Self {
        Self { config }
    }

    /// Balance `features`/`labels` by synthesizing minority rows.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::EmptyDataset`] | `features` is empty |
    /// | [`FeatureError::LabelCountMismatch`] | lengths differ |
    /// | [`FeatureError::InvalidLabel`] | a label is not 0 or 1 |
    /// | [`FeatureError::FeatureCountMismatch`] | rows have inconsistent lengths |
    /// | [`FeatureError::NonFiniteValue`] | a value is NaN or infinite |
    /// | [`FeatureError::InsufficientSamples`] | fewer than 2 minority rows |
    #[instrument(skip_all, fields(n_samples = features.len(), k = self.config.k_neighbors))]
    pub fn resample(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<Resampled, FeatureError> {
        validate(features, labels)?;

        let counts = [0, 1].map(|class| labels.iter().filter(|&&l| l == class).count());
        if counts[0] == counts[1] {
            warn!(per_class = counts[0], "input already balanced, nothing to synthesize");
            return Ok(Resampled {
                features: features.to_vec(),
                labels: labels.to_vec(),
                n_synthetic: 0,
            });
        }

        let minority = if counts[0] < counts[1] { 0 } else { 1 };
        let n_minority = counts[minority];
        let n_synthetic = counts[1 - minority] - n_minority;
        if n_minority < 2 {
            return Err(FeatureError::InsufficientSamples {
                class: minority,
                count: n_minority,
                required: 2,
            });
        }

        let minority_rows: Vec<&[f64]> = features
            .iter()
            .zip(labels)
            .filter(|(_, l)| **l == minority)
            .map(|(row, _)| row.as_slice())
            .collect();

        let k = self.config.k_neighbors.min(n_minority - 1);
        let neighbours = nearest_neighbours(&minority_rows, k);
        debug!(minority, n_minority, k, "minority neighbourhoods computed");

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut out_features = features.to_vec();
        let mut out_labels = labels.to_vec();
        out_features.reserve(n_synthetic);
        out_labels.reserve(n_synthetic);

        for _ in 0..n_synthetic {
            let i = rng.gen_range(0..n_minority);
            let j = neighbours[i][rng.gen_range(0..k)];
            let gap: f64 = rng.r#gen();
            let base = minority_rows[i];
            let other = minority_rows[j];
            out_features.push(
                base.iter()
                    .zip(other)
                    .map(|(x, n)| x + gap * (n - x))
                    .collect(),
            );
            out_labels.push(minority);
        }

        info!(
            minority,
            n_synthetic,
            n_total = out_labels.len(),
            "classes balanced"
        );

        Ok(Resampled {
            features: out_features,
            labels: out_labels,
            n_synthetic,
        })
    }
}

fn validate(features: &[Vec<f64>], labels: &[usize]) -> Result<(), FeatureError> {
    if features.is_empty() {
        return Err(FeatureError::EmptyDataset);
    }
    if features.len() != labels.len() {
        return Err(FeatureError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|(_, l)| **l > 1) {
        return Err(FeatureError::InvalidLabel {
            sample_index,
            label,
        });
    }
    let expected = features[0].len();
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != expected {
            return Err(FeatureError::FeatureCountMismatch {
                expected,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    Ok(())
}

/// Indices of the `k` nearest other rows of each row (squared Euclidean,
/// ties broken by index).
fn nearest_neighbours(rows: &[&[f64]], k: usize) -> Vec<Vec<usize>> {
    rows.par_iter()
        .enumerate()
        .map(|(i, row)| {
            let mut distances: Vec<(f64, usize)> = rows
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(j, other)| (squared_distance(row, other), j))
                .collect();
            distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            distances.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
