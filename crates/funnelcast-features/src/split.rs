//! Stratified train/test partitioning.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::error::FeatureError;

/// Row indices of a train/test partition, each sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StratifiedSplit {
    /// Indices assigned to training.
    pub train: Vec<usize>,
    /// Indices held out for evaluation.
    pub test: Vec<usize>,
}

impl StratifiedSplit {
    /// Clone the items at `indices` in index order.
    #[must_use]
    pub fn select<T: Clone>(items: &[T], indices: &[usize]) -> Vec<T> {
        indices.iter().map(|&i| items[i].clone()).collect()
    }
}

/// Partition indices `0..labels.len()` so that each class contributes
/// `round(count * test_fraction)` rows to the test side.
///
/// Each class's indices are shuffled with a seeded ChaCha8 RNG, so the
/// partition is a pure function of the labels, fraction and seed.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`FeatureError::EmptyDataset`] | `labels` is empty |
/// | [`FeatureError::InvalidTestFraction`] | `test_fraction` not in (0.0, 1.0) |
pub fn stratified_split(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> Result<StratifiedSplit, FeatureError> {
    if labels.is_empty() {
        return Err(FeatureError::EmptyDataset);
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(FeatureError::InvalidTestFraction {
            fraction: test_fraction,
        });
    }

    let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label].push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for mut indices in by_class {
        indices.shuffle(&mut rng);
        let n_test = (indices.len() as f64 * test_fraction).round() as usize;
        let (held_out, kept) = indices.split_at(n_test.min(indices.len()));
        test.extend_from_slice(held_out);
        train.extend_from_slice(kept);
    }
    train.sort_unstable();
    test.sort_unstable();

    Ok(StratifiedSplit { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_class_proportions() {
        let labels: Vec<usize> = (0..100).map(|i| usize::from(i % 4 == 0)).collect();
        let split = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        let test_pos = split.test.iter().filter(|&&i| labels[i] == 1).count();
        assert_eq!(test_pos, 5);
    }

    #[test]
    fn partition_is_disjoint_and_complete() {
        let labels = vec![0, 1, 0, 1, 1, 0, 0, 0, 1, 0];
        let split = stratified_split(&labels, 0.3, 1).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn deterministic_for_seed() {
        let labels: Vec<usize> = (0..50).map(|i| i % 2).collect();
        let a = stratified_split(&labels, 0.2, 42).unwrap();
        let b = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn select_follows_indices() {
        let items = vec!["a", "b", "c", "d"];
        assert_eq!(StratifiedSplit::select(&items, &[1, 3]), vec!["b", "d"]);
    }

    #[test]
    fn invalid_fraction() {
        for fraction in [0.0, 1.0, -0.5, f64::NAN] {
            let err = stratified_split(&[0, 1], fraction, 0).unwrap_err();
            assert!(matches!(err, FeatureError::InvalidTestFraction { .. }));
        }
    }
}
