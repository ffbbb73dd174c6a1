//! Stratified k-fold splitting.

use ce_types::{CeResult, DataError};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One (training, validation) pair of row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

impl Fold {
    /// Append `count` training-only rows starting at `offset`.
    pub fn extend_train(&mut self, offset: usize, count: usize) {
        self.train.extend(offset..offset + count);
    }
}

/// Stratified k-fold splitter.
///
/// Each class is spread round-robin over the folds, continuing where the
/// previous class stopped, so per-class and overall fold sizes differ by at
/// most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Split rows by their class labels. `column` only names the labels in
    /// errors.
    pub fn split<K: Ord + Clone>(&self, labels: &[K], column: &str) -> CeResult<Vec<Fold>> {
        let n_samples = labels.len();
        if self.n_splits < 2 {
            return Err(DataError::InvalidFolds {
                message: format!("n_splits must be at least 2, got {}", self.n_splits),
            }
            .into());
        }
        if self.n_splits > n_samples {
            return Err(DataError::InvalidFolds {
                message: format!(
                    "cannot have n_splits={} greater than the number of samples {}",
                    self.n_splits, n_samples
                ),
            }
            .into());
        }

        let mut class_indices: BTreeMap<K, Vec<usize>> = BTreeMap::new();
        for (idx, label) in labels.iter().enumerate() {
            class_indices.entry(label.clone()).or_default().push(idx);
        }

        let members = class_indices.values().map(Vec::len).min().unwrap_or(0);
        if members < self.n_splits {
            return Err(DataError::InsufficientClassMembers {
                column: column.to_string(),
                members,
                n_splits: self.n_splits,
            }
            .into());
        }

        if self.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
            for indices in class_indices.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        let mut assignment = vec![0usize; n_samples];
        let mut cursor = 0;
        for indices in class_indices.values() {
            for &idx in indices {
                assignment[idx] = cursor % self.n_splits;
                cursor += 1;
            }
        }

        let folds: Vec<Fold> = (0..self.n_splits)
            .map(|fold_idx| {
                let (validation, train): (Vec<usize>, Vec<usize>) =
                    (0..n_samples).partition(|&idx| assignment[idx] == fold_idx);
                Fold { train, validation }
            })
            .collect();

        tracing::debug!(
            "Built {} stratified folds over {} rows and {} classes",
            folds.len(),
            n_samples,
            class_indices.len()
        );
        Ok(folds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ce_types::CeError;

    fn labels(counts: &[(&str, usize)]) -> Vec<String> {
        counts
            .iter()
            .flat_map(|(label, n)| std::iter::repeat(label.to_string()).take(*n))
            .collect()
    }

    #[test]
    fn test_stratified_k_fold() {
        let y = labels(&[("0", 5), ("1", 5)]);
        let folds = StratifiedKFold::new(5).with_shuffle(false).split(&y, "y").unwrap();

        assert_eq!(folds.len(), 5);
        for fold in &folds {
            assert_eq!(fold.validation.len(), 2);
            assert_eq!(fold.train.len(), 8);
            let classes: Vec<&str> = fold.validation.iter().map(|&i| y[i].as_str()).collect();
            assert!(classes.contains(&"0") && classes.contains(&"1"));
        }
    }

    #[test]
    fn folds_partition_rows() {
        let y = labels(&[("a", 7), ("b", 6), ("c", 9)]);
        let folds = StratifiedKFold::new(5).with_seed(42).split(&y, "y").unwrap();

        let mut all_validation: Vec<usize> =
            folds.iter().flat_map(|f| f.validation.iter().copied()).collect();
        all_validation.sort_unstable();
        assert_eq!(all_validation, (0..y.len()).collect::<Vec<_>>());

        for fold in &folds {
            let mut joined: Vec<usize> = fold.train.iter().chain(&fold.validation).copied().collect();
            joined.sort_unstable();
            assert_eq!(joined, (0..y.len()).collect::<Vec<_>>());
        }

        let sizes: Vec<usize> = folds.iter().map(|f| f.validation.len()).collect();
        let (min, max) = (sizes.iter().min().unwrap(), sizes.iter().max().unwrap());
        assert!(max - min <= 1);
    }

    #[test]
    fn seed_makes_split_reproducible() {
        let y = labels(&[("a", 10), ("b", 10)]);
        let first = StratifiedKFold::new(4).with_seed(7).split(&y, "y").unwrap();
        let again = StratifiedKFold::new(4).with_seed(7).split(&y, "y").unwrap();
        let other = StratifiedKFold::new(4).with_seed(8).split(&y, "y").unwrap();
        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn minority_class_smaller_than_folds_fails() {
        let y = labels(&[("a", 10), ("b", 3)]);
        let err = StratifiedKFold::new(5).split(&y, "target").unwrap_err();
        assert!(matches!(
            err,
            CeError::Data(DataError::InsufficientClassMembers { members: 3, .. })
        ));
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn invalid_fold_counts() {
        let y = labels(&[("a", 3)]);
        assert!(StratifiedKFold::new(1).split(&y, "y").is_err());
        assert!(StratifiedKFold::new(4).split(&y, "y").is_err());
    }

    #[test]
    fn extend_train_appends_offset_range() {
        let mut fold = Fold {
            train: vec![0, 2],
            validation: vec![1],
        };
        fold.extend_train(3, 2);
        assert_eq!(fold.train, vec![0, 2, 3, 4]);
        assert_eq!(fold.validation, vec![1]);
    }
}
