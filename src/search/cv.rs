//! Stratified K-fold splitting

use crate::error::{BenchError, Result};
use crate::training::ClassLabels;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// K-fold splitter that keeps class proportions in every fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedKFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl Default for StratifiedKFold {
    fn default() -> Self {
        Self::new(5)
    }
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Shuffle each class before assignment
    pub fn with_shuffle(mut self, shuffle: bool, random_state: Option<u64>) -> Self {
        self.shuffle = shuffle;
        self.random_state = random_state;
        self
    }

    /// Generate `n_splits` train/test splits over the labels in `y`
    ///
    /// Classes are ordered by first appearance. The sorted labels are dealt
    /// to the folds round-robin to fix how many members of each class a fold
    /// gets; each class then fills its folds in contiguous blocks.
    pub fn split(&self, y: &[f64]) -> Result<Vec<CVSplit>> {
        if self.n_splits < 2 {
            return Err(BenchError::invalid_param(
                "n_splits",
                self.n_splits,
                "must be at least 2",
            ));
        }
        if y.len() < self.n_splits {
            return Err(BenchError::Search(format!(
                "cannot have n_splits={} greater than the number of samples {}",
                self.n_splits,
                y.len()
            )));
        }

        let labels = ClassLabels::fit(y)?;
        let n_classes = labels.n_classes();
        let sorted_codes = labels.encode(y)?;

        let mut appearance = vec![usize::MAX; n_classes];
        let mut next = 0;
        for &k in &sorted_codes {
            if appearance[k] == usize::MAX {
                appearance[k] = next;
                next += 1;
            }
        }
        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (idx, &k) in sorted_codes.iter().enumerate() {
            by_class[appearance[k]].push(idx);
        }

        if by_class.iter().all(|members| members.len() < self.n_splits) {
            return Err(BenchError::Search(format!(
                "n_splits={} cannot be greater than the number of members in each class",
                self.n_splits
            )));
        }
        let smallest = by_class.iter().map(Vec::len).min().unwrap_or(0);
        if smallest < self.n_splits {
            warn!(
                smallest_class = smallest,
                n_splits = self.n_splits,
                "The least populated class has fewer members than n_splits"
            );
        }

        // allocation[fold][class]
        let mut allocation = vec![vec![0usize; n_classes]; self.n_splits];
        let mut pos = 0;
        for (k, members) in by_class.iter().enumerate() {
            for _ in members {
                allocation[pos % self.n_splits][k] += 1;
                pos += 1;
            }
        }

        let mut rng = match (self.shuffle, self.random_state) {
            (true, Some(seed)) => Some(ChaCha8Rng::seed_from_u64(seed)),
            (true, None) => Some(ChaCha8Rng::from_entropy()),
            (false, _) => None,
        };

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); self.n_splits];
        for (k, members) in by_class.iter().enumerate() {
            let mut fold_of_member: Vec<usize> = (0..self.n_splits)
                .flat_map(|f| std::iter::repeat(f).take(allocation[f][k]))
                .collect();
            if let Some(rng) = rng.as_mut() {
                fold_of_member.shuffle(rng);
            }
            for (&idx, &f) in members.iter().zip(&fold_of_member) {
                folds[f].push(idx);
            }
        }
        for fold in folds.iter_mut() {
            fold.sort_unstable();
        }

        Ok((0..self.n_splits)
            .map(|fold_idx| {
                let train_indices: Vec<usize> = {
                    let mut train: Vec<usize> = folds
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != fold_idx)
                        .flat_map(|(_, f)| f.iter().copied())
                        .collect();
                    train.sort_unstable();
                    train
                };
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_partition_the_samples() {
        let y: Vec<f64> = (0..23).map(|i| (i % 3 == 0) as u8 as f64).collect();
        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(splits.len(), 5);

        let mut seen: Vec<usize> = splits.iter().flat_map(|s| s.test_indices.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..23).collect::<Vec<_>>());

        for s in &splits {
            assert_eq!(s.train_indices.len() + s.test_indices.len(), 23);
            assert!(s.test_indices.iter().all(|i| !s.train_indices.contains(i)));
        }
    }

    #[test]
    fn test_class_balance_per_fold() {
        let y: Vec<f64> = (0..100).map(|i| if i < 40 { 1.0 } else { 0.0 }).collect();
        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        for s in &splits {
            let positives = s.test_indices.iter().filter(|&&i| y[i] == 1.0).count();
            assert_eq!(positives, 8);
            assert_eq!(s.test_indices.len(), 20);
        }
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let y: Vec<f64> = (0..30).map(|i| (i % 2) as f64).collect();
        let a = StratifiedKFold::new(3).with_shuffle(true, Some(7)).split(&y).unwrap();
        let b = StratifiedKFold::new(3).with_shuffle(true, Some(7)).split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unshuffled_classes_fill_contiguous_blocks() {
        let y = [0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        let splits = StratifiedKFold::new(2).split(&y).unwrap();
        assert_eq!(splits[0].test_indices, vec![0, 1, 4, 5, 6]);
        assert_eq!(splits[1].test_indices, vec![2, 3, 7, 8, 9]);
        assert_eq!(splits[0].train_indices, splits[1].test_indices);
    }

    #[test]
    fn test_small_class_still_splits() {
        // least populated class < n_splits <= largest class
        let y: Vec<f64> = (0..12).map(|i| if i < 2 { 1.0 } else { 0.0 }).collect();
        let splits = StratifiedKFold::new(5).split(&y).unwrap();
        assert_eq!(splits.len(), 5);

        let positives: Vec<usize> = splits
            .iter()
            .map(|s| s.test_indices.iter().filter(|&&i| y[i] == 1.0).count())
            .collect();
        assert_eq!(positives.iter().sum::<usize>(), 2);
        assert!(positives.iter().all(|&p| p <= 1));
    }

    #[test]
    fn test_every_class_smaller_than_n_splits() {
        let y = [0.0, 1.0, 0.0, 1.0, 1.0];
        assert!(matches!(
            StratifiedKFold::new(4).split(&y),
            Err(BenchError::Search(_))
        ));
        assert!(StratifiedKFold::new(3).split(&y).is_ok());
    }

    #[test]
    fn test_too_few_samples() {
        assert!(StratifiedKFold::new(5).split(&[0.0, 1.0, 0.0]).is_err());
        assert!(StratifiedKFold::new(1).split(&[0.0, 1.0]).is_err());
    }
}
