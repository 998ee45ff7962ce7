//! Feature/target separation and train/test splitting

use crate::error::{BenchError, Result};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Row indices of a train/test split
#[derive(Debug, Clone)]
pub struct TrainTestIndices {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// A dataset split into features and labels for both halves
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Vec<f64>,
    pub y_test: Vec<f64>,
}

impl TrainTestSplit {
    /// `(train rows, test rows)`
    pub fn shapes(&self) -> ((usize, usize), (usize, usize)) {
        (
            (self.x_train.height(), self.x_train.width()),
            (self.x_test.height(), self.x_test.width()),
        )
    }
}

/// Drop the target from the frame and return it as numeric labels.
///
/// The target must be numeric (or boolean) and contain no nulls.
pub fn split_features_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Vec<f64>)> {
    let column = df
        .column(target)
        .map_err(|_| BenchError::ColumnNotFound(target.to_string()))?;

    if column.null_count() > 0 {
        return Err(BenchError::Data(format!(
            "target column '{}' has {} missing values",
            target,
            column.null_count()
        )));
    }

    let casted = column.cast(&DataType::Float64).map_err(|e| {
        BenchError::Data(format!("target column '{}' is not numeric: {}", target, e))
    })?;
    let values = casted.f64()?;
    let labels = values
        .into_iter()
        .map(|v| {
            v.ok_or_else(|| {
                BenchError::Data(format!("target column '{}' is not numeric", target))
            })
        })
        .collect::<Result<Vec<f64>>>()?;

    let features = df.drop(target)?;
    Ok((features, labels))
}

/// Split `n_samples` row indices with `ceil(test_size * n)` test rows.
pub fn train_test_indices(
    n_samples: usize,
    test_size: f64,
    shuffle: bool,
    random_state: Option<u64>,
) -> Result<TrainTestIndices> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(BenchError::invalid_param(
            "test_size",
            test_size,
            "must be in (0, 1)",
        ));
    }

    let n_test = (test_size * n_samples as f64).ceil() as usize;
    let n_train = n_samples.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(BenchError::Data(format!(
            "with n_samples={} and test_size={}, one side of the split would be empty",
            n_samples, test_size
        )));
    }

    if !shuffle {
        // Head is train, tail is test
        return Ok(TrainTestIndices {
            train: (0..n_train).collect(),
            test: (n_train..n_samples).collect(),
        });
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    indices.shuffle(&mut rng);

    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    Ok(TrainTestIndices { train, test })
}

/// Select rows by position
pub fn take_rows(df: &DataFrame, indices: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = indices.iter().map(|&i| i as IdxSize).collect();
    let idx = IdxCa::from_vec("idx".into(), idx);
    Ok(df.take(&idx)?)
}

/// Split features and labels into train and test parts
pub fn train_test_split(
    x: &DataFrame,
    y: &[f64],
    test_size: f64,
    shuffle: bool,
    random_state: Option<u64>,
) -> Result<TrainTestSplit> {
    if x.height() != y.len() {
        return Err(BenchError::Shape {
            expected: format!("{} labels", x.height()),
            actual: format!("{} labels", y.len()),
        });
    }

    let split = train_test_indices(x.height(), test_size, shuffle, random_state)?;
    Ok(TrainTestSplit {
        x_train: take_rows(x, &split.train)?,
        x_test: take_rows(x, &split.test)?,
        y_train: split.train.iter().map(|&i| y[i]).collect(),
        y_test: split.test.iter().map(|&i| y[i]).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            "age" => &[63.0, 37.0, 41.0, 56.0, 57.0, 57.0, 56.0, 44.0],
            "sex" => &["m", "f", "f", "m", "f", "m", "f", "m"],
            "target" => &[1i64, 1, 0, 1, 0, 0, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_split_features_target() {
        let (x, y) = split_features_target(&sample_frame(), "target").unwrap();
        assert_eq!(x.width(), 2);
        assert!(x.column("target").is_err());
        assert_eq!(y, vec![1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_missing_target_column() {
        let err = split_features_target(&sample_frame(), "outcome").unwrap_err();
        assert!(matches!(err, BenchError::ColumnNotFound(_)));
    }

    #[test]
    fn test_split_sizes_round_test_up() {
        let split = train_test_indices(303, 0.25, true, Some(0)).unwrap();
        assert_eq!(split.test.len(), 76);
        assert_eq!(split.train.len(), 227);

        let mut all: Vec<usize> = split.train.iter().chain(split.test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..303).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_reproducible() {
        let a = train_test_indices(50, 0.2, true, Some(7)).unwrap();
        let b = train_test_indices(50, 0.2, true, Some(7)).unwrap();
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_unshuffled_split_keeps_tail_as_test() {
        let split = train_test_indices(10, 0.3, false, None).unwrap();
        assert_eq!(split.train, (0..7).collect::<Vec<_>>());
        assert_eq!(split.test, vec![7, 8, 9]);
    }

    #[test]
    fn test_degenerate_split_rejected() {
        assert!(train_test_indices(1, 0.5, true, Some(0)).is_err());
        assert!(train_test_indices(10, 0.0, true, Some(0)).is_err());
    }

    #[test]
    fn test_train_test_split_frames() {
        let (x, y) = split_features_target(&sample_frame(), "target").unwrap();
        let split = train_test_split(&x, &y, 0.25, true, Some(1)).unwrap();
        let ((train_rows, train_cols), (test_rows, test_cols)) = split.shapes();
        assert_eq!((train_rows, test_rows), (6, 2));
        assert_eq!((train_cols, test_cols), (2, 2));
        assert_eq!(split.y_train.len(), 6);
        assert_eq!(split.y_test.len(), 2);
    }
}
