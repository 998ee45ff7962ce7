//! Successive halving over randomly sampled candidates
//!
//! Every iteration scores the surviving candidates with stratified K-fold
//! CV on a growing number of training samples, then keeps the best
//! `ceil(n / factor)` of them:
//! - the first budget is `min_resources`, the budget grows by `factor`
//! - both sides of every fold are subsampled to the budget's fraction
//! - candidates of one iteration are evaluated in parallel
//! - the best candidate of the last iteration is refit on all samples

use super::cv::{CVSplit, StratifiedKFold};
use super::params::{ParamDistributions, ParamSet, ParameterSampler};
use crate::config::{MinResources, NCandidates, SearchConfig};
use crate::data::take_rows;
use crate::error::{BenchError, Result};
use crate::pipeline::Pipeline;
use crate::training::ClassLabels;
use polars::prelude::*;
use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// One evaluated candidate in one iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvResultRow {
    pub iter: usize,
    pub n_resources: usize,
    pub params: ParamSet,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    pub mean_train_score: Option<f64>,
    pub std_train_score: Option<f64>,
    /// 1 is best; ties share the lowest rank and NaN scores rank last
    pub rank_test_score: usize,
    pub split_test_scores: Vec<f64>,
    pub mean_fit_time: f64,
}

/// Everything a finished search exposes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub cv_results: Vec<CvResultRow>,
    pub best_index: usize,
    pub best_params: ParamSet,
    pub best_score: f64,
    pub n_iterations: usize,
    pub n_required_iterations: usize,
    pub n_possible_iterations: usize,
    pub min_resources: usize,
    pub max_resources: usize,
    /// Candidates evaluated per iteration
    pub n_candidates: Vec<usize>,
    /// Training samples used per iteration
    pub n_resources: Vec<usize>,
    pub fit_time_secs: f64,
}

/// Halving random search over a [`Pipeline`]
#[derive(Debug, Clone)]
pub struct HalvingRandomSearch {
    estimator: Pipeline,
    distributions: ParamDistributions,
    pub config: SearchConfig,
    pub random_state: Option<u64>,
    results: Option<SearchResults>,
    best_estimator: Option<Pipeline>,
}

/// Per-fold frames shared by every candidate of an iteration
struct FoldData {
    x_train: DataFrame,
    y_train: Vec<f64>,
    x_test: DataFrame,
    y_test: Vec<f64>,
}

struct CandidateScores {
    test: Vec<f64>,
    train: Vec<f64>,
    fit_time: f64,
}

impl HalvingRandomSearch {
    pub fn new(estimator: Pipeline, distributions: ParamDistributions) -> Self {
        Self {
            estimator,
            distributions,
            config: SearchConfig::default(),
            random_state: None,
            results: None,
            best_estimator: None,
        }
    }

    pub fn with_config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_factor(mut self, factor: usize) -> Self {
        self.config.factor = factor;
        self
    }

    pub fn with_cv(mut self, n_splits: usize) -> Self {
        self.config.cv_folds = n_splits;
        self
    }

    pub fn with_random_state(mut self, seed: Option<u64>) -> Self {
        self.random_state = seed;
        self
    }

    pub fn fit(&mut self, df: &DataFrame, y: &[f64]) -> Result<&mut Self> {
        let start = Instant::now();
        if df.height() != y.len() {
            return Err(BenchError::Shape {
                expected: format!("{} labels", df.height()),
                actual: format!("{} labels", y.len()),
            });
        }
        self.config.validate()?;
        let factor = self.config.factor;

        let n_classes = ClassLabels::fit(y)?.n_classes();
        let n_splits = self.config.cv_folds;
        let max_resources = y.len();
        let mut min_resources = match self.config.min_resources {
            MinResources::Fixed(n) => n,
            MinResources::Smallest | MinResources::Exhaust => 2 * n_splits * n_classes,
        };
        if min_resources == 0 || min_resources > max_resources {
            return Err(BenchError::Search(format!(
                "min_resources={} must be in [1, {}] (the number of samples)",
                min_resources, max_resources
            )));
        }

        let first_round = match self.config.n_candidates {
            NCandidates::Exhaust => (max_resources / min_resources).max(1),
            NCandidates::Fixed(n) => n,
        };
        let mut candidates =
            ParameterSampler::new(self.distributions.clone(), first_round, self.random_state)
                .sample()?;
        if candidates.is_empty() {
            return Err(BenchError::Search("no candidates to evaluate".into()));
        }

        let n_required = 1 + floor_log(candidates.len(), factor);
        if self.config.min_resources == MinResources::Exhaust {
            min_resources = min_resources.max(max_resources / pow(factor, n_required - 1));
        }
        let n_possible = 1 + floor_log(max_resources / min_resources, factor);
        let n_iterations = if self.config.aggressive_elimination {
            n_required
        } else {
            n_possible.min(n_required)
        };

        info!(
            n_candidates = candidates.len(),
            n_iterations,
            min_resources,
            max_resources,
            factor,
            "Starting halving search"
        );

        let splits = StratifiedKFold::new(n_splits).split(y)?;
        let mut rows: Vec<CvResultRow> = Vec::new();
        let mut n_candidates_per_iter = Vec::with_capacity(n_iterations);
        let mut n_resources_per_iter = Vec::with_capacity(n_iterations);

        for itr in 0..n_iterations {
            let power = if self.config.aggressive_elimination {
                (itr + n_possible).saturating_sub(n_required)
            } else {
                itr
            };
            let n_resources = pow(factor, power)
                .saturating_mul(min_resources)
                .min(max_resources);
            let fraction = n_resources as f64 / max_resources as f64;

            let folds = self.fold_data(df, y, &splits, fraction, itr)?;
            let scored: Vec<CandidateScores> = candidates
                .par_iter()
                .map(|params| self.evaluate(params, &folds))
                .collect();

            debug!(
                iter = itr,
                n_candidates = candidates.len(),
                n_resources,
                "Halving iteration evaluated"
            );

            let first_row = rows.len();
            for (params, scores) in candidates.iter().zip(scored) {
                let (mean_test, std_test) = mean_std(&scores.test);
                let (mean_train, std_train) = if self.config.return_train_score {
                    let (m, s) = mean_std(&scores.train);
                    (Some(m), Some(s))
                } else {
                    (None, None)
                };
                rows.push(CvResultRow {
                    iter: itr,
                    n_resources,
                    params: params.clone(),
                    mean_test_score: mean_test,
                    std_test_score: std_test,
                    mean_train_score: mean_train,
                    std_train_score: std_train,
                    rank_test_score: 0,
                    split_test_scores: scores.test,
                    mean_fit_time: scores.fit_time,
                });
            }
            n_candidates_per_iter.push(candidates.len());
            n_resources_per_iter.push(n_resources);

            let n_keep = candidates.len().div_ceil(factor);
            candidates = top_k(&rows[first_row..], n_keep);
        }

        assign_ranks(&mut rows);
        let best_index = best_in_last_iteration(&rows)?;
        let best_params = rows[best_index].params.clone();
        let best_score = rows[best_index].mean_test_score;

        let mut best = self.estimator.clone();
        best.set_params(&best_params)?;
        best.fit(df, y)?;

        let fit_time_secs = start.elapsed().as_secs_f64();
        info!(
            best_params = %best_params,
            best_score,
            elapsed_secs = fit_time_secs,
            "Halving search finished"
        );

        self.best_estimator = Some(best);
        self.results = Some(SearchResults {
            cv_results: rows,
            best_index,
            best_params,
            best_score,
            n_iterations,
            n_required_iterations: n_required,
            n_possible_iterations: n_possible,
            min_resources,
            max_resources,
            n_candidates: n_candidates_per_iter,
            n_resources: n_resources_per_iter,
            fit_time_secs,
        });
        Ok(self)
    }

    fn fold_data(
        &self,
        df: &DataFrame,
        y: &[f64],
        splits: &[CVSplit],
        fraction: f64,
        itr: usize,
    ) -> Result<Vec<FoldData>> {
        splits
            .iter()
            .map(|split| {
                let (train, test) = if fraction < 1.0 {
                    let mut rng = match self.random_state {
                        Some(s) => ChaCha8Rng::seed_from_u64(
                            s.wrapping_add((itr * splits.len() + split.fold_idx) as u64),
                        ),
                        None => ChaCha8Rng::from_entropy(),
                    };
                    (
                        subsample(&split.train_indices, fraction, &mut rng),
                        subsample(&split.test_indices, fraction, &mut rng),
                    )
                } else {
                    (split.train_indices.clone(), split.test_indices.clone())
                };
                Ok(FoldData {
                    x_train: take_rows(df, &train)?,
                    y_train: train.iter().map(|&i| y[i]).collect(),
                    x_test: take_rows(df, &test)?,
                    y_test: test.iter().map(|&i| y[i]).collect(),
                })
            })
            .collect()
    }

    /// Score one candidate on every fold; a failed fold scores NaN
    fn evaluate(&self, params: &ParamSet, folds: &[FoldData]) -> CandidateScores {
        let start = Instant::now();
        let mut test = Vec::with_capacity(folds.len());
        let mut train = Vec::with_capacity(folds.len());

        for (fold_idx, fold) in folds.iter().enumerate() {
            let outcome = (|| -> Result<(f64, f64)> {
                let mut model = self.estimator.clone();
                model.set_params(params)?;
                model.fit(&fold.x_train, &fold.y_train)?;
                let test_score = model.score(&fold.x_test, &fold.y_test)?;
                let train_score = if self.config.return_train_score {
                    model.score(&fold.x_train, &fold.y_train)?
                } else {
                    f64::NAN
                };
                Ok((test_score, train_score))
            })();

            match outcome {
                Ok((te, tr)) => {
                    test.push(te);
                    train.push(tr);
                }
                Err(e) => {
                    warn!(params = %params, fold = fold_idx, error = %e, "Candidate fit failed");
                    test.push(f64::NAN);
                    train.push(f64::NAN);
                }
            }
        }

        CandidateScores {
            test,
            train,
            fit_time: start.elapsed().as_secs_f64() / folds.len().max(1) as f64,
        }
    }

    pub fn results(&self) -> Option<&SearchResults> {
        self.results.as_ref()
    }

    pub fn best_estimator(&self) -> Option<&Pipeline> {
        self.best_estimator.as_ref()
    }

    pub fn best_params(&self) -> Option<&ParamSet> {
        self.results.as_ref().map(|r| &r.best_params)
    }

    pub fn best_score(&self) -> Option<f64> {
        self.results.as_ref().map(|r| r.best_score)
    }

    /// Accuracy of the refit best estimator
    pub fn score(&self, df: &DataFrame, y: &[f64]) -> Result<f64> {
        self.best_estimator
            .as_ref()
            .ok_or(BenchError::NotFitted)?
            .score(df, y)
    }

    pub fn predict(&self, df: &DataFrame) -> Result<ndarray::Array1<f64>> {
        self.best_estimator
            .as_ref()
            .ok_or(BenchError::NotFitted)?
            .predict(df)
    }

    /// `cv_results` as a frame, one row per candidate and iteration
    pub fn cv_results_frame(&self) -> Result<DataFrame> {
        let results = self.results.as_ref().ok_or(BenchError::NotFitted)?;
        cv_results_frame(&results.cv_results)
    }
}

/// Build the `cv_results` table
pub fn cv_results_frame(rows: &[CvResultRow]) -> Result<DataFrame> {
    let n_splits = rows.iter().map(|r| r.split_test_scores.len()).max().unwrap_or(0);

    let mut columns = vec![
        Column::new(
            "iter".into(),
            rows.iter().map(|r| r.iter as u32).collect::<Vec<_>>(),
        ),
        Column::new(
            "n_resources".into(),
            rows.iter().map(|r| r.n_resources as u64).collect::<Vec<_>>(),
        ),
        Column::new(
            "params".into(),
            rows.iter().map(|r| r.params.to_string()).collect::<Vec<_>>(),
        ),
        Column::new(
            "mean_test_score".into(),
            rows.iter().map(|r| r.mean_test_score).collect::<Vec<_>>(),
        ),
        Column::new(
            "std_test_score".into(),
            rows.iter().map(|r| r.std_test_score).collect::<Vec<_>>(),
        ),
    ];
    if rows.iter().any(|r| r.mean_train_score.is_some()) {
        columns.push(Column::new(
            "mean_train_score".into(),
            rows.iter().map(|r| r.mean_train_score).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            "std_train_score".into(),
            rows.iter().map(|r| r.std_train_score).collect::<Vec<_>>(),
        ));
    }
    columns.push(Column::new(
        "rank_test_score".into(),
        rows.iter().map(|r| r.rank_test_score as u32).collect::<Vec<_>>(),
    ));
    for i in 0..n_splits {
        columns.push(Column::new(
            format!("split{}_test_score", i).into(),
            rows.iter()
                .map(|r| r.split_test_scores.get(i).copied())
                .collect::<Vec<_>>(),
        ));
    }
    columns.push(Column::new(
        "mean_fit_time".into(),
        rows.iter().map(|r| r.mean_fit_time).collect::<Vec<_>>(),
    ));

    Ok(DataFrame::new(columns)?)
}

fn pow(base: usize, exp: usize) -> usize {
    (0..exp).fold(1usize, |acc, _| acc.saturating_mul(base))
}

/// `floor(log_base(n))` for `n >= 1`, 0 otherwise
fn floor_log(n: usize, base: usize) -> usize {
    let mut k = 0;
    let mut v = n;
    while v >= base {
        v /= base;
        k += 1;
    }
    k
}

/// Mean and population standard deviation; NaN if any score is NaN
fn mean_std(scores: &[f64]) -> (f64, f64) {
    if scores.is_empty() || scores.iter().any(|s| s.is_nan()) {
        return (f64::NAN, f64::NAN);
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Descending by score, NaN last, earlier rows first among ties
fn ordered_by_score(rows: &[CvResultRow]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (rows[a].mean_test_score, rows[b].mean_test_score);
        match (sa.is_nan(), sb.is_nan()) {
            (true, true) => std::cmp::Ordering::Equal,
            (true, false) => std::cmp::Ordering::Greater,
            (false, true) => std::cmp::Ordering::Less,
            (false, false) => sb.total_cmp(&sa),
        }
    });
    order
}

fn top_k(rows: &[CvResultRow], k: usize) -> Vec<ParamSet> {
    ordered_by_score(rows)
        .into_iter()
        .take(k)
        .map(|i| rows[i].params.clone())
        .collect()
}

fn assign_ranks(rows: &mut [CvResultRow]) {
    let order = ordered_by_score(rows);
    let mut rank = 0;
    let mut prev: Option<f64> = None;
    for (pos, &i) in order.iter().enumerate() {
        let score = rows[i].mean_test_score;
        let tied = match prev {
            Some(p) => p == score || (p.is_nan() && score.is_nan()),
            None => false,
        };
        if !tied {
            rank = pos + 1;
        }
        rows[i].rank_test_score = rank;
        prev = Some(score);
    }
}

fn best_in_last_iteration(rows: &[CvResultRow]) -> Result<usize> {
    let last_iter = rows.iter().map(|r| r.iter).max().unwrap_or(0);
    rows.iter()
        .enumerate()
        .filter(|(_, r)| r.iter == last_iter && !r.mean_test_score.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, r)| match best {
            Some((_, s)) if s >= r.mean_test_score => best,
            _ => Some((i, r.mean_test_score)),
        })
        .map(|(i, _)| i)
        .ok_or_else(|| BenchError::Search("every candidate in the last iteration failed".into()))
}

/// Draw `floor(fraction * n)` of `indices` without replacement, in index order
fn subsample(indices: &[usize], fraction: f64, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let amount = ((fraction * indices.len() as f64).floor() as usize).min(indices.len());
    let mut out: Vec<usize> = index::sample(rng, indices.len(), amount)
        .into_iter()
        .map(|k| indices[k])
        .collect();
    out.sort_unstable();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::ModelKind;
    use polars::df;

    fn create_frame(n: usize) -> (DataFrame, Vec<f64>) {
        let x1: Vec<f64> = (0..n).map(|i| (i as f64 * 0.37).sin() + i as f64 / n as f64).collect();
        let x2: Vec<f64> = (0..n).map(|i| ((i * 7) % 13) as f64).collect();
        let cat: Vec<&str> = (0..n).map(|i| ["a", "b", "c"][i % 3]).collect();
        let y: Vec<f64> = (0..n).map(|i| if i >= n / 2 { 1.0 } else { 0.0 }).collect();
        (df!("x1" => x1, "x2" => x2, "cat" => cat).unwrap(), y)
    }

    #[test]
    fn test_floor_log_and_pow() {
        assert_eq!(floor_log(1, 3), 0);
        assert_eq!(floor_log(10, 3), 2);
        assert_eq!(floor_log(27, 3), 3);
        assert_eq!(floor_log(0, 3), 0);
        assert_eq!(pow(3, 2), 9);
    }

    #[test]
    fn test_mean_std_population() {
        let (m, s) = mean_std(&[1.0, 3.0]);
        assert_eq!(m, 2.0);
        assert_eq!(s, 1.0);
        assert!(mean_std(&[1.0, f64::NAN]).0.is_nan());
    }

    #[test]
    fn test_subsample_draws_floor_fraction_without_replacement() {
        let indices: Vec<usize> = (100..150).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let sub = subsample(&indices, 0.33, &mut rng);

        assert_eq!(sub.len(), 16);
        assert!(sub.iter().all(|i| indices.contains(i)));
        assert!(sub.windows(2).all(|w| w[0] < w[1]));

        let again = subsample(&indices, 0.33, &mut ChaCha8Rng::seed_from_u64(3));
        assert_eq!(sub, again);
    }

    #[test]
    fn test_fold_data_subsamples_train_and_test() {
        let (df, y) = create_frame(100);
        let search = HalvingRandomSearch::new(
            Pipeline::for_model(ModelKind::RandomForest, Some(0)),
            ParamDistributions::new().with_range("clf__n_estimators", 10, 20, 10),
        )
        .with_random_state(Some(0));
        let splits = StratifiedKFold::new(5).split(&y).unwrap();

        let folds = search.fold_data(&df, &y, &splits, 0.5, 0).unwrap();
        for (fold, split) in folds.iter().zip(&splits) {
            assert_eq!(fold.y_train.len(), split.train_indices.len() / 2);
            assert_eq!(fold.y_test.len(), split.test_indices.len() / 2);
            assert_eq!(fold.x_test.height(), fold.y_test.len());
        }

        let whole = search.fold_data(&df, &y, &splits, 1.0, 0).unwrap();
        assert_eq!(whole[0].y_test.len(), splits[0].test_indices.len());
    }

    #[test]
    fn test_ranks_put_nan_last() {
        let row = |score: f64| CvResultRow {
            iter: 0,
            n_resources: 10,
            params: ParamSet::new(),
            mean_test_score: score,
            std_test_score: 0.0,
            mean_train_score: None,
            std_train_score: None,
            rank_test_score: 0,
            split_test_scores: vec![score],
            mean_fit_time: 0.0,
        };
        let mut rows = vec![row(0.5), row(f64::NAN), row(0.9), row(0.5)];
        assign_ranks(&mut rows);
        let ranks: Vec<usize> = rows.iter().map(|r| r.rank_test_score).collect();
        assert_eq!(ranks, vec![2, 4, 1, 2]);
    }

    #[test]
    fn test_schedule_for_forest_grid() {
        let (df, y) = create_frame(227);
        let dists = ParamDistributions::new().with_range("clf__n_estimators", 10, 110, 10);
        let mut search = HalvingRandomSearch::new(Pipeline::for_model(ModelKind::RandomForest, Some(0)), dists)
            .with_random_state(Some(42));
        search.fit(&df, &y).unwrap();

        let results = search.results().unwrap();
        assert_eq!(results.min_resources, 20);
        assert_eq!(results.n_candidates, vec![10, 4, 2]);
        assert_eq!(results.n_resources, vec![20, 60, 180]);
        assert_eq!(results.n_iterations, 3);
        assert_eq!(results.cv_results.len(), 16);
        assert_eq!(results.cv_results[results.best_index].iter, 2);
        assert!(search.score(&df, &y).unwrap() > 0.5);
    }

    #[test]
    fn test_exhaust_uses_all_samples_last() {
        let (df, y) = create_frame(200);
        let dists = ParamDistributions::new().with_range("clf__max_depth", 1, 6, 1);
        let config = SearchConfig {
            min_resources: MinResources::Exhaust,
            n_candidates: NCandidates::Fixed(5),
            ..Default::default()
        };
        let mut search = HalvingRandomSearch::new(Pipeline::for_model(ModelKind::XGBoost, Some(0)), dists)
            .with_config(config)
            .with_random_state(Some(1));
        search.fit(&df, &y).unwrap();

        let results = search.results().unwrap();
        assert_eq!(results.n_candidates, vec![5, 2]);
        assert_eq!(results.n_resources, vec![66, 198]);
    }

    #[test]
    fn test_exhaust_for_both_budgets_is_rejected() {
        let (df, y) = create_frame(60);
        let config = SearchConfig {
            min_resources: MinResources::Exhaust,
            n_candidates: NCandidates::Exhaust,
            ..Default::default()
        };
        let mut search = HalvingRandomSearch::new(
            Pipeline::for_model(ModelKind::RandomForest, Some(0)),
            ParamDistributions::new().with_range("clf__n_estimators", 10, 30, 10),
        )
        .with_config(config);
        assert!(matches!(search.fit(&df, &y), Err(BenchError::InvalidParameter { .. })));
        assert!(search.results().is_none());
    }

    #[test]
    fn test_failed_candidates_score_nan() {
        let (df, y) = create_frame(120);
        let dists = ParamDistributions::new().with_values("clf__max_depth", [0i64, 2]);
        let mut search = HalvingRandomSearch::new(Pipeline::for_model(ModelKind::XGBoost, Some(0)), dists)
            .with_random_state(Some(0));
        search.fit(&df, &y).unwrap();

        let results = search.results().unwrap();
        let failed = results
            .cv_results
            .iter()
            .find(|r| r.params.to_string().contains("0"))
            .unwrap();
        assert!(failed.mean_test_score.is_nan());
        assert_eq!(failed.rank_test_score, results.cv_results.len());
        assert!(results.best_params.to_string().contains("2"));
    }

    #[test]
    fn test_cv_results_frame_columns() {
        let (df, y) = create_frame(120);
        let dists = ParamDistributions::new().with_range("clf__max_depth", 1, 4, 1);
        let mut search = HalvingRandomSearch::new(Pipeline::for_model(ModelKind::LightGBM, Some(0)), dists)
            .with_random_state(Some(0));
        search.fit(&df, &y).unwrap();

        let frame = search.cv_results_frame().unwrap();
        for name in ["iter", "n_resources", "params", "mean_test_score", "rank_test_score", "split4_test_score"] {
            assert!(frame.column(name).is_ok(), "missing {}", name);
        }
        assert_eq!(frame.height(), search.results().unwrap().cv_results.len());
    }

    #[test]
    fn test_unfitted_search() {
        let search = HalvingRandomSearch::new(
            Pipeline::for_model(ModelKind::RandomForest, None),
            ParamDistributions::new().with_range("clf__n_estimators", 10, 20, 10),
        );
        assert!(search.cv_results_frame().is_err());
        assert!(search.best_params().is_none());
    }
}
