//! Integration tests for hyperparameter search: sampling, CV splits and halving

use cardiobench::config::{MinResources, NCandidates, SearchConfig};
use cardiobench::error::BenchError;
use cardiobench::pipeline::Pipeline;
use cardiobench::search::{HalvingRandomSearch, ParamDistributions, ParamValue, ParameterSampler, StratifiedKFold};
use cardiobench::training::ModelKind;
use polars::prelude::*;

fn create_dataset(n: usize) -> (DataFrame, Vec<f64>) {
    let x1: Vec<f64> = (0..n).map(|i| i as f64 / n as f64 + ((i * 7) % 5) as f64 * 0.05).collect();
    let x2: Vec<i64> = (0..n).map(|i| (i % 9) as i64).collect();
    let slope: Vec<&str> = (0..n).map(|i| ["up", "flat", "down"][i % 3]).collect();
    let y: Vec<f64> = (0..n).map(|i| if i * 2 >= n { 1.0 } else { 0.0 }).collect();
    (df!("x1" => &x1, "x2" => &x2, "slope" => &slope).unwrap(), y)
}

#[test]
fn test_sampler_draws_distinct_grid_points() {
    let dists = ParamDistributions::new()
        .with_range("clf__n_estimators", 10, 110, 10)
        .with_values("clf__bootstrap", [true, false]);
    let sampled = ParameterSampler::new(dists, 7, Some(42)).sample().unwrap();

    assert_eq!(sampled.len(), 7);
    for (i, a) in sampled.iter().enumerate() {
        for b in &sampled[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn test_stratified_folds_cover_every_sample_once() {
    let (_, y) = create_dataset(97);
    let splits = StratifiedKFold::new(5).split(&y).unwrap();

    let mut counts = vec![0usize; 97];
    for split in &splits {
        for &i in &split.test_indices {
            counts[i] += 1;
        }
    }
    assert!(counts.iter().all(|&c| c == 1));
}

#[test]
fn test_aggressive_elimination_reuses_smallest_budget() {
    let (df, y) = create_dataset(100);
    let config = SearchConfig {
        n_candidates: NCandidates::Fixed(10),
        aggressive_elimination: true,
        ..Default::default()
    };
    let mut search = HalvingRandomSearch::new(
        Pipeline::for_model(ModelKind::RandomForest, Some(0)),
        ParamDistributions::new().with_range("clf__n_estimators", 10, 110, 10),
    )
    .with_config(config)
    .with_random_state(Some(0));
    search.fit(&df, &y).unwrap();

    let results = search.results().unwrap();
    assert_eq!(results.n_required_iterations, 3);
    assert_eq!(results.n_possible_iterations, 2);
    assert_eq!(results.n_resources, vec![20, 20, 60]);
    assert_eq!(results.n_candidates, vec![10, 4, 2]);
}

#[test]
fn test_fixed_min_resources() {
    let (df, y) = create_dataset(90);
    let config = SearchConfig {
        min_resources: MinResources::Fixed(30),
        ..Default::default()
    };
    let mut search = HalvingRandomSearch::new(
        Pipeline::for_model(ModelKind::HistGradientBoosting, Some(0)),
        ParamDistributions::new().with_range("clf__max_depth", 1, 6, 1),
    )
    .with_config(config)
    .with_random_state(Some(0));
    search.fit(&df, &y).unwrap();

    let results = search.results().unwrap();
    assert_eq!(results.min_resources, 30);
    assert_eq!(results.n_candidates, vec![3, 1]);
    assert_eq!(results.n_resources, vec![30, 90]);
}

#[test]
fn test_best_estimator_is_refit_with_best_params() {
    let (df, y) = create_dataset(120);
    let mut search = HalvingRandomSearch::new(
        Pipeline::for_model(ModelKind::XGBoost, Some(1)),
        ParamDistributions::new().with_range("clf__max_depth", 1, 6, 1),
    )
    .with_random_state(Some(1));
    search.fit(&df, &y).unwrap();

    let best_params = search.best_params().unwrap().clone();
    let depth = match best_params.get("clf__max_depth") {
        Some(ParamValue::Int(d)) => *d,
        other => panic!("unexpected {:?}", other),
    };
    let rendered = search.best_estimator().unwrap().to_string();
    assert!(rendered.contains(&format!("max_depth={}", depth)), "{}", rendered);
    assert!(search.score(&df, &y).unwrap() > 0.8);
}

#[test]
fn test_every_candidate_failing_is_an_error() {
    let (df, y) = create_dataset(60);
    let mut search = HalvingRandomSearch::new(
        Pipeline::for_model(ModelKind::LightGBM, None),
        ParamDistributions::new().with_range("clf__not_a_param", 1, 3, 1),
    );
    assert!(matches!(search.fit(&df, &y), Err(BenchError::Search(_))));
}

#[test]
fn test_min_resources_larger_than_dataset() {
    let (df, y) = create_dataset(15);
    let mut search = HalvingRandomSearch::new(
        Pipeline::for_model(ModelKind::RandomForest, None),
        ParamDistributions::new().with_range("clf__n_estimators", 10, 30, 10),
    );
    assert!(search.fit(&df, &y).is_err());
}
