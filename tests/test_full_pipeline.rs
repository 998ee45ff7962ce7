//! Integration test: Full benchmark (frame → split → search → metrics → report)

use cardiobench::config::ExperimentConfig;
use cardiobench::experiment::Experiment;
use cardiobench::metrics::METRIC_NAMES;
use cardiobench::training::ModelKind;
use polars::prelude::*;

fn create_heart_like_dataset(n: usize) -> DataFrame {
    let mut age = Vec::with_capacity(n);
    let mut sex = Vec::with_capacity(n);
    let mut chol = Vec::with_capacity(n);
    let mut cp = Vec::with_capacity(n);
    let mut target = Vec::with_capacity(n);

    for i in 0..n {
        let a = 35 + (i * 17 % 40) as i64;
        let pain = ["typical", "atypical", "non-anginal", "asymptomatic"][i % 4];
        age.push(a);
        sex.push((i % 2) as i64);
        chol.push(if i % 11 == 0 { None } else { Some(180.0 + (i * 13 % 120) as f64) });
        cp.push(pain);
        let risk = (a - 35) as f64 / 40.0 + if pain == "asymptomatic" { 0.6 } else { 0.0 };
        target.push(if risk > 0.55 { 1i64 } else { 0 });
    }

    df!(
        "age" => &age,
        "sex" => &sex,
        "chol" => &chol,
        "cp" => &cp,
        "target" => &target
    )
    .unwrap()
}

#[test]
fn test_full_benchmark_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExperimentConfig::default()
        .with_output_dir(dir.path())
        .with_random_state(Some(42));

    let df = create_heart_like_dataset(160);
    let report = Experiment::new(config).run_on_frame(&df).unwrap();

    assert_eq!(report.train_shape, (120, 4));
    assert_eq!(report.test_shape, (40, 4));
    assert_eq!(report.models.len(), 4);

    for m in &report.models {
        assert!(m.best_score.is_finite(), "{} best score", m.kind);
        assert!(m.test_accuracy > 0.6, "{} test accuracy {}", m.kind, m.test_accuracy);
        assert_eq!(m.metrics.support, 40);
        assert_eq!(m.confusion.total(), 40);
        assert!(m.best_estimator.starts_with("Pipeline(steps=[('preprocessor'"));
        assert!((m.metrics.accuracy - m.test_accuracy).abs() < 1e-12);
    }

    let rf = report.model(ModelKind::RandomForest).unwrap();
    assert!(rf.best_params.get("clf__n_estimators").is_some());
    let lgbm = report.model(ModelKind::LightGBM).unwrap();
    assert!(lgbm.best_params.get("clf__max_depth").is_some());

    let long = report.comparison.to_df().unwrap();
    assert_eq!(long.height(), 4 * METRIC_NAMES.len());
    assert_eq!(report.comparison.lower_bound, 0.7);
    assert_eq!(report.comparison.marker_size, 10);
    assert_eq!(
        report.comparison.labels(),
        &["Random Forest", "HistGradientBoosting", "XGBoost", "LightGBM"]
    );

    // 4 confusion heatmaps, 2 comparison plots, summary.json
    assert_eq!(report.written.len(), 7);
    for path in &report.written {
        assert!(path.exists(), "{} missing", path.display());
    }

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("summary.json")).unwrap()).unwrap();
    assert_eq!(summary["models"].as_array().unwrap().len(), 4);
    assert_eq!(summary["test_shape"][0], 40);
}

#[test]
fn test_run_without_plots_writes_only_summary() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExperimentConfig::default()
        .with_output_dir(dir.path())
        .with_models(vec![ModelKind::XGBoost])
        .with_plots(false);

    let report = Experiment::new(config)
        .run_on_frame(&create_heart_like_dataset(120))
        .unwrap();

    assert_eq!(report.models.len(), 1);
    assert_eq!(report.written, vec![dir.path().join("summary.json")]);
}

#[test]
fn test_same_seed_same_results() {
    let df = create_heart_like_dataset(120);
    let run = || {
        let dir = tempfile::tempdir().unwrap();
        let config = ExperimentConfig::default()
            .with_output_dir(dir.path())
            .with_models(vec![ModelKind::RandomForest])
            .with_plots(false)
            .with_random_state(Some(7));
        Experiment::new(config).run_on_frame(&df).unwrap()
    };

    let (a, b) = (run(), run());
    assert_eq!(a.models[0].best_params, b.models[0].best_params);
    assert_eq!(a.models[0].test_accuracy, b.models[0].test_accuracy);
    assert_eq!(a.models[0].confusion, b.models[0].confusion);
}

#[test]
fn test_missing_target_column() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExperimentConfig::default()
        .with_output_dir(dir.path())
        .with_target("num");
    assert!(Experiment::new(config)
        .run_on_frame(&create_heart_like_dataset(60))
        .is_err());
}
