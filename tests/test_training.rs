//! Integration test: every classifier on a separable binary problem

use cardiobench::error::BenchError;
use cardiobench::search::ParamValue;
use cardiobench::training::{Estimator, ModelKind};
use ndarray::{Array1, Array2};

/// Two features; the label is 1 when their sum exceeds 10. Labels are {0, 1}.
fn separable_data(n: usize) -> (Array2<f64>, Array1<f64>) {
    let mut x = Array2::zeros((n, 2));
    let mut y = Array1::zeros(n);
    for i in 0..n {
        let a = (i % 11) as f64;
        let b = ((i * 7) % 13) as f64 * 0.5;
        x[[i, 0]] = a;
        x[[i, 1]] = b;
        y[i] = if a + b > 10.0 { 1.0 } else { 0.0 };
    }
    (x, y)
}

#[test]
fn test_every_model_learns_separable_data() {
    let (x, y) = separable_data(240);
    for kind in ModelKind::all() {
        let mut model = Estimator::new(kind).with_random_state(Some(42));
        model.fit(&x, &y).unwrap();
        let acc = model.score(&x, &y).unwrap();
        assert!(acc > 0.9, "{} training accuracy {}", kind, acc);
    }
}

#[test]
fn test_predict_proba_rows_sum_to_one() {
    let (x, y) = separable_data(120);
    for kind in ModelKind::all() {
        let mut model = Estimator::new(kind).with_random_state(Some(0));
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (120, 2));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9, "{}", kind);
        }
        assert_eq!(model.classes(), &[0.0, 1.0]);
    }
}

#[test]
fn test_predictions_use_original_labels() {
    let (x, y) = separable_data(120);
    let y = y.mapv(|v| if v == 1.0 { 7.0 } else { 3.0 });
    for kind in ModelKind::all() {
        let mut model = Estimator::new(kind).with_random_state(Some(1));
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!(pred.iter().all(|&p| p == 3.0 || p == 7.0), "{}", kind);
    }
}

#[test]
fn test_same_seed_same_predictions() {
    let (x, y) = separable_data(150);
    for kind in ModelKind::all() {
        let mut a = Estimator::new(kind).with_random_state(Some(9));
        let mut b = Estimator::new(kind).with_random_state(Some(9));
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap(), "{}", kind);
    }
}

#[test]
fn test_searched_params_are_settable() {
    let mut rf = Estimator::new(ModelKind::RandomForest);
    rf.set_param("n_estimators", &ParamValue::Int(30)).unwrap();
    assert!(rf.params().contains(&("n_estimators", ParamValue::Int(30))));

    for kind in [ModelKind::HistGradientBoosting, ModelKind::XGBoost, ModelKind::LightGBM] {
        let mut model = Estimator::new(kind);
        model.set_param("max_depth", &ParamValue::Int(3)).unwrap();
        assert!(model.params().contains(&("max_depth", ParamValue::Int(3))), "{}", kind);
        assert!(model.to_string().contains("max_depth=3"));
    }
}

#[test]
fn test_unknown_param_is_rejected() {
    let mut model = Estimator::new(ModelKind::XGBoost);
    assert!(matches!(
        model.set_param("n_neighbors", &ParamValue::Int(3)),
        Err(BenchError::InvalidParameter { .. })
    ));
    assert!(model.set_param("subsample", &ParamValue::Float(1.5)).is_err());
}

#[test]
fn test_multiclass_target_is_rejected_by_boosters() {
    let (x, _) = separable_data(60);
    let y = Array1::from_iter((0..60).map(|i| (i % 3) as f64));
    for kind in [ModelKind::HistGradientBoosting, ModelKind::XGBoost, ModelKind::LightGBM] {
        let mut model = Estimator::new(kind);
        assert!(matches!(model.fit(&x, &y), Err(BenchError::Training(_))), "{}", kind);
    }
}

#[test]
fn test_predict_before_fit() {
    let (x, _) = separable_data(10);
    for kind in ModelKind::all() {
        assert!(Estimator::new(kind).predict(&x).is_err(), "{}", kind);
    }
}

#[test]
fn test_model_kind_parsing() {
    assert_eq!("rf".parse::<ModelKind>().unwrap(), ModelKind::RandomForest);
    assert_eq!("lgbm".parse::<ModelKind>().unwrap(), ModelKind::LightGBM);
    assert!("svm".parse::<ModelKind>().is_err());
}
