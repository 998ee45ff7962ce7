//! Integration tests for the column transformer: scaling, one-hot encoding and unknown categories

use cardiobench::error::BenchError;
use cardiobench::preprocessing::{ColumnSelector, ColumnTransformer, HandleUnknown, OneHotEncoder, StandardScaler, Transformer};
use polars::prelude::*;

fn create_train_frame() -> DataFrame {
    df!(
        "age" => &[40i64, 50, 60, 70],
        "chol" => &[Some(200.0), Some(220.0), None, Some(260.0)],
        "cp" => &["typical", "atypical", "typical", "asymptomatic"],
        "thal" => &["normal", "fixed", "reversible", "normal"]
    )
    .unwrap()
}

#[test]
fn test_default_transformer_layout() {
    let df = create_train_frame();
    let mut ct = ColumnTransformer::default();
    let x = ct.fit_transform(&df).unwrap();

    // 2 scaled numeric columns + 3 cp categories + 3 thal categories
    assert_eq!(x.dim(), (4, 8));
    assert_eq!(
        ct.feature_names(),
        vec![
            "scaler__age",
            "scaler__chol",
            "encoder__cp_asymptomatic",
            "encoder__cp_atypical",
            "encoder__cp_typical",
            "encoder__thal_fixed",
            "encoder__thal_normal",
            "encoder__thal_reversible",
        ]
    );

    // One-hot rows sum to one per categorical column
    for row in x.rows() {
        let cp: f64 = row.iter().skip(2).take(3).sum();
        let thal: f64 = row.iter().skip(5).sum();
        assert_eq!(cp, 1.0);
        assert_eq!(thal, 1.0);
    }
}

#[test]
fn test_scaled_columns_have_zero_mean() {
    let df = create_train_frame();
    let mut ct = ColumnTransformer::default();
    let x = ct.fit_transform(&df).unwrap();

    for j in 0..2 {
        let present: Vec<f64> = x.column(j).iter().copied().filter(|v| !v.is_nan()).collect();
        let mean = present.iter().sum::<f64>() / present.len() as f64;
        assert!(mean.abs() < 1e-12, "column {} mean {}", j, mean);
    }
}

#[test]
fn test_missing_numeric_value_stays_nan() {
    let df = create_train_frame();
    let mut ct = ColumnTransformer::default();
    let x = ct.fit_transform(&df).unwrap();

    // chol is null in row 2
    assert!(x[[2, 1]].is_nan());
    assert_eq!(x.iter().filter(|v| v.is_nan()).count(), 1);
}

#[test]
fn test_unknown_category_is_ignored_at_transform() {
    let mut ct = ColumnTransformer::default();
    ct.fit(&create_train_frame()).unwrap();

    let test = df!(
        "age" => &[55i64],
        "chol" => &[Some(230.0)],
        "cp" => &["non-anginal"],
        "thal" => &["normal"]
    )
    .unwrap();
    let x = ct.transform(&test).unwrap();

    assert_eq!(x.row(0).iter().skip(2).take(3).sum::<f64>(), 0.0);
    assert_eq!(x.row(0).iter().skip(5).sum::<f64>(), 1.0);
}

#[test]
fn test_strict_encoder_rejects_unknown_category() {
    let mut ct = ColumnTransformer::new()
        .with_transformer("scaler", Transformer::Scaler(StandardScaler::default()), ColumnSelector::Numeric)
        .with_transformer(
            "encoder",
            Transformer::OneHot(OneHotEncoder::new(HandleUnknown::Error)),
            ColumnSelector::Categorical,
        );
    ct.fit(&create_train_frame()).unwrap();

    let test = df!(
        "age" => &[55i64],
        "chol" => &[Some(230.0)],
        "cp" => &["non-anginal"],
        "thal" => &["normal"]
    )
    .unwrap();
    assert!(matches!(ct.transform(&test), Err(BenchError::Preprocessing(_))));
}

#[test]
fn test_missing_column_at_transform() {
    let mut ct = ColumnTransformer::default();
    ct.fit(&create_train_frame()).unwrap();

    let test = df!("age" => &[55i64], "cp" => &["typical"], "thal" => &["normal"]).unwrap();
    assert!(matches!(ct.transform(&test), Err(BenchError::ColumnNotFound(_))));
}

#[test]
fn test_display_renders_transformers() {
    let rendered = ColumnTransformer::default().to_string();
    assert!(rendered.contains("('scaler', StandardScaler(), <dtype: number>)"));
    assert!(rendered.contains("OneHotEncoder(handle_unknown='ignore')"));
}
