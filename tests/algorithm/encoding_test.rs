//! Tests for design-matrix encoding

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use hesitancy::algorithm::encoding::{FeatureKind, INTERCEPT_COLUMN};
use hesitancy::config::{EncoderConfig, FeatureCandidate, OUTCOME_COLUMN};
use hesitancy::error::AnalysisError;
use hesitancy::FeatureEncoder;

use crate::utils::{canonical_survey, respondents};

fn encoder(candidates: &[&str], min_rows: usize) -> FeatureEncoder {
    FeatureEncoder::new(
        EncoderConfig::default()
            .with_candidates(candidates.iter().copied())
            .with_min_rows(min_rows),
    )
}

fn small_table() -> RecordBatch {
    RecordBatch::try_from_iter(vec![
        (
            "gender",
            Arc::new(StringArray::from(vec![
                Some("Male"),
                Some("Female"),
                None,
                Some("Male"),
                Some("Unknown"),
            ])) as ArrayRef,
        ),
        (
            "education_level",
            Arc::new(Int64Array::from(vec![0, 1, 2, 3, 1])) as ArrayRef,
        ),
        (
            "income",
            Arc::new(Float64Array::from(vec![
                Some(1.5),
                Some(2.5),
                Some(3.5),
                None,
                Some(4.5),
            ])) as ArrayRef,
        ),
        (
            OUTCOME_COLUMN,
            Arc::new(Int64Array::from(vec![1, 0, 1, 0, 0])) as ArrayRef,
        ),
    ])
    .unwrap()
}

#[test]
fn test_levels_are_sorted_and_first_dropped() {
    let data = encoder(&["gender", "education_level"], 1)
        .fit(&small_table(), OUTCOME_COLUMN)
        .unwrap();

    assert_eq!(
        data.matrix.columns,
        vec![
            "gender_Male",
            "gender_Unknown",
            "education_level_1",
            "education_level_2",
            "education_level_3",
            INTERCEPT_COLUMN,
        ]
    );
    // the row with a null gender is excluded
    assert_eq!(data.source_rows, vec![0, 1, 3, 4]);
    assert_eq!(data.excluded_rows, 1);
    assert_eq!(data.matrix.nrows(), data.outcome.len());

    let male = data.matrix.column("gender_Male").unwrap();
    assert_eq!(male.to_vec(), vec![1.0, 0.0, 1.0, 0.0]);
    let intercept = data.matrix.column(INTERCEPT_COLUMN).unwrap();
    assert!(intercept.iter().all(|&v| v == 1.0));
    assert_eq!(data.outcome.to_vec(), vec![1.0, 0.0, 0.0, 0.0]);
}

#[test]
fn test_low_cardinality_numeric_is_categorical() {
    let data = encoder(&["income"], 1)
        .fit(&small_table(), OUTCOME_COLUMN)
        .unwrap();
    let FeatureKind::Categorical { levels } = &data.manifest.features[0].kind else {
        panic!("income should be categorical");
    };
    assert_eq!(levels, &vec!["1.5", "2.5", "3.5", "4.5"]);
    assert_eq!(data.matrix.ncols(), 4);
}

#[test]
fn test_high_cardinality_numeric_passes_through() {
    let people = respondents(200, 7);
    let data = encoder(&["age"], 50)
        .fit(&canonical_survey(&people), OUTCOME_COLUMN)
        .unwrap();

    assert_eq!(data.manifest.features[0].kind, FeatureKind::Numeric);
    assert_eq!(data.matrix.columns, vec!["age", INTERCEPT_COLUMN]);
    let ages = data.matrix.column("age").unwrap();
    assert_eq!(ages[0], people[0].age as f64);
}

#[test]
fn test_fallback_candidate_is_used() {
    let people = respondents(100, 3);
    let config = EncoderConfig {
        candidates: vec![FeatureCandidate::new("education_level").or("education")],
        ..EncoderConfig::default()
    };
    let data = FeatureEncoder::new(config)
        .fit(&canonical_survey(&people), OUTCOME_COLUMN)
        .unwrap();

    let feature = &data.manifest.features[0];
    assert_eq!(feature.candidate, "education_level");
    assert_eq!(feature.source, "education");
    assert_eq!(
        data.matrix.columns,
        vec![
            "education_No Education",
            "education_Primary",
            "education_Secondary",
            INTERCEPT_COLUMN
        ]
    );
}

#[test]
fn test_no_candidates_present() {
    let table = RecordBatch::try_from_iter(vec![
        (
            "state",
            Arc::new(StringArray::from(vec!["Kerala"; 60])) as ArrayRef,
        ),
        (
            OUTCOME_COLUMN,
            Arc::new(Int64Array::from(vec![0; 60])) as ArrayRef,
        ),
    ])
    .unwrap();

    let err = FeatureEncoder::default()
        .fit(&table, OUTCOME_COLUMN)
        .unwrap_err();
    let AnalysisError::InsufficientFeatures { candidates } = err else {
        panic!("expected InsufficientFeatures, got {err:?}");
    };
    assert!(candidates.contains(&"gender".to_string()));
    assert!(candidates.contains(&"education".to_string()));
}

#[test]
fn test_too_few_rows() {
    let people = respondents(10, 11);
    let err = FeatureEncoder::default()
        .fit(&canonical_survey(&people), OUTCOME_COLUMN)
        .unwrap_err();
    assert!(matches!(
        err,
        AnalysisError::InsufficientData { rows: 10, required: 50 }
    ));
}

#[test]
fn test_all_null_numeric_is_skipped() {
    let table = RecordBatch::try_from_iter(vec![
        (
            "gender",
            Arc::new(StringArray::from(vec!["Male", "Female", "Male"])) as ArrayRef,
        ),
        (
            "age",
            Arc::new(Float64Array::from(vec![None, None, None])) as ArrayRef,
        ),
        (
            OUTCOME_COLUMN,
            Arc::new(Int64Array::from(vec![1, 0, 1])) as ArrayRef,
        ),
    ])
    .unwrap();

    let data = encoder(&["gender", "age"], 1)
        .fit(&table, OUTCOME_COLUMN)
        .unwrap();
    assert_eq!(data.manifest.source_columns(), vec!["gender"]);
    assert_eq!(data.matrix.nrows(), 3);
}

#[test]
fn test_manifest_keeps_columns_stable() {
    let people = respondents(300, 5);
    let encoder = encoder(&["gender", "education", "wealth_index"], 50);
    let fitted = encoder
        .fit(&canonical_survey(&people), OUTCOME_COLUMN)
        .unwrap();

    // a later table carrying only a subset of levels, plus one unseen level
    let later = RecordBatch::try_from_iter(vec![
        (
            "gender",
            Arc::new(StringArray::from(vec!["Male", "Male", "Other"])) as ArrayRef,
        ),
        (
            "education",
            Arc::new(StringArray::from(vec!["Higher", "Higher", "Higher"])) as ArrayRef,
        ),
        (
            "wealth_index",
            Arc::new(StringArray::from(vec!["Richest", "Poorest", "Middle"])) as ArrayRef,
        ),
    ])
    .unwrap();

    let (matrix, rows) = encoder.transform(&later, &fitted.manifest).unwrap();
    assert_eq!(matrix.columns, fitted.matrix.columns);
    assert_eq!(matrix.columns, fitted.manifest.column_names());
    assert_eq!(rows, vec![0, 1]);

    let manifest_json = serde_json::to_string(&fitted.manifest).unwrap();
    let restored = serde_json::from_str(&manifest_json).unwrap();
    assert_eq!(fitted.manifest, restored);
}
