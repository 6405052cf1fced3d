//! Tests for the logistic hesitancy model

use approx::assert_relative_eq;
use hesitancy::algorithm::ModelFitReport;
use hesitancy::algorithm::encoding::{FeatureMatrix, INTERCEPT_COLUMN};
use hesitancy::config::{EncoderConfig, ModelConfig, OUTCOME_COLUMN};
use hesitancy::error::AnalysisError;
use hesitancy::schema::OutcomeProvenance;
use hesitancy::{FeatureEncoder, HesitancyModel};
use ndarray::{Array1, Array2};

use crate::utils::{canonical_survey, respondents};

/// Two groups: x = 0 has 10 of 40 hesitant, x = 1 has 30 of 60
fn two_by_two() -> (FeatureMatrix, Array1<f64>) {
    let mut rows = Vec::new();
    let mut y = Vec::new();
    for (x, total, positive) in [(0.0, 40, 10), (1.0, 60, 30)] {
        for i in 0..total {
            rows.extend_from_slice(&[x, 1.0]);
            y.push(if i < positive { 1.0 } else { 0.0 });
        }
    }
    let values = Array2::from_shape_vec((y.len(), 2), rows).unwrap();
    (
        FeatureMatrix {
            columns: vec!["x".to_string(), INTERCEPT_COLUMN.to_string()],
            values,
        },
        Array1::from_vec(y),
    )
}

#[test]
fn test_matches_closed_form_two_by_two() {
    let (matrix, y) = two_by_two();
    let model = HesitancyModel::default().fit(&matrix, &y).unwrap();

    assert_relative_eq!(model.coefficient("x").unwrap(), 3.0_f64.ln(), epsilon = 1e-6);
    assert_relative_eq!(
        model.coefficient(INTERCEPT_COLUMN).unwrap(),
        (1.0_f64 / 3.0).ln(),
        epsilon = 1e-6
    );
    assert_relative_eq!(model.std_errors()[0], 0.2_f64.sqrt(), epsilon = 1e-6);
    assert_relative_eq!(model.std_errors()[1], (1.0_f64 / 10.0 + 1.0 / 30.0).sqrt(), epsilon = 1e-6);

    // log-likelihoods of the saturated two-group and pooled models
    let ll = 10.0 * 0.25_f64.ln() + 30.0 * 0.75_f64.ln() + 60.0 * 0.5_f64.ln();
    let ll0 = 40.0 * 0.4_f64.ln() + 60.0 * 0.6_f64.ln();
    assert_relative_eq!(model.log_likelihood(), ll, epsilon = 1e-8);
    assert_relative_eq!(model.null_log_likelihood(), ll0, epsilon = 1e-8);
    assert_relative_eq!(model.aic(), 4.0 - 2.0 * ll, epsilon = 1e-8);
    assert_relative_eq!(model.pseudo_r_squared(), 1.0 - ll / ll0, epsilon = 1e-10);
    assert_eq!(model.n_obs(), 100);
    assert_eq!(model.df_model(), 1);
    assert_eq!(model.df_resid(), 98);

    let p = model.llr_p_value().unwrap();
    assert!(p > 0.0 && p < 0.05);
}

#[test]
fn test_odds_ratio_table_contract() {
    let (matrix, y) = two_by_two();
    let model = HesitancyModel::default().fit(&matrix, &y).unwrap();
    let rows = model.odds_ratios();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].feature, "x");
    assert_relative_eq!(rows[0].odds_ratio, 3.0, epsilon = 1e-6);
    let se = 0.2_f64.sqrt();
    assert_relative_eq!(
        rows[0].conf_int_lower,
        (3.0_f64.ln() - 1.96 * se).exp(),
        epsilon = 1e-5
    );
    for row in &rows {
        assert!((row.odds_ratio - row.coefficient.exp()).abs() <= 1e-9 * row.odds_ratio.max(1.0));
        assert!(row.conf_int_lower <= row.odds_ratio);
        assert!(row.odds_ratio <= row.conf_int_upper);
        assert!((0.0..=1.0).contains(&row.p_value));
    }
}

#[test]
fn test_scenario_a_one_row_per_encoded_feature() {
    let people = respondents(1000, 42);
    let table = canonical_survey(&people);
    let config =
        EncoderConfig::default().with_candidates(["gender", "education", "religion", "wealth_index", "state"]);
    let data = FeatureEncoder::new(config).fit(&table, OUTCOME_COLUMN).unwrap();

    let rate = data.outcome.mean().unwrap();
    assert!(rate > 0.2 && rate < 0.45, "hesitancy rate {rate}");
    // 1 + 3 + 3 + 4 + 2 dummies plus the intercept
    assert_eq!(data.matrix.ncols(), 14);

    let model = HesitancyModel::default()
        .fit(&data.matrix, &data.outcome)
        .unwrap();
    let rows = model.odds_ratios();
    assert_eq!(rows.len(), 14);
    let names: Vec<&str> = rows.iter().map(|r| r.feature.as_str()).collect();
    assert_eq!(names, data.matrix.columns.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(model.coefficients().iter().all(|c| c.is_finite()));
    for row in &rows {
        assert!(row.conf_int_lower <= row.odds_ratio && row.odds_ratio <= row.conf_int_upper);
    }

    // education lowers hesitancy in the generating process
    let secondary = model.coefficient("education_Secondary").unwrap();
    let no_education = model.coefficient("education_No Education").unwrap();
    assert!(no_education > secondary);
}

#[test]
fn test_significant_factors_sorted_by_odds_ratio() {
    let people = respondents(2000, 9);
    let data = FeatureEncoder::default()
        .fit(&canonical_survey(&people), OUTCOME_COLUMN)
        .unwrap();
    let model = HesitancyModel::default()
        .fit(&data.matrix, &data.outcome)
        .unwrap();

    let significant = model.significant_factors(0.05);
    assert!(!significant.is_empty());
    assert!(significant.iter().all(|r| r.p_value < 0.05));
    assert!(significant.iter().all(|r| r.feature != INTERCEPT_COLUMN));
    assert!(
        significant
            .windows(2)
            .all(|w| w[0].odds_ratio >= w[1].odds_ratio)
    );

    let importance = model.feature_importance();
    assert_eq!(importance.len(), model.n_params());
    assert!(importance.iter().all(|r| r.coefficient >= 0.0));
    assert!(importance.windows(2).all(|w| w[0].coefficient >= w[1].coefficient));

    let probabilities = model.predict_proba(&data.matrix).unwrap();
    assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    assert_relative_eq!(
        probabilities.mean().unwrap(),
        data.outcome.mean().unwrap(),
        epsilon = 1e-6
    );
}

#[test]
fn test_perfect_separation_is_model_fit_error() {
    let n = 100;
    let values = Array2::from_shape_fn((n, 2), |(i, j)| if j == 0 { i as f64 } else { 1.0 });
    let y = Array1::from_shape_fn(n, |i| if i >= 50 { 1.0 } else { 0.0 });
    let matrix = FeatureMatrix {
        columns: vec!["x".to_string(), INTERCEPT_COLUMN.to_string()],
        values,
    };

    let err = HesitancyModel::default().fit(&matrix, &y).unwrap_err();
    assert!(matches!(err, AnalysisError::ModelFit(_)), "{err:?}");
}

#[test]
fn test_single_class_outcome_is_model_fit_error() {
    let (matrix, _) = two_by_two();
    let y = Array1::zeros(matrix.nrows());
    let err = HesitancyModel::default().fit(&matrix, &y).unwrap_err();
    let AnalysisError::ModelFit(message) = err else {
        panic!("expected ModelFit");
    };
    assert!(message.contains("separation"));
}

#[test]
fn test_collinear_design_is_model_fit_error() {
    let (base, y) = two_by_two();
    let n = base.nrows();
    let values = Array2::from_shape_fn((n, 3), |(i, j)| match j {
        0 => base.values[[i, 0]],
        1 => 2.0 * base.values[[i, 0]],
        _ => 1.0,
    });
    let matrix = FeatureMatrix {
        columns: vec!["x".into(), "x_twice".into(), INTERCEPT_COLUMN.into()],
        values,
    };

    let err = HesitancyModel::default().fit(&matrix, &y).unwrap_err();
    let AnalysisError::ModelFit(message) = err else {
        panic!("expected ModelFit");
    };
    assert!(message.contains("rank deficient"));
}

#[test]
fn test_non_convergence_is_reported() {
    let (matrix, y) = two_by_two();
    let model = HesitancyModel::new(ModelConfig {
        max_iterations: 1,
        ..ModelConfig::default()
    });
    let err = model.fit(&matrix, &y).unwrap_err();
    assert!(matches!(err, AnalysisError::ModelFit(_)));
    assert!(err.to_string().contains("converge"));
}

#[test]
fn test_predict_rejects_foreign_columns() {
    let (matrix, y) = two_by_two();
    let model = HesitancyModel::default().fit(&matrix, &y).unwrap();
    let other = FeatureMatrix {
        columns: vec!["z".to_string(), INTERCEPT_COLUMN.to_string()],
        values: matrix.values.clone(),
    };
    assert!(model.predict_proba(&other).is_err());
}

#[test]
fn test_report_lists_every_parameter() {
    let (matrix, y) = two_by_two();
    let model = HesitancyModel::default().fit(&matrix, &y).unwrap();
    let text = ModelFitReport {
        model: &model,
        hesitancy_rate: 0.4,
        provenance: Some(OutcomeProvenance::Heuristic),
        significance_level: 0.05,
    }
    .render();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "VACCINE HESITANCY LOGISTIC REGRESSION ANALYSIS");
    assert!(lines.contains(&"Sample size: 100"));
    assert!(lines.contains(&"Hesitancy rate: 0.400"));
    assert!(text.contains("WARNING: the outcome was synthesized"));
    assert!(lines.iter().any(|l| l.starts_with("x ")));
    assert!(lines.iter().any(|l| l.starts_with("const ")));
    assert!(lines.contains(&"Significant factors (p < 0.05):"));
    assert!(lines.contains(&"  x: OR=3.000 (increases hesitancy)"));
    assert!(text.ends_with('\n'));
}
