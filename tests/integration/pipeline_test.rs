//! End-to-end runs over a temporary data directory

use std::fs;
use std::path::Path;

use hesitancy::error::AnalysisError;
use hesitancy::pipeline::{
    OutputPaths, SURVEY_INPUT_DIR, TEXT_INPUT_DIR, clean_survey, load_clean_table,
};
use hesitancy::schema::{OutcomeProvenance, provenance_of};
use hesitancy::{AnalysisConfig, run_all};
use tempfile::TempDir;

use crate::utils::{day, posts_csv, raw_survey_csv, respondents};

fn write_survey(data_dir: &Path, n: usize) {
    let dir = data_dir.join(SURVEY_INPUT_DIR);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("wave_1.csv"), raw_survey_csv(&respondents(n, 21))).unwrap();
}

fn write_posts(data_dir: &Path) {
    let dir = data_dir.join(TEXT_INPUT_DIR);
    fs::create_dir_all(&dir).unwrap();
    let csv = posts_csv(&[
        ("2021-01-05", "Kerala", "Got my first dose, feeling safe and grateful! #vaccinated"),
        ("2021-01-20", "Bihar", "Scared of the side effects... not sure about this"),
        ("2021-02-11", "Kerala", "The vaccine appointment is at noon @clinic"),
        ("2021-02-14", "", "Terrible wait at the centre, awful experience"),
        ("2021-03-01", "Punjab", "https://example.org/news"),
    ]);
    fs::write(dir.join("posts.csv"), csv).unwrap();
}

fn setup(survey_rows: usize, with_posts: bool) -> (TempDir, TempDir) {
    let data = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    write_survey(data.path(), survey_rows);
    if with_posts {
        write_posts(data.path());
    }
    (data, output)
}

fn header(path: &Path) -> String {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .next()
        .unwrap_or_default()
        .to_string()
}

#[test]
fn test_full_run_writes_every_artifact() {
    let (data, output) = setup(1000, true);
    let summary = run_all(
        data.path(),
        output.path(),
        &AnalysisConfig::default(),
        day(2024, 1, 1),
    );

    assert!(summary.skipped_stages().is_empty(), "{summary:?}");
    let paths = OutputPaths::new(output.path());
    for path in [
        paths.clean_table(),
        paths.clean_metadata(),
        paths.clean_summary(),
        paths.model_report(),
        paths.odds_ratios(),
        paths.feature_importance(),
        paths.encoding_manifest(),
        paths.group_summary("state"),
        paths.group_summary("education"),
        paths.group_summary("gender"),
        paths.summary_statistics(),
        paths.sentiment_detailed(),
        paths.sentiment_timeseries(),
        paths.sentiment_by_location(),
    ] {
        assert!(path.is_file(), "missing {}", path.display());
    }

    let cleaning = summary.cleaning.completed().unwrap();
    assert_eq!(cleaning.provenance, OutcomeProvenance::Observed);
    assert_eq!(cleaning.batch.num_rows(), 1000);

    let report = fs::read_to_string(paths.model_report()).unwrap();
    assert!(report.starts_with("VACCINE HESITANCY LOGISTIC REGRESSION ANALYSIS"));
    assert!(report.contains("Sample size: 1000"));
    assert_eq!(
        header(&paths.odds_ratios()),
        "feature,coefficient,odds_ratio,conf_int_lower,conf_int_upper,p_value"
    );
    assert_eq!(header(&paths.group_summary("state")), "state,count,mean,std");
    assert_eq!(
        header(&paths.clean_summary()),
        "state,gender,education,count,mean,std"
    );

    let factors = summary.factors.completed().unwrap();
    let manifest_json = fs::read_to_string(paths.encoding_manifest()).unwrap();
    let manifest: hesitancy::EncodingManifest = serde_json::from_str(&manifest_json).unwrap();
    assert_eq!(manifest, factors.manifest);

    let sentiment = summary.sentiment.completed().unwrap();
    // the URL-only post normalizes to nothing
    assert_eq!(sentiment.scored_count, 4);
    assert_eq!(sentiment.monthly.len(), 2);
    let locations = sentiment.locations.as_ref().unwrap();
    let names: Vec<&str> = locations.iter().map(|l| l.user_location.as_str()).collect();
    assert_eq!(names, vec!["Bihar", "Kerala"]);

    let timeseries = fs::read_to_string(paths.sentiment_timeseries()).unwrap();
    assert!(timeseries.starts_with(
        "month,sentiment_mean,sentiment_std,sentiment_count,label_distribution"
    ));
    assert!(timeseries.contains("2021-01"));
    let detailed = header(&paths.sentiment_detailed());
    assert!(detailed.ends_with("clean_text,sentiment,label,month,year"));
}

#[test]
fn test_scenario_b_small_survey_skips_only_factor_analysis() {
    let (data, output) = setup(10, true);
    let summary = run_all(
        data.path(),
        output.path(),
        &AnalysisConfig::default(),
        day(2024, 1, 1),
    );

    assert!(summary.cleaning.is_completed());
    assert!(matches!(
        summary.factors.skipped(),
        Some(AnalysisError::InsufficientData { rows: 10, required: 50 })
    ));
    assert!(summary.statistics.is_completed());
    assert!(summary.sentiment.is_completed());
    assert_eq!(summary.skipped_stages(), vec!["factor analysis"]);

    let paths = OutputPaths::new(output.path());
    assert!(paths.clean_table().is_file());
    assert!(paths.summary_statistics().is_file());
    assert!(!paths.model_report().exists());
}

#[test]
fn test_missing_posts_do_not_stop_survey_stages() {
    let (data, output) = setup(200, false);
    let summary = run_all(
        data.path(),
        output.path(),
        &AnalysisConfig::default(),
        day(2024, 1, 1),
    );

    assert!(matches!(
        summary.sentiment.skipped(),
        Some(AnalysisError::MissingInput(_))
    ));
    assert!(summary.cleaning.is_completed());
    assert!(summary.factors.is_completed());
    assert!(summary.statistics.is_completed());
}

#[test]
fn test_later_run_reuses_cleaned_table() {
    let (data, output) = setup(300, false);
    let config = AnalysisConfig::default();
    let paths = OutputPaths::new(output.path());
    clean_survey(data.path(), &paths, &config).unwrap();

    let reloaded = load_clean_table(&paths).unwrap();
    assert_eq!(reloaded.num_rows(), 300);
    assert_eq!(provenance_of(&reloaded), Some(OutcomeProvenance::Observed));

    fs::remove_dir_all(data.path().join(SURVEY_INPUT_DIR)).unwrap();
    let summary = run_all(data.path(), output.path(), &config, day(2024, 1, 1));
    assert!(matches!(
        summary.cleaning.skipped(),
        Some(AnalysisError::MissingInput(_))
    ));
    assert!(summary.factors.is_completed());
    assert!(summary.statistics.is_completed());
}

#[test]
fn test_nothing_to_read() {
    let data = TempDir::new().unwrap();
    let output = TempDir::new().unwrap();
    let summary = run_all(
        data.path(),
        output.path(),
        &AnalysisConfig::default(),
        day(2024, 1, 1),
    );
    assert_eq!(summary.skipped_stages().len(), 4);
    let err = summary.factors.skipped().unwrap();
    assert!(!err.remedy().is_empty());
}
