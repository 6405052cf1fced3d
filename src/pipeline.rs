//! Stage chains for the survey and sentiment analyses
//!
//! Each stage reads its inputs up front, computes, then writes its artifacts.
//! A failing stage is reported and skipped; it never stops a sibling stage.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::algorithm::{
    EncodingManifest, FeatureEncoder, FittedModel, GroupSummarizer, HesitancyModel,
    ModelFitReport, OddsRatioRow, OverallStatistics,
};
use crate::config::{AnalysisConfig, OUTCOME_COLUMN};
use crate::error::{AnalysisError, Result};
use crate::schema::{NormalizedTable, OutcomeProvenance, SchemaNormalizer, provenance_of};
use crate::table::columns::with_metadata;
use crate::table::{
    concat_tables, list_table_files, read_table, read_tables, rows_to_batch, write_csv,
    write_json, write_text,
};
use crate::text::corpus::LOCATION_COLUMN;
use crate::text::{
    LabelDistribution, LocationSummary, PeriodSummary, SentimentScorer, TemporalAggregator,
    location_table, monthly_table, records_from_batch, score_corpus, scored_text_table,
};

/// Survey inputs under the data directory
pub const SURVEY_INPUT_DIR: &str = "nfhs";
/// Post exports under the data directory
pub const TEXT_INPUT_DIR: &str = "twitter";

/// Result of one stage: its output, or the error that made it skip
#[derive(Debug)]
pub enum StageOutcome<T> {
    Completed(T),
    Skipped(AnalysisError),
}

impl<T> StageOutcome<T> {
    /// Wrap a stage result, logging a skip with its remedy
    pub fn from_result(stage: &str, result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Completed(value),
            Err(err) => {
                warn!("Skipping {stage}: {err}");
                warn!("  failed precondition in: {}", err.stage());
                warn!("  remedy: {}", err.remedy());
                Self::Skipped(err)
            }
        }
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The output when the stage completed
    #[must_use]
    pub const fn completed(&self) -> Option<&T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped(_) => None,
        }
    }

    /// The error when the stage was skipped
    #[must_use]
    pub const fn skipped(&self) -> Option<&AnalysisError> {
        match self {
            Self::Completed(_) => None,
            Self::Skipped(err) => Some(err),
        }
    }
}

/// Artifact locations under the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub tables: PathBuf,
    pub reports: PathBuf,
}

impl OutputPaths {
    #[must_use]
    pub fn new(output_dir: &Path) -> Self {
        Self {
            tables: output_dir.join("tables"),
            reports: output_dir.join("reports"),
        }
    }

    #[must_use]
    pub fn clean_table(&self) -> PathBuf {
        self.tables.join("nfhs_clean.csv")
    }

    #[must_use]
    pub fn clean_metadata(&self) -> PathBuf {
        self.tables.join("nfhs_clean.meta.json")
    }

    #[must_use]
    pub fn clean_summary(&self) -> PathBuf {
        self.tables.join("nfhs_summary.csv")
    }

    #[must_use]
    pub fn model_report(&self) -> PathBuf {
        self.reports.join("logit_summary.txt")
    }

    #[must_use]
    pub fn odds_ratios(&self) -> PathBuf {
        self.reports.join("logit_odds_ratios.csv")
    }

    #[must_use]
    pub fn feature_importance(&self) -> PathBuf {
        self.reports.join("feature_importance.csv")
    }

    #[must_use]
    pub fn encoding_manifest(&self) -> PathBuf {
        self.reports.join("encoding_manifest.json")
    }

    #[must_use]
    pub fn group_summary(&self, dimension: &str) -> PathBuf {
        self.reports.join(format!("hesitancy_by_{dimension}.csv"))
    }

    #[must_use]
    pub fn summary_statistics(&self) -> PathBuf {
        self.reports.join("summary_statistics.txt")
    }

    #[must_use]
    pub fn sentiment_detailed(&self) -> PathBuf {
        self.tables.join("twitter_sentiment_detailed.csv")
    }

    #[must_use]
    pub fn sentiment_timeseries(&self) -> PathBuf {
        self.tables.join("twitter_sentiment_timeseries.csv")
    }

    #[must_use]
    pub fn sentiment_by_location(&self) -> PathBuf {
        self.tables.join("twitter_sentiment_by_state.csv")
    }
}

/// Sidecar written next to the cleaned table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningMetadata {
    pub outcome_provenance: OutcomeProvenance,
    pub input_files: Vec<PathBuf>,
    pub input_rows: usize,
    pub retained_rows: usize,
    pub dropped_rows: usize,
    pub defaulted_columns: Vec<String>,
    pub hesitancy_rate: Option<f64>,
}

/// Input files and tables of a data subdirectory, failing when there are none
fn input_tables(dir: &Path) -> Result<(Vec<PathBuf>, Vec<RecordBatch>)> {
    let files = list_table_files(dir)?;
    if files.is_empty() {
        return Err(AnalysisError::MissingInput(dir.to_path_buf()));
    }
    info!("Found {} data files in {}", files.len(), dir.display());
    let tables = read_tables(&files)?;
    Ok((files, tables))
}

/// Normalize the survey files and write the cleaned table, its sidecar and the
/// state × gender × education summary
pub fn clean_survey(
    data_dir: &Path,
    paths: &OutputPaths,
    config: &AnalysisConfig,
) -> Result<NormalizedTable> {
    let (input_files, tables) = input_tables(&data_dir.join(SURVEY_INPUT_DIR))?;

    let normalized = SchemaNormalizer::new(config.schema.clone()).normalize(&tables)?;
    write_csv(&normalized.batch, &paths.clean_table())?;

    let hesitancy_rate = normalized.hesitancy_rate();
    let metadata = CleaningMetadata {
        outcome_provenance: normalized.provenance,
        input_files,
        input_rows: normalized.input_rows,
        retained_rows: normalized.batch.num_rows(),
        dropped_rows: normalized.dropped_rows,
        defaulted_columns: normalized.defaulted_columns.clone(),
        hesitancy_rate: hesitancy_rate.is_finite().then_some(hesitancy_rate),
    };
    write_json(&metadata, &paths.clean_metadata())?;

    let summary = GroupSummarizer::new(config.summary.decimals).summarize(
        &normalized.batch,
        OUTCOME_COLUMN,
        &["state", "gender", "education"],
    )?;
    write_csv(&summary.to_batch()?, &paths.clean_summary())?;

    info!(
        "Cleaned {} rows ({} dropped), hesitancy rate {:.3}, outcome {}",
        normalized.batch.num_rows(),
        normalized.dropped_rows,
        hesitancy_rate,
        normalized.provenance
    );
    Ok(normalized)
}

/// Read the cleaned table written by [`clean_survey`], restoring its provenance
pub fn load_clean_table(paths: &OutputPaths) -> Result<RecordBatch> {
    let path = paths.clean_table();
    if !path.is_file() {
        return Err(AnalysisError::MissingInput(path));
    }
    let batch = read_table(&path)?;

    let meta_path = paths.clean_metadata();
    if !meta_path.is_file() {
        warn!(
            "No cleaning sidecar at {}; outcome provenance unknown",
            meta_path.display()
        );
        return Ok(batch);
    }
    let metadata: CleaningMetadata = serde_json::from_reader(File::open(&meta_path)?)?;
    with_metadata(
        &batch,
        HashMap::from([(
            OutcomeProvenance::METADATA_KEY.to_string(),
            metadata.outcome_provenance.as_str().to_string(),
        )]),
    )
}

/// Output of the factor analysis
#[derive(Debug, Clone)]
pub struct FactorAnalysis {
    pub model: FittedModel,
    pub manifest: EncodingManifest,
    /// Significant factors, highest odds ratio first
    pub significant: Vec<OddsRatioRow>,
}

/// Encode, fit and write the model report, odds ratios, feature importance and manifest
pub fn analyze_factors(
    batch: &RecordBatch,
    paths: &OutputPaths,
    config: &AnalysisConfig,
) -> Result<FactorAnalysis> {
    let encoded = FeatureEncoder::new(config.encoder.clone()).fit(batch, OUTCOME_COLUMN)?;
    info!(
        "Running logistic regression with {} observations and {} features",
        encoded.matrix.nrows(),
        encoded.matrix.ncols()
    );

    let model = HesitancyModel::new(config.model.clone()).fit(&encoded.matrix, &encoded.outcome)?;
    let provenance = provenance_of(batch);
    if provenance.is_some_and(OutcomeProvenance::is_degraded) {
        warn!("Model was fitted on a heuristic placeholder outcome, not observed hesitancy");
    }

    let report = ModelFitReport {
        model: &model,
        hesitancy_rate: encoded.outcome.mean().unwrap_or(f64::NAN),
        provenance,
        significance_level: config.model.significance_level,
    };
    write_text(&report.render(), &paths.model_report())?;
    write_csv(&rows_to_batch(&model.odds_ratios())?, &paths.odds_ratios())?;
    write_csv(&rows_to_batch(&model.feature_importance())?, &paths.feature_importance())?;
    write_json(&encoded.manifest, &paths.encoding_manifest())?;

    info!("Model AIC: {:.2}", model.aic());
    info!("Pseudo R-squared: {:.3}", model.pseudo_r_squared());
    let significant = model.significant_factors(config.model.significance_level);
    if significant.is_empty() {
        info!("No significant factors (p < {})", config.model.significance_level);
    } else {
        info!("Significant factors (p < {}):", config.model.significance_level);
        for row in &significant {
            info!(
                "  {}: OR={:.3} ({} hesitancy)",
                row.feature,
                row.odds_ratio,
                if row.increases_odds() { "increases" } else { "decreases" }
            );
        }
    }

    Ok(FactorAnalysis {
        model,
        manifest: encoded.manifest,
        significant,
    })
}

/// Write per-dimension hesitancy tables and the overall statistics
pub fn summarize_hesitancy(
    batch: &RecordBatch,
    paths: &OutputPaths,
    config: &AnalysisConfig,
) -> Result<OverallStatistics> {
    let summarizer = GroupSummarizer::new(config.summary.decimals);
    for dimension in &config.summary.dimensions {
        if batch.column_by_name(dimension).is_none() {
            warn!("No '{dimension}' column; skipping its hesitancy table");
            continue;
        }
        let summary = summarizer.summarize(batch, OUTCOME_COLUMN, &[dimension.as_str()])?;
        write_csv(&summary.to_batch()?, &paths.group_summary(dimension))?;
    }

    let statistics = OverallStatistics::from_batch(batch)?;
    write_text(&statistics.to_string(), &paths.summary_statistics())?;
    Ok(statistics)
}

/// Output of the sentiment analysis
#[derive(Debug, Clone)]
pub struct SentimentAnalysis {
    pub scored_count: usize,
    pub mean_polarity: f64,
    pub labels: LabelDistribution,
    pub monthly: Vec<PeriodSummary>,
    /// Present when the input has a location column
    pub locations: Option<Vec<LocationSummary>>,
}

/// Score the post exports and write the detailed, monthly and per-location tables
pub fn analyze_sentiment(
    data_dir: &Path,
    paths: &OutputPaths,
    config: &AnalysisConfig,
    processing_time: NaiveDateTime,
) -> Result<SentimentAnalysis> {
    let (_, tables) = input_tables(&data_dir.join(TEXT_INPUT_DIR))?;
    let batch = concat_tables(&tables)?;
    info!("Loaded {} posts", batch.num_rows());

    let records = records_from_batch(&batch)?;
    let scorer = SentimentScorer::with_config(config.sentiment);
    let scored = score_corpus(&records, &scorer, processing_time)?;
    write_csv(&scored_text_table(&batch, &scored)?, &paths.sentiment_detailed())?;

    let aggregator = TemporalAggregator::new(config.summary.decimals);
    let monthly = aggregator.monthly(&scored);
    write_csv(&monthly_table(&monthly)?, &paths.sentiment_timeseries())?;

    let locations = if batch.column_by_name(LOCATION_COLUMN).is_some() {
        let locations = aggregator.by_location(&scored);
        write_csv(&location_table(&locations)?, &paths.sentiment_by_location())?;
        Some(locations)
    } else {
        None
    };

    let mean_polarity = scored.iter().map(|s| s.polarity).sum::<f64>() / scored.len() as f64;
    let labels: LabelDistribution = scored.iter().map(|s| s.label).collect();
    info!("Average sentiment: {mean_polarity:.3}");
    info!("Sentiment distribution: {}", labels.to_json()?);

    Ok(SentimentAnalysis {
        scored_count: scored.len(),
        mean_polarity,
        labels,
        monthly,
        locations,
    })
}

/// Outcome of every stage of a full run
#[derive(Debug)]
pub struct RunSummary {
    pub cleaning: StageOutcome<NormalizedTable>,
    pub factors: StageOutcome<FactorAnalysis>,
    pub statistics: StageOutcome<OverallStatistics>,
    pub sentiment: StageOutcome<SentimentAnalysis>,
}

impl RunSummary {
    /// Names of the stages that were skipped
    #[must_use]
    pub fn skipped_stages(&self) -> Vec<&'static str> {
        [
            ("cleaning", self.cleaning.is_completed()),
            ("factor analysis", self.factors.is_completed()),
            ("summary statistics", self.statistics.is_completed()),
            ("sentiment analysis", self.sentiment.is_completed()),
        ]
        .into_iter()
        .filter(|(_, completed)| !completed)
        .map(|(name, _)| name)
        .collect()
    }
}

/// Run both pipelines
///
/// The survey stages use the freshly cleaned table, or the one left by an
/// earlier run when cleaning is skipped.
pub fn run_all(
    data_dir: &Path,
    output_dir: &Path,
    config: &AnalysisConfig,
    processing_time: NaiveDateTime,
) -> RunSummary {
    let paths = OutputPaths::new(output_dir);

    let cleaning = StageOutcome::from_result("cleaning", clean_survey(data_dir, &paths, config));
    let clean_batch = match cleaning.completed() {
        Some(normalized) => Ok(normalized.batch.clone()),
        None => load_clean_table(&paths),
    };

    let (factors, statistics) = match clean_batch {
        Ok(batch) => (
            StageOutcome::from_result("factor analysis", analyze_factors(&batch, &paths, config)),
            StageOutcome::from_result(
                "summary statistics",
                summarize_hesitancy(&batch, &paths, config),
            ),
        ),
        Err(err) => {
            warn!("No cleaned survey table available: {err}");
            (
                StageOutcome::from_result("factor analysis", Err(err)),
                StageOutcome::from_result(
                    "summary statistics",
                    Err(AnalysisError::MissingInput(paths.clean_table())),
                ),
            )
        }
    };

    let sentiment = StageOutcome::from_result(
        "sentiment analysis",
        analyze_sentiment(data_dir, &paths, config, processing_time),
    );

    let summary = RunSummary {
        cleaning,
        factors,
        statistics,
        sentiment,
    };
    let skipped = summary.skipped_stages();
    if skipped.is_empty() {
        info!("All stages completed; outputs in {}", output_dir.display());
    } else {
        warn!("Completed with skipped stages: {}", skipped.iter().join(", "));
    }
    summary
}
