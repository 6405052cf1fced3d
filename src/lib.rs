//! Socio-demographic predictors of vaccine hesitancy and sentiment of vaccine
//! discourse.
//!
//! Two independent batch pipelines share the table layer:
//! survey files are harmonized, encoded and fitted with a logistic model;
//! social posts are normalized, scored and aggregated by month and location.

pub mod algorithm;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod table;
pub mod text;

// Re-export the most common types for easier use
// Core types
pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};

// Survey pipeline
pub use algorithm::{
    EncodingManifest, FeatureEncoder, FeatureMatrix, FittedModel, GroupSummarizer,
    HesitancyModel, OddsRatioRow, OverallStatistics,
};
pub use schema::{NormalizedTable, OutcomeProvenance, SchemaNormalizer};

// Sentiment pipeline
pub use text::{
    PeriodSummary, ScoredText, SentimentLabel, SentimentScorer, TemporalAggregator, TextRecord,
    normalize_text,
};

// Stage orchestration
pub use pipeline::{OutputPaths, RunSummary, StageOutcome, run_all};

// Arrow types
pub use arrow::record_batch::RecordBatch;
