//! Configuration for the analysis stages.
//!
//! The thresholds that drive classification, significance and data sufficiency
//! are named constants here and injected into each component through its
//! config section, so a caller (or a test) can override any of them.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::Result;

/// Polarity cut-off: strictly above is positive, strictly below the negation is negative
pub const DEFAULT_SENTIMENT_THRESHOLD: f64 = 0.1;
/// Significance level for reporting a factor
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;
/// Minimum number of complete rows required to fit the model
pub const DEFAULT_MIN_ROWS: usize = 50;
/// Numeric columns with fewer distinct values than this are treated as categorical
pub const DEFAULT_MAX_CATEGORICAL_LEVELS: usize = 20;
/// Decimal places used for summary tables
pub const DEFAULT_DECIMALS: u32 = 3;
/// Standard normal quantile for 95% Wald intervals
pub const WALD_Z: f64 = 1.96;
/// Newton iterations before declaring non-convergence
pub const DEFAULT_MAX_ITERATIONS: usize = 35;
/// Convergence tolerance on the largest absolute parameter change
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Canonical name of the binary outcome column
pub const OUTCOME_COLUMN: &str = "vaccine_hesitant";

/// Schema normalization options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Permit the demographic placeholder outcome when no observed outcome exists
    pub allow_heuristic_outcome: bool,
    /// Sentinel used for missing required demographic columns
    pub unknown_sentinel: String,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            allow_heuristic_outcome: true,
            unknown_sentinel: "Unknown".to_string(),
        }
    }
}

/// Feature encoding options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Candidate features in priority order; each may name fallbacks
    pub candidates: Vec<FeatureCandidate>,
    /// Distinct-value cut-off below which numeric columns are one-hot encoded
    pub max_categorical_levels: usize,
    /// Minimum complete rows after listwise deletion
    pub min_rows: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            candidates: vec![
                FeatureCandidate::new("gender"),
                FeatureCandidate::new("education_level").or("education"),
                FeatureCandidate::new("rural"),
                FeatureCandidate::new("age"),
                FeatureCandidate::new("religion"),
                FeatureCandidate::new("wealth_index"),
            ],
            max_categorical_levels: DEFAULT_MAX_CATEGORICAL_LEVELS,
            min_rows: DEFAULT_MIN_ROWS,
        }
    }
}

impl EncoderConfig {
    /// Replace the candidate list with plain column names (no fallbacks)
    #[must_use]
    pub fn with_candidates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = names.into_iter().map(FeatureCandidate::new).collect();
        self
    }

    /// Set minimum complete rows
    #[must_use]
    pub const fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows;
        self
    }
}

/// A feature the encoder will look for, with ordered fallbacks
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeatureCandidate {
    /// Preferred column name
    pub name: String,
    /// Columns tried in order when the preferred one is absent
    #[serde(default)]
    pub fallbacks: Vec<String>,
}

impl FeatureCandidate {
    /// Candidate without fallbacks
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fallbacks: Vec::new(),
        }
    }

    /// Add a fallback column
    #[must_use]
    pub fn or(mut self, fallback: impl Into<String>) -> Self {
        self.fallbacks.push(fallback.into());
        self
    }

    /// All names in resolution order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

/// Logistic regression options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Newton iterations before giving up
    pub max_iterations: usize,
    /// Convergence tolerance on parameter change
    pub tolerance: f64,
    /// Significance level for factor reporting
    pub significance_level: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
        }
    }
}

/// Sentiment classification options
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    /// Polarity strictly above this is positive
    pub positive_threshold: f64,
    /// Polarity strictly below this is negative
    pub negative_threshold: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            positive_threshold: DEFAULT_SENTIMENT_THRESHOLD,
            negative_threshold: -DEFAULT_SENTIMENT_THRESHOLD,
        }
    }
}

/// Grouped summary options
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Decimal places in summary tables
    pub decimals: u32,
    /// Grouping dimensions written as separate tables
    pub dimensions: Vec<String>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
            dimensions: vec![
                "state".to_string(),
                "education".to_string(),
                "gender".to_string(),
            ],
        }
    }
}

/// Configuration for a full analysis run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Schema normalization
    pub schema: SchemaConfig,
    /// Feature encoding
    pub encoder: EncoderConfig,
    /// Model fitting
    pub model: ModelConfig,
    /// Sentiment classification
    pub sentiment: SentimentConfig,
    /// Grouped summaries
    pub summary: SummaryConfig,
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file; absent keys keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl fmt::Display for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analysis Configuration:")?;
        writeln!(
            f,
            "  Heuristic Outcome Allowed: {}",
            self.schema.allow_heuristic_outcome
        )?;
        let candidates: Vec<String> = self
            .encoder
            .candidates
            .iter()
            .map(|c| c.names().collect::<Vec<_>>().join("|"))
            .collect();
        writeln!(f, "  Candidate Features: {}", candidates.join(", "))?;
        writeln!(
            f,
            "  Categorical Level Cut-off: {}",
            self.encoder.max_categorical_levels
        )?;
        writeln!(f, "  Minimum Rows: {}", self.encoder.min_rows)?;
        writeln!(
            f,
            "  Solver: {} iterations, tolerance {:e}",
            self.model.max_iterations, self.model.tolerance
        )?;
        writeln!(f, "  Significance Level: {}", self.model.significance_level)?;
        writeln!(
            f,
            "  Sentiment Thresholds: > {} positive, < {} negative",
            self.sentiment.positive_threshold, self.sentiment.negative_threshold
        )?;
        writeln!(f, "  Summary Dimensions: {}", self.summary.dimensions.join(", "))?;
        writeln!(f, "  Summary Decimals: {}", self.summary.decimals)?;
        Ok(())
    }
}
