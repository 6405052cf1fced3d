//! Error handling for the hesitancy analysis stages.
//!
//! Every failure a stage can report maps to one variant here. The pipeline
//! treats each of them as local to the stage that raised it: the stage is
//! skipped, the diagnostic and its remedy are logged, and sibling stages run.

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;

/// Specialized error type for the analysis stages
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The outcome column is missing and no rule could derive it
    #[error("Schema error: {0}")]
    Schema(String),

    /// None of the candidate feature columns exist in the table
    #[error("No candidate feature found in table (looked for: {})", .candidates.join(", "))]
    InsufficientFeatures {
        /// Candidate names that were searched for
        candidates: Vec<String>,
    },

    /// Too few complete rows survive encoding to fit a model
    #[error("Insufficient data: {rows} valid rows after encoding, at least {required} required")]
    InsufficientData {
        /// Rows remaining after listwise deletion
        rows: usize,
        /// Configured minimum
        required: usize,
    },

    /// The optimizer failed: separation, non-convergence or a singular design
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// No text survived normalization
    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    /// An expected input file or directory does not exist
    #[error("Missing input: {}", .0.display())]
    MissingInput(PathBuf),

    /// Error opening, reading or writing a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Error processing Arrow data
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error processing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error writing JSON sidecars
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error converting between rows and Arrow tables
    #[error("Conversion error: {0}")]
    Conversion(String),
}

impl AnalysisError {
    /// Name of the stage whose precondition failed
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Schema(_) => "cleaning",
            Self::InsufficientFeatures { .. } | Self::InsufficientData { .. } => "feature encoding",
            Self::ModelFit(_) => "model fitting",
            Self::EmptyCorpus(_) => "sentiment scoring",
            Self::MissingInput(_) => "input loading",
            Self::Io(_)
            | Self::Arrow(_)
            | Self::Parquet(_)
            | Self::Json(_)
            | Self::Conversion(_) => "table I/O",
        }
    }

    /// Actionable hint naming the upstream step to (re)run
    #[must_use]
    pub const fn remedy(&self) -> &'static str {
        match self {
            Self::Schema(_) => {
                "provide a vaccine_hesitant, vaccine_attitude or vaccination_status column and re-run the cleaning stage"
            }
            Self::InsufficientFeatures { .. } => {
                "re-run the cleaning stage on survey files carrying demographic columns (gender, education, age, religion, wealth_index)"
            }
            Self::InsufficientData { .. } => {
                "add survey rows or fix missing values upstream, then re-run the cleaning stage"
            }
            Self::ModelFit(_) => {
                "drop collinear or perfectly separating features from the candidate list and re-run the factor analysis"
            }
            Self::EmptyCorpus(_) => {
                "place post exports with a non-empty text column in the twitter data directory and re-run the sentiment stage"
            }
            Self::MissingInput(_) => "run the data extraction step, then the cleaning stage",
            Self::Io(_)
            | Self::Arrow(_)
            | Self::Parquet(_)
            | Self::Json(_)
            | Self::Conversion(_) => "check that input files are readable delimited or Parquet tables",
        }
    }
}

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, AnalysisError>;
