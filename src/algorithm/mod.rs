//! Analysis algorithms for the survey pipeline
//!
//! Feature encoding, the logistic hesitancy model, grouped summaries
//! and the model-fit report.

pub mod encoding;
pub mod logistic;
pub mod report;
pub mod summary;

pub use encoding::{
    EncodedData, EncodingManifest, FeatureEncoder, FeatureKind, FeatureMatrix, INTERCEPT_COLUMN,
};
pub use logistic::{FeatureImportanceRow, FittedModel, HesitancyModel, OddsRatioRow};
pub use report::ModelFitReport;
pub use summary::{GroupSummarizer, GroupSummary, OverallStatistics};
