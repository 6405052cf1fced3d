//! Social-post sentiment pipeline
//!
//! Raw posts are normalized, scored against a polarity lexicon, labelled with
//! fixed thresholds and aggregated by calendar month and by location.

pub mod aggregate;
pub mod corpus;
pub mod lexicon;
pub mod normalize;
pub mod sentiment;
pub mod timestamp;

pub use aggregate::{
    LabelDistribution, LocationSummary, PeriodSummary, TemporalAggregator, location_table,
    monthly_table,
};
pub use corpus::{ScoredText, TextRecord, records_from_batch, score_corpus, scored_text_table};
pub use lexicon::Lexicon;
pub use normalize::normalize_text;
pub use sentiment::{Sentiment, SentimentLabel, SentimentScorer, classify};
pub use timestamp::{Month, parse_timestamp};
