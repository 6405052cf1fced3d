//! Monthly and per-location sentiment aggregation

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::algorithm::summary::{mean, round_to, sample_std};
use crate::config::DEFAULT_DECIMALS;
use crate::error::Result;
use crate::table::rows_to_batch;
use crate::text::corpus::ScoredText;
use crate::text::sentiment::SentimentLabel;
use crate::text::timestamp::Month;

/// Label counts of a bucket; all three labels are always present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelDistribution {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl LabelDistribution {
    /// Count one more post with `label`
    pub fn add(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Positive => self.positive += 1,
            SentimentLabel::Neutral => self.neutral += 1,
            SentimentLabel::Negative => self.negative += 1,
        }
    }

    /// Posts carrying `label`
    #[must_use]
    pub const fn get(&self, label: SentimentLabel) -> usize {
        match label {
            SentimentLabel::Positive => self.positive,
            SentimentLabel::Neutral => self.neutral,
            SentimentLabel::Negative => self.negative,
        }
    }

    /// Posts in the bucket
    #[must_use]
    pub const fn total(&self) -> usize {
        self.positive + self.neutral + self.negative
    }

    /// JSON object text, e.g. `{"positive":1,"neutral":0,"negative":2}`
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl FromIterator<SentimentLabel> for LabelDistribution {
    fn from_iter<I: IntoIterator<Item = SentimentLabel>>(iter: I) -> Self {
        let mut dist = Self::default();
        for label in iter {
            dist.add(label);
        }
        dist
    }
}

/// Sentiment statistics of one calendar month
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSummary {
    pub month: Month,
    pub sentiment_mean: f64,
    /// Undefined for a single-post month
    pub sentiment_std: Option<f64>,
    pub sentiment_count: usize,
    pub label_distribution: LabelDistribution,
}

/// Mean polarity of one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSummary {
    pub user_location: String,
    pub sentiment: f64,
    pub count: u64,
}

/// Output row of the monthly table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeriodRow {
    month: String,
    sentiment_mean: f64,
    sentiment_std: Option<f64>,
    sentiment_count: u64,
    label_distribution: String,
}

/// Buckets scored posts by month and by location
#[derive(Debug, Clone, Copy)]
pub struct TemporalAggregator {
    decimals: u32,
}

impl Default for TemporalAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMALS)
    }
}

impl TemporalAggregator {
    #[must_use]
    pub const fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    /// One summary per calendar month present, in chronological order
    #[must_use]
    pub fn monthly(&self, scored: &[ScoredText]) -> Vec<PeriodSummary> {
        let mut buckets: BTreeMap<Month, Vec<&ScoredText>> = BTreeMap::new();
        for text in scored {
            buckets.entry(text.month()).or_default().push(text);
        }

        let decimals = self.decimals;
        let summaries: Vec<PeriodSummary> = buckets
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(month, texts)| {
                let polarities: Vec<f64> = texts.iter().map(|t| t.polarity).collect();
                PeriodSummary {
                    month,
                    sentiment_mean: mean(&polarities).map_or(0.0, |m| round_to(m, decimals)),
                    sentiment_std: sample_std(&polarities).map(|s| round_to(s, decimals)),
                    sentiment_count: polarities.len(),
                    label_distribution: texts.iter().map(|t| t.label).collect(),
                }
            })
            .collect();

        info!("Aggregated {} posts into {} months", scored.len(), summaries.len());
        summaries
    }

    /// Mean polarity per location, sorted by location; posts without one are skipped
    #[must_use]
    pub fn by_location(&self, scored: &[ScoredText]) -> Vec<LocationSummary> {
        let mut buckets: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for text in scored {
            if let Some(location) = text.record.location.as_deref() {
                buckets.entry(location).or_default().push(text.polarity);
            }
        }

        let decimals = self.decimals;
        buckets
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(location, values)| LocationSummary {
                user_location: location.to_string(),
                sentiment: mean(&values).map_or(0.0, |m| round_to(m, decimals)),
                count: values.len() as u64,
            })
            .collect()
    }
}

/// Monthly table with `label_distribution` as JSON text
pub fn monthly_table(summaries: &[PeriodSummary]) -> Result<RecordBatch> {
    let rows = summaries
        .iter()
        .map(|s| {
            Ok(PeriodRow {
                month: s.month.to_string(),
                sentiment_mean: s.sentiment_mean,
                sentiment_std: s.sentiment_std,
                sentiment_count: s.sentiment_count as u64,
                label_distribution: s.label_distribution.to_json()?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    rows_to_batch(&rows)
}

/// Per-location table
pub fn location_table(summaries: &[LocationSummary]) -> Result<RecordBatch> {
    rows_to_batch(summaries)
}
