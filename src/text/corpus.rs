//! Social-post corpus loading and scoring

use arrow::array::UInt32Array;
use arrow::compute::take_record_batch;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use log::{info, warn};
use rayon::prelude::*;

use crate::error::{AnalysisError, Result};
use crate::table::columns::{float_array, int_array, string_column, text_array, with_column};
use crate::text::sentiment::{SentimentLabel, SentimentScorer};
use crate::text::timestamp::{Month, parse_timestamp};

/// Column holding the post text
pub const TEXT_COLUMN: &str = "text";
/// Optional post date column
pub const DATE_COLUMN: &str = "date";
/// Optional free-text location column
pub const LOCATION_COLUMN: &str = "user_location";

/// One raw post
#[derive(Debug, Clone, PartialEq)]
pub struct TextRecord {
    pub raw_text: String,
    /// Parsed post time; `None` when absent or unparseable
    pub timestamp: Option<NaiveDateTime>,
    pub location: Option<String>,
    /// Row index in the source table
    pub source_row: usize,
}

impl TextRecord {
    /// Record without timestamp or location
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            timestamp: None,
            location: None,
            source_row: 0,
        }
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// A post that survived normalization, with its score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredText {
    pub record: TextRecord,
    pub clean_text: String,
    /// Polarity in [-1, 1]
    pub polarity: f64,
    pub label: SentimentLabel,
    /// Post time, or processing time when the record had none
    pub timestamp: NaiveDateTime,
}

impl ScoredText {
    #[must_use]
    pub fn month(&self) -> Month {
        Month::of(&self.timestamp)
    }
}

/// Extract posts from a table with a `text` column and optional `date` and `user_location`
///
/// Null texts are skipped.
///
/// # Errors
/// `EmptyCorpus` when the table has no text column
pub fn records_from_batch(batch: &RecordBatch) -> Result<Vec<TextRecord>> {
    let texts = string_column(batch, TEXT_COLUMN)?.ok_or_else(|| {
        AnalysisError::EmptyCorpus(format!("input has no '{TEXT_COLUMN}' column"))
    })?;
    let dates = string_column(batch, DATE_COLUMN)?;
    let locations = string_column(batch, LOCATION_COLUMN)?;

    let mut unparsed = 0usize;
    let records: Vec<TextRecord> = texts
        .into_iter()
        .enumerate()
        .filter_map(|(row, text)| {
            let raw_text = text?;
            let timestamp = dates
                .as_ref()
                .and_then(|d| d[row].as_deref())
                .and_then(|value| {
                    let parsed = parse_timestamp(value);
                    if parsed.is_none() {
                        unparsed += 1;
                    }
                    parsed
                });
            let location = locations
                .as_ref()
                .and_then(|l| l[row].as_deref())
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string);
            Some(TextRecord {
                raw_text,
                timestamp,
                location,
                source_row: row,
            })
        })
        .collect();

    if dates.is_none() {
        warn!("No '{DATE_COLUMN}' column; all posts fall into the processing-time month");
    } else if unparsed > 0 {
        warn!("{unparsed} post dates could not be parsed; using processing time for them");
    }
    Ok(records)
}

/// Normalize and score every record, dropping those that normalize to empty text
///
/// # Errors
/// `EmptyCorpus` when no record survives normalization
pub fn score_corpus(
    records: &[TextRecord],
    scorer: &SentimentScorer,
    processing_time: NaiveDateTime,
) -> Result<Vec<ScoredText>> {
    let scored: Vec<ScoredText> = records
        .par_iter()
        .filter_map(|record| {
            let (clean_text, sentiment) = scorer.score_raw(&record.raw_text)?;
            Some(ScoredText {
                timestamp: record.timestamp.unwrap_or(processing_time),
                record: record.clone(),
                clean_text,
                polarity: sentiment.polarity,
                label: sentiment.label,
            })
        })
        .collect();

    let dropped = records.len() - scored.len();
    if dropped > 0 {
        warn!("Dropped {dropped} posts that were empty after normalization");
    }
    if scored.is_empty() {
        return Err(AnalysisError::EmptyCorpus(format!(
            "none of {} posts contain text after normalization",
            records.len()
        )));
    }
    info!("Scored {} posts", scored.len());
    Ok(scored)
}

/// Retained source rows with `clean_text`, `sentiment`, `label`, `month` and `year` appended
///
/// `scored` must come from records of `batch`.
pub fn scored_text_table(batch: &RecordBatch, scored: &[ScoredText]) -> Result<RecordBatch> {
    let indices = scored
        .iter()
        .map(|s| {
            u32::try_from(s.record.source_row)
                .map_err(|_| AnalysisError::Conversion("row index exceeds u32".to_string()))
        })
        .collect::<Result<Vec<u32>>>()?;
    let mut table = take_record_batch(batch, &UInt32Array::from(indices))?;

    let clean: Vec<Option<String>> = scored.iter().map(|s| Some(s.clean_text.clone())).collect();
    let labels: Vec<Option<String>> = scored
        .iter()
        .map(|s| Some(s.label.as_str().to_string()))
        .collect();
    let months: Vec<Option<String>> = scored.iter().map(|s| Some(s.month().to_string())).collect();

    table = with_column(&table, "clean_text", text_array(&clean))?;
    table = with_column(
        &table,
        "sentiment",
        float_array(scored.iter().map(|s| Some(s.polarity)).collect()),
    )?;
    table = with_column(&table, "label", text_array(&labels))?;
    table = with_column(&table, "month", text_array(&months))?;
    table = with_column(
        &table,
        "year",
        int_array(scored.iter().map(|s| Some(i64::from(s.month().year))).collect()),
    )?;
    Ok(table)
}

