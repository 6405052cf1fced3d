//! Grouped descriptive statistics of the outcome
//!
//! This module provides count/mean/std of a numeric outcome over one or more
//! categorical partitions, plus the overall hesitancy figures written next to
//! the model report.

use std::collections::BTreeMap;
use std::fmt;

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use log::{info, warn};
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::config::{DEFAULT_DECIMALS, OUTCOME_COLUMN};
use crate::error::{AnalysisError, Result};
use crate::table::columns::{float_array, float_values, int_array, string_values, text_array};

/// Key of one group, one value per grouping column
pub type GroupKey = SmallVec<[String; 3]>;

/// Round half away from zero to `decimals` places
#[must_use]
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10_f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Arithmetic mean; `None` for an empty slice
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1); `None` below two values
#[must_use]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Statistics of one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRow {
    /// Grouping values in grouping-column order
    pub key: GroupKey,
    /// Rows with a non-null outcome
    pub count: usize,
    /// Mean outcome
    pub mean: f64,
    /// Sample standard deviation; undefined for a single row
    pub std: Option<f64>,
}

/// Result of a grouped summary, rows in ascending key order
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSummary {
    /// Grouping columns
    pub group_columns: Vec<String>,
    /// One row per group
    pub rows: Vec<GroupRow>,
}

impl GroupSummary {
    /// Row for a key given as plain strings
    #[must_use]
    pub fn get(&self, key: &[&str]) -> Option<&GroupRow> {
        self.rows
            .iter()
            .find(|row| row.key.iter().map(String::as_str).eq(key.iter().copied()))
    }

    /// Arrow table with one column per grouping column followed by `count`, `mean`, `std`
    pub fn to_batch(&self) -> Result<RecordBatch> {
        let mut columns: Vec<(String, ArrayRef)> = self
            .group_columns
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let values: Vec<Option<String>> =
                    self.rows.iter().map(|r| Some(r.key[i].clone())).collect();
                (name.clone(), text_array(&values))
            })
            .collect();
        columns.push((
            "count".to_string(),
            int_array(self.rows.iter().map(|r| Some(r.count as i64)).collect()),
        ));
        columns.push((
            "mean".to_string(),
            float_array(self.rows.iter().map(|r| Some(r.mean)).collect()),
        ));
        columns.push((
            "std".to_string(),
            float_array(self.rows.iter().map(|r| r.std).collect()),
        ));
        Ok(RecordBatch::try_from_iter(columns)?)
    }
}

/// Computes count/mean/std of an outcome per group
#[derive(Debug, Clone, Copy)]
pub struct GroupSummarizer {
    decimals: u32,
}

impl Default for GroupSummarizer {
    fn default() -> Self {
        Self::new(DEFAULT_DECIMALS)
    }
}

impl GroupSummarizer {
    #[must_use]
    pub const fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    /// Summarize `outcome` over every combination of `group_by` values
    ///
    /// Rows with a null outcome or a null grouping value are left out.
    ///
    /// # Errors
    /// `Schema` when the outcome or a grouping column is absent
    pub fn summarize(
        &self,
        batch: &RecordBatch,
        outcome: &str,
        group_by: &[&str],
    ) -> Result<GroupSummary> {
        let missing = |name: &str| AnalysisError::Schema(format!("column '{name}' not found"));

        let outcome_values = float_values(
            batch
                .column_by_name(outcome)
                .ok_or_else(|| missing(outcome))?,
        )?;
        let keys = group_by
            .iter()
            .map(|name| {
                batch
                    .column_by_name(name)
                    .ok_or_else(|| missing(name))
                    .and_then(string_values)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
        let mut skipped = 0usize;
        for (row, value) in outcome_values.iter().enumerate() {
            let key: Option<GroupKey> = keys.iter().map(|column| column[row].clone()).collect();
            match (key, value) {
                (Some(key), Some(v)) if v.is_finite() => groups.entry(key).or_default().push(*v),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(
                "Skipped {skipped} rows with a null outcome or grouping value when summarizing by [{}]",
                group_by.join(", ")
            );
        }

        let decimals = self.decimals;
        let rows: Vec<GroupRow> = groups
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|(key, values)| GroupRow {
                count: values.len(),
                mean: mean(&values).map_or(f64::NAN, |m| round_to(m, decimals)),
                std: sample_std(&values).map(|s| round_to(s, decimals)),
                key,
            })
            .collect();

        info!(
            "Summarized '{outcome}' by [{}]: {} groups",
            group_by.join(", "),
            rows.len()
        );
        Ok(GroupSummary {
            group_columns: group_by.iter().map(|s| (*s).to_string()).collect(),
            rows,
        })
    }
}

/// Headline figures for the whole cleaned table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverallStatistics {
    /// Rows in the cleaned table
    pub total_respondents: usize,
    /// Fraction of hesitant respondents
    pub hesitancy_rate: f64,
    /// `1 - hesitancy_rate`
    pub vaccination_rate: f64,
}

impl OverallStatistics {
    /// Compute from a cleaned table
    ///
    /// # Errors
    /// `Schema` when the outcome column is absent
    pub fn from_batch(batch: &RecordBatch) -> Result<Self> {
        let values = float_values(batch.column_by_name(OUTCOME_COLUMN).ok_or_else(|| {
            AnalysisError::Schema(format!("outcome column '{OUTCOME_COLUMN}' not found"))
        })?)?;
        let observed: Vec<f64> = values.into_iter().flatten().collect();
        let hesitancy_rate = mean(&observed).unwrap_or(f64::NAN);
        Ok(Self {
            total_respondents: batch.num_rows(),
            hesitancy_rate,
            vaccination_rate: 1.0 - hesitancy_rate,
        })
    }
}

impl fmt::Display for OverallStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "VACCINE HESITANCY SUMMARY STATISTICS")?;
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f)?;
        writeln!(f, "total_respondents: {}", self.total_respondents)?;
        writeln!(f, "hesitancy_rate: {}", self.hesitancy_rate)?;
        writeln!(f, "vaccination_rate: {}", self.vaccination_rate)
    }
}
