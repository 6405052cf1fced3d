//! Harmonization of heterogeneous survey extracts into one canonical table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray};
use arrow::compute::filter_record_batch;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::{info, warn};

use crate::config::{OUTCOME_COLUMN, SchemaConfig};
use crate::error::{AnalysisError, Result};
use crate::schema::rules::{
    ColumnRule, Derivation, HEURISTIC_INDICATORS, OutcomeProvenance, default_rules,
};
use crate::table::columns::{
    concat_tables, float_values, int_array, is_numeric, is_text, rename_column, string_column,
    string_values, text_array, with_column, with_metadata,
};

/// Derived ordinal education column
pub const EDUCATION_LEVEL_COLUMN: &str = "education_level";
/// Derived rural indicator column
pub const RURAL_COLUMN: &str = "rural";

/// Ordinal codes for the education categories
pub const EDUCATION_LEVELS: [(&str, i64); 4] = [
    ("no education", 0),
    ("primary", 1),
    ("secondary", 2),
    ("higher", 3),
];
/// Code assigned to unmapped or missing education values
pub const DEFAULT_EDUCATION_LEVEL: i64 = 1;

/// Normalize a raw column name: trimmed, lower-case, spaces and hyphens to underscores
#[must_use]
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace([' ', '-'], "_")
}

/// Result of schema normalization
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    /// Canonical table; schema metadata carries the outcome provenance
    pub batch: RecordBatch,
    /// Where the outcome column came from
    pub provenance: OutcomeProvenance,
    /// Rows across all inputs before outcome coercion
    pub input_rows: usize,
    /// Rows dropped because the outcome could not be coerced to 0/1
    pub dropped_rows: usize,
    /// Required columns that were filled with the unknown sentinel
    pub defaulted_columns: Vec<String>,
}

impl NormalizedTable {
    /// Fraction of retained rows with outcome 1
    #[must_use]
    pub fn hesitancy_rate(&self) -> f64 {
        outcome_rate(&self.batch).unwrap_or(f64::NAN)
    }
}

/// Mean of the outcome column, ignoring nulls
#[must_use]
pub fn outcome_rate(batch: &RecordBatch) -> Option<f64> {
    let values = batch
        .column_by_name(OUTCOME_COLUMN)
        .and_then(|c| float_values(c).ok())?;
    let observed: Vec<f64> = values.into_iter().flatten().collect();
    if observed.is_empty() {
        None
    } else {
        Some(observed.iter().sum::<f64>() / observed.len() as f64)
    }
}

/// Read the outcome provenance back from a table's schema metadata
#[must_use]
pub fn provenance_of(batch: &RecordBatch) -> Option<OutcomeProvenance> {
    batch
        .schema()
        .metadata()
        .get(OutcomeProvenance::METADATA_KEY)
        .and_then(|v| OutcomeProvenance::parse(v))
}

/// Harmonizes raw tables into the canonical survey schema
#[derive(Debug, Clone)]
pub struct SchemaNormalizer {
    rules: Vec<ColumnRule>,
    config: SchemaConfig,
}

impl Default for SchemaNormalizer {
    fn default() -> Self {
        Self::new(SchemaConfig::default())
    }
}

impl SchemaNormalizer {
    /// Create a normalizer with the standard rule list
    #[must_use]
    pub fn new(config: SchemaConfig) -> Self {
        Self {
            rules: default_rules(),
            config,
        }
    }

    /// Replace the rule list
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<ColumnRule>) -> Self {
        self.rules = rules;
        self
    }

    /// Normalize one or more raw tables into a single canonical table
    ///
    /// # Errors
    /// `Schema` when no tables are given or the outcome cannot be derived
    pub fn normalize(&self, tables: &[RecordBatch]) -> Result<NormalizedTable> {
        if tables.is_empty() {
            return Err(AnalysisError::Schema("no input tables to normalize".to_string()));
        }

        let renamed = tables
            .iter()
            .map(normalize_column_names)
            .collect::<Result<Vec<_>>>()?;
        let mut batch = concat_tables(&renamed)?;
        let input_rows = batch.num_rows();
        info!(
            "Combined dataset shape: ({}, {})",
            batch.num_rows(),
            batch.num_columns()
        );

        let mut provenance = has_column(&batch, OUTCOME_COLUMN).then_some(OutcomeProvenance::Observed);
        let mut defaulted_columns = Vec::new();

        for rule in &self.rules {
            if has_column(&batch, rule.canonical()) {
                continue;
            }
            match rule {
                ColumnRule::Alias { alias, canonical } => {
                    if has_column(&batch, alias) {
                        info!("Mapping column '{alias}' to '{canonical}'");
                        batch = rename_column(&batch, alias, canonical)?;
                        if *canonical == OUTCOME_COLUMN {
                            provenance = Some(OutcomeProvenance::Observed);
                        }
                    }
                }
                ColumnRule::Derive {
                    canonical,
                    derivation,
                } => {
                    if let Some((array, derived)) = self.derive(&batch, derivation)? {
                        batch = with_column(&batch, canonical, array)?;
                        if *canonical == OUTCOME_COLUMN {
                            provenance = Some(derived);
                        }
                    }
                }
                ColumnRule::DefaultText { canonical } => {
                    warn!(
                        "Missing column: {canonical}. Filling with '{}'",
                        self.config.unknown_sentinel
                    );
                    let values = vec![Some(self.config.unknown_sentinel.clone()); batch.num_rows()];
                    batch = with_column(&batch, canonical, text_array(&values))?;
                    defaulted_columns.push((*canonical).to_string());
                }
            }
        }

        let Some(provenance) = provenance else {
            return Err(AnalysisError::Schema(format!(
                "outcome column '{OUTCOME_COLUMN}' is missing and cannot be derived from the available columns"
            )));
        };

        let (batch, dropped_rows) = coerce_outcome(&batch)?;
        let batch = add_derived_columns(&batch)?;

        let mut metadata = batch.schema().metadata().clone();
        metadata.insert(
            OutcomeProvenance::METADATA_KEY.to_string(),
            provenance.as_str().to_string(),
        );
        let batch = with_metadata(&batch, metadata)?;

        let table = NormalizedTable {
            batch,
            provenance,
            input_rows,
            dropped_rows,
            defaulted_columns,
        };
        info!(
            "Cleaned dataset shape: ({}, {})",
            table.batch.num_rows(),
            table.batch.num_columns()
        );
        info!(
            "Vaccine hesitancy rate: {:.2}%",
            table.hesitancy_rate() * 100.0
        );
        Ok(table)
    }

    fn derive(
        &self,
        batch: &RecordBatch,
        derivation: &Derivation,
    ) -> Result<Option<(ArrayRef, OutcomeProvenance)>> {
        match derivation {
            Derivation::InvertBinary { source } => {
                let Some(column) = batch.column_by_name(source) else {
                    return Ok(None);
                };
                info!("Creating {OUTCOME_COLUMN} as the inverse of {source}");
                let inverted = coerce_binary(column)?
                    .into_iter()
                    .map(|v| v.map(|b| 1 - b))
                    .collect();
                Ok(Some((
                    int_array(inverted),
                    OutcomeProvenance::InvertedVaccinationStatus,
                )))
            }
            Derivation::DemographicHeuristic => {
                if !self.config.allow_heuristic_outcome {
                    warn!("Heuristic outcome derivation is disabled; not synthesizing {OUTCOME_COLUMN}");
                    return Ok(None);
                }
                let sources = HEURISTIC_INDICATORS
                    .iter()
                    .filter_map(|(column, trigger)| {
                        string_column(batch, column)
                            .transpose()
                            .map(|values| values.map(|v| (v, *trigger)))
                    })
                    .collect::<Result<Vec<_>>>()?;
                if sources.is_empty() {
                    return Ok(None);
                }
                warn!(
                    "No observed outcome: deriving a PLACEHOLDER {OUTCOME_COLUMN} from demographic indicators. \
                     Model results on this table do not describe real hesitancy"
                );
                let values = (0..batch.num_rows())
                    .map(|row| {
                        let flagged = sources.iter().any(|(values, trigger)| {
                            values[row]
                                .as_deref()
                                .is_some_and(|v| v.trim().eq_ignore_ascii_case(trigger))
                        });
                        Some(i64::from(flagged))
                    })
                    .collect();
                Ok(Some((int_array(values), OutcomeProvenance::Heuristic)))
            }
        }
    }
}

fn has_column(batch: &RecordBatch, name: &str) -> bool {
    batch.schema().index_of(name).is_ok()
}

/// Rename every column to its normalized form, keeping the first of any duplicates
fn normalize_column_names(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut seen = HashSet::new();
    let mut fields: Vec<Field> = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        let name = normalize_column_name(field.name());
        if !seen.insert(name.clone()) {
            warn!(
                "Column '{}' duplicates '{name}' after normalization; keeping the first",
                field.name()
            );
            continue;
        }
        fields.push(field.as_ref().clone().with_name(name));
        columns.push(Arc::clone(column));
    }

    let schema = Schema::new_with_metadata(fields, HashMap::new());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Coerce a column to 0/1; anything else becomes null
pub fn coerce_binary(array: &ArrayRef) -> Result<Vec<Option<i64>>> {
    let data_type = array.data_type();
    if *data_type == DataType::Boolean {
        let bools = array
            .as_any()
            .downcast_ref::<BooleanArray>()
            .ok_or_else(|| AnalysisError::Conversion("boolean column did not downcast".into()))?;
        return Ok(bools.iter().map(|v| v.map(i64::from)).collect());
    }

    if is_numeric(data_type) {
        return Ok(float_values(array)?.into_iter().map(|v| v.and_then(binary_from_float)).collect());
    }

    if is_text(data_type) {
        return Ok(string_values(array)?
            .into_iter()
            .map(|v| v.and_then(|s| binary_from_text(&s)))
            .collect());
    }

    Ok(vec![None; array.len()])
}

fn binary_from_float(value: f64) -> Option<i64> {
    if value == 0.0 {
        Some(0)
    } else if value == 1.0 {
        Some(1)
    } else {
        None
    }
}

fn binary_from_text(value: &str) -> Option<i64> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(1),
        "0" | "false" | "no" => Some(0),
        other => other.parse::<f64>().ok().and_then(binary_from_float),
    }
}

/// Coerce the outcome to 0/1 integers and drop rows that fail
fn coerce_outcome(batch: &RecordBatch) -> Result<(RecordBatch, usize)> {
    let column = batch
        .column_by_name(OUTCOME_COLUMN)
        .ok_or_else(|| AnalysisError::Schema(format!("outcome column '{OUTCOME_COLUMN}' missing")))?;
    let values = coerce_binary(column)?;
    let keep: BooleanArray = values.iter().map(|v| Some(v.is_some())).collect();
    let dropped = values.iter().filter(|v| v.is_none()).count();
    if dropped > 0 {
        warn!("Dropping {dropped} rows whose {OUTCOME_COLUMN} is missing or not coercible to 0/1");
    }

    let batch = with_column(batch, OUTCOME_COLUMN, int_array(values))?;
    Ok((filter_record_batch(&batch, &keep)?, dropped))
}

/// Education code for a raw category
#[must_use]
pub fn education_level(value: Option<&str>) -> i64 {
    value
        .map(str::trim)
        .and_then(|v| {
            EDUCATION_LEVELS
                .iter()
                .find(|(name, _)| v.eq_ignore_ascii_case(name))
                .map(|(_, level)| *level)
        })
        .unwrap_or(DEFAULT_EDUCATION_LEVEL)
}

fn add_derived_columns(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut batch = batch.clone();

    if !has_column(&batch, EDUCATION_LEVEL_COLUMN) {
        let education = string_column(&batch, "education")?.unwrap_or_default();
        let levels = (0..batch.num_rows())
            .map(|row| {
                Some(education_level(
                    education.get(row).and_then(|v| v.as_deref()),
                ))
            })
            .collect();
        batch = with_column(&batch, EDUCATION_LEVEL_COLUMN, int_array(levels))?;
    }

    if !has_column(&batch, RURAL_COLUMN) {
        let rural_urban = string_column(&batch, "rural_urban")?;
        let rural = (0..batch.num_rows())
            .map(|row| {
                let is_rural = rural_urban
                    .as_ref()
                    .and_then(|values| values[row].as_deref())
                    .is_some_and(|v| v.trim().eq_ignore_ascii_case("rural"));
                Some(i64::from(is_rural))
            })
            .collect();
        batch = with_column(&batch, RURAL_COLUMN, int_array(rural))?;
    }

    Ok(batch)
}
