//! Feature encoding for the hesitancy model
//!
//! Turns a canonical survey table into a dense design matrix: low-cardinality
//! and text columns are one-hot expanded with the first level dropped as the
//! reference, other numeric columns pass through, and a constant intercept
//! column is appended. Rows with any missing value are excluded.

use std::collections::BTreeSet;

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::config::EncoderConfig;
use crate::error::{AnalysisError, Result};
use crate::table::columns::{float_values, is_text, string_values};

/// Name of the intercept column
pub const INTERCEPT_COLUMN: &str = "const";

/// Label used for a numeric category level
#[must_use]
pub fn format_level(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// How a source column is encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    /// Passed through as a float
    Numeric,
    /// One-hot expanded; `levels[0]` is the dropped reference level
    Categorical {
        /// Sorted level labels
        levels: Vec<String>,
    },
}

/// One encoded source column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedFeature {
    /// Candidate the column was chosen for
    pub candidate: String,
    /// Column actually read
    pub source: String,
    /// Encoding
    #[serde(flatten)]
    pub kind: FeatureKind,
}

impl EncodedFeature {
    /// Matrix columns this feature produces
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        match &self.kind {
            FeatureKind::Numeric => vec![self.source.clone()],
            FeatureKind::Categorical { levels } => levels
                .iter()
                .skip(1)
                .map(|level| format!("{}_{level}", self.source))
                .collect(),
        }
    }
}

/// The fixed encoding schema learned at fit time
///
/// Re-encoding any later table against the same manifest yields exactly the
/// same column set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingManifest {
    /// Encoded features in candidate order
    pub features: Vec<EncodedFeature>,
}

impl EncodingManifest {
    /// Names of all matrix columns, intercept last
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.features
            .iter()
            .flat_map(EncodedFeature::output_columns)
            .chain(std::iter::once(INTERCEPT_COLUMN.to_string()))
            .collect()
    }

    /// Source columns read by this manifest
    #[must_use]
    pub fn source_columns(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.source.as_str()).collect()
    }
}

/// Dense design matrix with named columns
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Column names, intercept last
    pub columns: Vec<String>,
    /// Row-major values, one row per retained record
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    /// Number of rows
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns including the intercept
    #[must_use]
    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Position of a named column
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// View of a named column
    #[must_use]
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name)
            .map(|idx| self.values.column(idx))
    }
}

/// Encoded design matrix plus the aligned outcome
#[derive(Debug, Clone)]
pub struct EncodedData {
    /// Design matrix
    pub matrix: FeatureMatrix,
    /// Outcome aligned with the matrix rows
    pub outcome: Array1<f64>,
    /// Encoding schema used
    pub manifest: EncodingManifest,
    /// Index of each retained row in the source table
    pub source_rows: Vec<usize>,
    /// Rows excluded by listwise deletion
    pub excluded_rows: usize,
}

/// Column values prepared for row-wise encoding
enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Levels {
        labels: Vec<Option<String>>,
        index: FxHashMap<String, usize>,
        width: usize,
    },
}

impl ColumnData {
    fn width(&self) -> usize {
        match self {
            Self::Numeric(_) => 1,
            Self::Levels { width, .. } => *width,
        }
    }

    /// Write this column's cells for `row`; `false` when the value is missing
    fn write_row(&self, row: usize, out: &mut Vec<f64>) -> bool {
        match self {
            Self::Numeric(values) => match values[row] {
                Some(v) if v.is_finite() => {
                    out.push(v);
                    true
                }
                _ => false,
            },
            Self::Levels {
                labels,
                index,
                width,
            } => {
                let Some(level) = labels[row].as_ref().and_then(|l| index.get(l)) else {
                    return false;
                };
                out.extend((1..=*width).map(|j| if j == *level { 1.0 } else { 0.0 }));
                true
            }
        }
    }
}

/// Level labels for a column: text as-is, numbers through `format_level`
fn level_labels(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    if is_text(array.data_type()) {
        string_values(array)
    } else {
        Ok(float_values(array)?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()).map(format_level))
            .collect())
    }
}

/// Derives design matrices from canonical survey tables
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    config: EncoderConfig,
}

impl FeatureEncoder {
    /// Create an encoder
    #[must_use]
    pub const fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Pick the first present column for every candidate
    fn resolve(&self, batch: &RecordBatch) -> Vec<(String, String)> {
        self.config
            .candidates
            .iter()
            .filter_map(|candidate| {
                candidate
                    .names()
                    .find(|name| batch.column_by_name(name).is_some())
                    .map(|name| (candidate.name.clone(), name.to_string()))
            })
            .collect()
    }

    fn no_features(&self) -> AnalysisError {
        AnalysisError::InsufficientFeatures {
            candidates: self
                .config
                .candidates
                .iter()
                .flat_map(|c| c.names().map(str::to_string).collect::<Vec<_>>())
                .collect(),
        }
    }

    /// Learn the encoding schema from a table
    ///
    /// # Errors
    /// `InsufficientFeatures` when no candidate column is present
    pub fn learn_manifest(&self, batch: &RecordBatch) -> Result<EncodingManifest> {
        let resolved = self.resolve(batch);
        if resolved.is_empty() {
            return Err(self.no_features());
        }

        let mut features = Vec::with_capacity(resolved.len());
        for (candidate, source) in resolved {
            let Some(array) = batch.column_by_name(&source) else {
                continue;
            };

            let kind = if is_text(array.data_type()) {
                let levels: BTreeSet<String> = string_values(array)?.into_iter().flatten().collect();
                FeatureKind::Categorical {
                    levels: levels.into_iter().collect(),
                }
            } else {
                let mut values: Vec<f64> = float_values(array)?
                    .into_iter()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .collect();
                if values.is_empty() {
                    warn!("Feature '{source}' has no numeric values; skipping it");
                    continue;
                }
                values.sort_by(f64::total_cmp);
                values.dedup();
                if values.len() < self.config.max_categorical_levels {
                    FeatureKind::Categorical {
                        levels: values.into_iter().map(format_level).collect(),
                    }
                } else {
                    FeatureKind::Numeric
                }
            };

            if let FeatureKind::Categorical { levels } = &kind {
                if levels.is_empty() {
                    warn!("Feature '{source}' has no values; skipping it");
                    continue;
                }
                if levels.len() < 2 {
                    warn!("Feature '{source}' has a single level; it contributes no columns");
                }
            }
            debug!("Encoding '{source}' as {kind:?}");
            features.push(EncodedFeature {
                candidate,
                source,
                kind,
            });
        }

        if features.is_empty() {
            return Err(self.no_features());
        }
        Ok(EncodingManifest { features })
    }

    /// Encode a table against a manifest, excluding incomplete rows
    ///
    /// # Errors
    /// `InsufficientFeatures` when a manifest source column is absent
    pub fn transform(
        &self,
        batch: &RecordBatch,
        manifest: &EncodingManifest,
    ) -> Result<(FeatureMatrix, Vec<usize>)> {
        self.encode(batch, manifest, None)
            .map(|(matrix, _, rows)| (matrix, rows))
    }

    /// Learn a manifest and encode the table with its outcome
    ///
    /// # Errors
    /// `InsufficientFeatures` when no candidate is present, `InsufficientData`
    /// when fewer than the configured minimum rows survive, `Schema` when the
    /// outcome column is missing
    pub fn fit(&self, batch: &RecordBatch, outcome_column: &str) -> Result<EncodedData> {
        let manifest = self.learn_manifest(batch)?;
        info!(
            "Analyzing factors: [{}]",
            manifest.source_columns().iter().join(", ")
        );

        let outcome = batch
            .column_by_name(outcome_column)
            .map(float_values)
            .transpose()?
            .ok_or_else(|| {
                AnalysisError::Schema(format!("outcome column '{outcome_column}' not found"))
            })?;

        let (matrix, y, source_rows) = self.encode(batch, &manifest, Some(&outcome))?;
        let excluded_rows = batch.num_rows() - source_rows.len();
        if excluded_rows > 0 {
            warn!("Excluded {excluded_rows} rows with missing values after encoding");
        }

        if matrix.nrows() < self.config.min_rows {
            return Err(AnalysisError::InsufficientData {
                rows: matrix.nrows(),
                required: self.config.min_rows,
            });
        }

        Ok(EncodedData {
            matrix,
            outcome: y,
            manifest,
            source_rows,
            excluded_rows,
        })
    }

    fn encode(
        &self,
        batch: &RecordBatch,
        manifest: &EncodingManifest,
        outcome: Option<&[Option<f64>]>,
    ) -> Result<(FeatureMatrix, Array1<f64>, Vec<usize>)> {
        let columns = manifest
            .features
            .iter()
            .map(|feature| {
                let array = batch.column_by_name(&feature.source).ok_or_else(|| {
                    AnalysisError::InsufficientFeatures {
                        candidates: vec![feature.source.clone()],
                    }
                })?;
                Ok(match &feature.kind {
                    FeatureKind::Numeric => ColumnData::Numeric(float_values(array)?),
                    FeatureKind::Categorical { levels } => ColumnData::Levels {
                        labels: level_labels(array)?,
                        index: levels
                            .iter()
                            .enumerate()
                            .map(|(i, l)| (l.clone(), i))
                            .collect(),
                        width: levels.len().saturating_sub(1),
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let names = manifest.column_names();
        let width = columns.iter().map(ColumnData::width).sum::<usize>() + 1;
        debug_assert_eq!(width, names.len());

        let mut data = Vec::with_capacity(batch.num_rows() * width);
        let mut y = Vec::with_capacity(batch.num_rows());
        let mut rows = Vec::with_capacity(batch.num_rows());
        let mut cells = Vec::with_capacity(width);

        'rows: for row in 0..batch.num_rows() {
            let label = match outcome {
                Some(values) => match values[row] {
                    Some(v) if v.is_finite() => Some(v),
                    _ => continue,
                },
                None => None,
            };

            cells.clear();
            for column in &columns {
                if !column.write_row(row, &mut cells) {
                    continue 'rows;
                }
            }
            cells.push(1.0);

            data.extend_from_slice(&cells);
            if let Some(v) = label {
                y.push(v);
            }
            rows.push(row);
        }

        let values = Array2::from_shape_vec((rows.len(), width), data)
            .map_err(|e| AnalysisError::Conversion(format!("design matrix shape: {e}")))?;
        Ok((
            FeatureMatrix {
                columns: names,
                values,
            },
            Array1::from_vec(y),
            rows,
        ))
    }
}
