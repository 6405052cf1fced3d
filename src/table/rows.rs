//! Conversion of result rows into Arrow tables using `serde_arrow`

use arrow::datatypes::FieldRef;
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_arrow::schema::{SchemaLike, TracingOptions};

use crate::error::{AnalysisError, Result};

/// Convert a slice of serde rows into a `RecordBatch`
///
/// The schema is traced from the row type, so an empty slice still yields a
/// table with the right columns.
pub fn rows_to_batch<T>(rows: &[T]) -> Result<RecordBatch>
where
    T: Serialize + DeserializeOwned,
{
    let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default().allow_null_fields(true))
        .map_err(|e| AnalysisError::Conversion(format!("Schema generation error: {e}")))?;

    serde_arrow::to_record_batch(&fields, &rows)
        .map_err(|e| AnalysisError::Conversion(format!("Serialization error: {e}")))
}
