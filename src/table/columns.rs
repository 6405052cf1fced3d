//! Typed column access for heterogeneous tables.
//!
//! Input tables come from schema inference, so the same logical column may be
//! text in one file and integer in another. These helpers read any column as
//! text or as floats through Arrow's cast kernels; values that cannot be
//! converted become nulls.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array, Int64Array, StringArray, new_null_array};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::{debug, warn};

use crate::error::{AnalysisError, Result};

/// Whether a data type holds text
#[must_use]
pub const fn is_text(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Whether a data type is a plain number
#[must_use]
pub const fn is_numeric(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
    )
}

/// Read a column as optional strings
pub fn string_values(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    let converted = cast(array, &DataType::Utf8)?;
    let strings = converted
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| AnalysisError::Conversion("cast to Utf8 did not yield a string array".into()))?;
    Ok(strings.iter().map(|v| v.map(str::to_string)).collect())
}

/// Read a column as optional floats
pub fn float_values(array: &ArrayRef) -> Result<Vec<Option<f64>>> {
    let converted = cast(array, &DataType::Float64)?;
    let floats = converted
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| AnalysisError::Conversion("cast to Float64 did not yield a float array".into()))?;
    Ok(floats.iter().collect())
}

/// Look up a named column as strings; `None` when the column is absent
pub fn string_column(batch: &RecordBatch, name: &str) -> Result<Option<Vec<Option<String>>>> {
    batch.column_by_name(name).map(string_values).transpose()
}

/// Look up a named column as floats; `None` when the column is absent
pub fn float_column(batch: &RecordBatch, name: &str) -> Result<Option<Vec<Option<f64>>>> {
    batch.column_by_name(name).map(float_values).transpose()
}

/// Build a text column
#[must_use]
pub fn text_array(values: &[Option<String>]) -> ArrayRef {
    Arc::new(values.iter().map(Option::as_deref).collect::<StringArray>())
}

/// Build a nullable integer column
#[must_use]
pub fn int_array(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

/// Build a float column
#[must_use]
pub fn float_array(values: Vec<Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values))
}

/// Return a batch with `name` set to `array`, replacing an existing column in place
pub fn with_column(batch: &RecordBatch, name: &str, array: ArrayRef) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
    let field = Field::new(name, array.data_type().clone(), true);

    if let Ok(idx) = schema.index_of(name) {
        fields[idx] = field;
        columns[idx] = array;
    } else {
        fields.push(field);
        columns.push(array);
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), columns)?)
}

/// Return a batch with a column renamed
pub fn rename_column(batch: &RecordBatch, from: &str, to: &str) -> Result<RecordBatch> {
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .map(|f| {
            if f.name() == from {
                f.as_ref().clone().with_name(to)
            } else {
                f.as_ref().clone()
            }
        })
        .collect();
    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), batch.columns().to_vec())?)
}

/// Attach key/value metadata to a batch's schema
pub fn with_metadata(batch: &RecordBatch, metadata: HashMap<String, String>) -> Result<RecordBatch> {
    let schema = batch.schema().as_ref().clone().with_metadata(metadata);
    Ok(RecordBatch::try_new(Arc::new(schema), batch.columns().to_vec())?)
}

/// Concatenate tables over the union of their columns
///
/// Columns keep first-seen order. A column absent from a table is null for
/// that table's rows. A column whose numeric type differs between tables is
/// widened to `Float64`; any other type conflict is unified as text.
pub fn concat_tables(tables: &[RecordBatch]) -> Result<RecordBatch> {
    let mut names: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for table in tables {
        for field in table.schema().fields() {
            if seen.insert(field.name().clone()) {
                names.push(field.name().clone());
            }
        }
    }

    let fields: Vec<Field> = names
        .iter()
        .map(|name| {
            let types: Vec<DataType> = tables
                .iter()
                .filter_map(|t| t.column_by_name(name).map(|c| c.data_type().clone()))
                .filter(|dt| *dt != DataType::Null)
                .collect();
            let unified = match types.first() {
                None => DataType::Utf8,
                Some(first) if types.iter().all(|dt| dt == first) => first.clone(),
                Some(_) if types.iter().all(is_numeric) => {
                    debug!("Column '{name}' has mixed numeric types across input files; widening to Float64");
                    DataType::Float64
                }
                Some(_) => {
                    warn!("Column '{name}' has differing types across input files; reading it as text");
                    DataType::Utf8
                }
            };
            Field::new(name, unified, true)
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let aligned = tables
        .iter()
        .map(|table| {
            let columns = schema
                .fields()
                .iter()
                .map(|field| match table.column_by_name(field.name()) {
                    Some(col) if col.data_type() == field.data_type() => Ok(Arc::clone(col)),
                    Some(col) => Ok(cast(col, field.data_type())?),
                    None => Ok(new_null_array(field.data_type(), table.num_rows())),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(RecordBatch::try_new(Arc::clone(&schema), columns)?)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(concat_batches(&schema, &aligned)?)
}
