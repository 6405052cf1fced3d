//! Table file operations
//!
//! Reads delimited and Parquet files into single Arrow record batches and
//! writes result tables back out as CSV.

use std::fs::{self, File};
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::compute::concat_batches;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::error::ArrowError;
use arrow::record_batch::RecordBatch;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Serialize;

use crate::error::{AnalysisError, Result};

/// File extensions recognised as input tables
const TABLE_EXTENSIONS: [&str; 2] = ["csv", "parquet"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Whether a path looks like a readable input table
#[must_use]
pub fn is_table_file(path: &Path) -> bool {
    path.is_file()
        && extension(path).is_some_and(|ext| TABLE_EXTENSIONS.contains(&ext.as_str()))
}

/// List the input tables of a directory in sorted path order
///
/// # Errors
/// Returns `MissingInput` when the directory does not exist
pub fn list_table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnalysisError::MissingInput(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_table_file(path))
        .collect();
    files.sort();
    Ok(files)
}

/// Read a delimited or Parquet file into one record batch
pub fn read_table(path: &Path) -> Result<RecordBatch> {
    let start = Instant::now();
    let batch = match extension(path).as_deref() {
        Some("parquet") => read_parquet_table(path)?,
        _ => read_csv_table(path)?,
    };
    debug!(
        "Read {} rows x {} columns from {} in {:?}",
        batch.num_rows(),
        batch.num_columns(),
        path.display(),
        start.elapsed()
    );
    Ok(batch)
}

fn read_csv_table(path: &Path) -> Result<RecordBatch> {
    let mut file = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_header(true)
        .build(file)?;
    let batches = reader.collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

fn read_parquet_table(path: &Path) -> Result<RecordBatch> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = Arc::clone(builder.schema());
    let reader = builder.build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, ArrowError>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// Read every file, keeping the input order
pub fn read_tables(paths: &[PathBuf]) -> Result<Vec<RecordBatch>> {
    let progress = ProgressBar::new(paths.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}") {
        progress.set_style(style);
    }

    let mut tables = Vec::with_capacity(paths.len());
    for path in paths {
        progress.set_message(path.display().to_string());
        info!("Processing: {}", path.display());
        tables.push(read_table(path)?);
        progress.inc(1);
    }
    progress.finish_and_clear();
    Ok(tables)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write a record batch as CSV with a header row, overwriting any previous run
pub fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;
    info!("Saved {} rows to {}", batch.num_rows(), path.display());
    Ok(())
}

/// Write a plain-text report
pub fn write_text(text: &str, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, text)?;
    info!("Saved {}", path.display());
    Ok(())
}

/// Write a value as pretty-printed JSON
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    info!("Saved {}", path.display());
    Ok(())
}
