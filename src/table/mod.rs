//! Arrow table utilities shared by both pipelines
//!
//! Every stage exchanges whole in-memory `RecordBatch`es; this module owns
//! reading them from files, typed column access and writing results.

pub mod columns;
pub mod io;
pub mod rows;

pub use columns::{concat_tables, float_column, string_column, with_column};
pub use io::{list_table_files, read_table, read_tables, write_csv, write_json, write_text};
pub use rows::rows_to_batch;
