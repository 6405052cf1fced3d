//! Schema harmonization for survey extracts
//!
//! Raw survey files disagree on column naming and sometimes lack the outcome
//! column entirely. This module maps them onto one canonical schema through an
//! ordered rule list and tags where the outcome came from.

pub mod normalizer;
pub mod rules;

pub use normalizer::{
    EDUCATION_LEVEL_COLUMN, NormalizedTable, RURAL_COLUMN, SchemaNormalizer,
    normalize_column_name, outcome_rate, provenance_of,
};
pub use rules::{ColumnRule, Derivation, OutcomeProvenance, default_rules};
