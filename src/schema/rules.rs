//! Ordered column rules for schema harmonization
//!
//! Rules are evaluated top to bottom against the concatenated input table.
//! A rule only fires while its canonical column is still absent, so the first
//! applicable rule wins and the outcome of a run can be read off the list.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::OUTCOME_COLUMN;

/// Canonical vaccination-status column
pub const VACCINATION_STATUS_COLUMN: &str = "vaccination_status";

/// How a missing canonical column is synthesized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// `1 - source` for a binary source column
    InvertBinary {
        /// Column holding the binary value to invert
        source: &'static str,
    },
    /// Placeholder outcome from coarse demographic indicators
    DemographicHeuristic,
}

/// One entry of the rule list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRule {
    /// Rename `alias` to `canonical`
    Alias {
        /// Normalized alias name
        alias: &'static str,
        /// Canonical name
        canonical: &'static str,
    },
    /// Synthesize `canonical` from other columns
    Derive {
        /// Canonical name
        canonical: &'static str,
        /// Derivation rule
        derivation: Derivation,
    },
    /// Fill `canonical` with the unknown sentinel
    DefaultText {
        /// Canonical name
        canonical: &'static str,
    },
}

impl ColumnRule {
    /// Column this rule produces
    #[must_use]
    pub const fn canonical(&self) -> &'static str {
        match self {
            Self::Alias { canonical, .. }
            | Self::Derive { canonical, .. }
            | Self::DefaultText { canonical } => canonical,
        }
    }
}

/// Source columns and trigger values of the demographic heuristic
pub const HEURISTIC_INDICATORS: [(&str, &str); 3] = [
    ("rural_urban", "rural"),
    ("education", "no education"),
    ("income", "low"),
];

/// The standard rule list for survey extracts
#[must_use]
pub fn default_rules() -> Vec<ColumnRule> {
    vec![
        ColumnRule::Alias {
            alias: "vaccine_attitude",
            canonical: OUTCOME_COLUMN,
        },
        ColumnRule::Alias {
            alias: "immunization_status",
            canonical: VACCINATION_STATUS_COLUMN,
        },
        ColumnRule::Alias {
            alias: "child_vaccination",
            canonical: VACCINATION_STATUS_COLUMN,
        },
        ColumnRule::Derive {
            canonical: OUTCOME_COLUMN,
            derivation: Derivation::InvertBinary {
                source: VACCINATION_STATUS_COLUMN,
            },
        },
        ColumnRule::Derive {
            canonical: OUTCOME_COLUMN,
            derivation: Derivation::DemographicHeuristic,
        },
        ColumnRule::DefaultText { canonical: "state" },
        ColumnRule::DefaultText { canonical: "gender" },
        ColumnRule::DefaultText {
            canonical: "education",
        },
    ]
}

/// Where the outcome column of a normalized table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeProvenance {
    /// Present in the input, possibly under an alias
    Observed,
    /// Derived as the inverse of vaccination status
    InvertedVaccinationStatus,
    /// Placeholder from demographic indicators; not an observation
    Heuristic,
}

impl OutcomeProvenance {
    /// Metadata key used on normalized tables
    pub const METADATA_KEY: &'static str = "outcome_provenance";

    /// Stable text form
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observed => "observed",
            Self::InvertedVaccinationStatus => "inverted_vaccination_status",
            Self::Heuristic => "heuristic",
        }
    }

    /// Parse the text form
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "observed" => Some(Self::Observed),
            "inverted_vaccination_status" => Some(Self::InvertedVaccinationStatus),
            "heuristic" => Some(Self::Heuristic),
            _ => None,
        }
    }

    /// Whether the outcome is a real observation rather than a placeholder
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        matches!(self, Self::Heuristic)
    }
}

impl fmt::Display for OutcomeProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
