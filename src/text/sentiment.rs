//! Polarity scoring and threshold classification

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SentimentConfig;
use crate::text::lexicon::Lexicon;
use crate::text::normalize::normalize_text;

/// Discrete sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Negative,
    Neutral,
    Positive,
}

impl SentimentLabel {
    /// All labels in output order
    pub const ALL: [Self; 3] = [Self::Positive, Self::Neutral, Self::Negative];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Positive => "positive",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label a polarity: strictly above the positive threshold is positive,
/// strictly below the negative threshold is negative, anything else neutral
#[must_use]
pub fn classify(polarity: f64, config: &SentimentConfig) -> SentimentLabel {
    if polarity > config.positive_threshold {
        SentimentLabel::Positive
    } else if polarity < config.negative_threshold {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Polarity and label of one text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub polarity: f64,
    pub label: SentimentLabel,
}

/// Lexicon scorer with fixed classification thresholds
#[derive(Debug, Clone, Default)]
pub struct SentimentScorer {
    lexicon: Lexicon,
    config: SentimentConfig,
}

impl SentimentScorer {
    #[must_use]
    pub const fn new(lexicon: Lexicon, config: SentimentConfig) -> Self {
        Self { lexicon, config }
    }

    /// Built-in lexicon with the given thresholds
    #[must_use]
    pub fn with_config(config: SentimentConfig) -> Self {
        Self::new(Lexicon::new(), config)
    }

    #[must_use]
    pub const fn config(&self) -> &SentimentConfig {
        &self.config
    }

    /// Polarity in [-1, 1] of normalized text
    #[must_use]
    pub fn polarity(&self, clean_text: &str) -> f64 {
        self.lexicon.score(clean_text).polarity
    }

    #[must_use]
    pub fn classify(&self, polarity: f64) -> SentimentLabel {
        classify(polarity, &self.config)
    }

    /// Score normalized text
    #[must_use]
    pub fn score(&self, clean_text: &str) -> Sentiment {
        let polarity = self.polarity(clean_text);
        Sentiment {
            polarity,
            label: self.classify(polarity),
        }
    }

    /// Normalize raw text then score it; `None` when nothing survives normalization
    #[must_use]
    pub fn score_raw(&self, raw_text: &str) -> Option<(String, Sentiment)> {
        let clean = normalize_text(raw_text);
        if clean.is_empty() {
            return None;
        }
        let sentiment = self.score(&clean);
        Some((clean, sentiment))
    }
}
