//! Word-polarity lexicon for vaccine discourse
//!
//! Scores are in [-1, 1]. Negations and intensifiers modify the next matched
//! word only; any unmatched word in between resets them.

use rustc_hash::{FxHashMap, FxHashSet};

/// Multiplier applied to a word that follows a negation
pub const NEGATION_FACTOR: f64 = -0.5;

const POSITIVE_WORDS: &[(&str, f64)] = &[
    ("safe", 0.5),
    ("safer", 0.5),
    ("safety", 0.4),
    ("effective", 0.6),
    ("efficacy", 0.4),
    ("protect", 0.5),
    ("protected", 0.5),
    ("protection", 0.5),
    ("protects", 0.5),
    ("immunity", 0.3),
    ("grateful", 0.7),
    ("thankful", 0.7),
    ("thanks", 0.4),
    ("thank", 0.4),
    ("happy", 0.8),
    ("glad", 0.5),
    ("relieved", 0.6),
    ("relief", 0.5),
    ("excited", 0.6),
    ("hope", 0.4),
    ("hopeful", 0.5),
    ("good", 0.7),
    ("great", 0.8),
    ("excellent", 1.0),
    ("amazing", 0.6),
    ("best", 1.0),
    ("better", 0.5),
    ("love", 0.5),
    ("trust", 0.5),
    ("confident", 0.5),
    ("recommend", 0.4),
    ("encourage", 0.4),
    ("benefit", 0.4),
    ("healthy", 0.5),
    ("easy", 0.4),
    ("painless", 0.5),
    ("proud", 0.8),
    ("science", 0.2),
    ("finally", 0.2),
];

const NEGATIVE_WORDS: &[(&str, f64)] = &[
    ("unsafe", -0.6),
    ("dangerous", -0.6),
    ("danger", -0.5),
    ("risky", -0.5),
    ("risk", -0.3),
    ("harmful", -0.6),
    ("harm", -0.5),
    ("toxic", -0.7),
    ("poison", -0.8),
    ("fear", -0.6),
    ("afraid", -0.6),
    ("scared", -0.6),
    ("scary", -0.5),
    ("worried", -0.5),
    ("worry", -0.5),
    ("anxious", -0.5),
    ("hesitant", -0.3),
    ("reluctant", -0.3),
    ("refuse", -0.4),
    ("distrust", -0.6),
    ("mistrust", -0.6),
    ("doubt", -0.4),
    ("bad", -0.7),
    ("worse", -0.4),
    ("worst", -1.0),
    ("terrible", -1.0),
    ("awful", -1.0),
    ("horrible", -1.0),
    ("sick", -0.7),
    ("pain", -0.5),
    ("painful", -0.7),
    ("death", -0.7),
    ("deaths", -0.7),
    ("died", -0.7),
    ("die", -0.6),
    ("dead", -0.2),
    ("hoax", -0.8),
    ("scam", -0.8),
    ("lie", -0.6),
    ("lies", -0.6),
    ("conspiracy", -0.5),
    ("forced", -0.4),
    ("angry", -0.5),
    ("sad", -0.5),
    ("useless", -0.5),
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "neither", "nor", "nobody", "nothing", "none", "cannot", "cant",
    "dont", "doesnt", "didnt", "wont", "wouldnt", "shouldnt", "couldnt", "isnt", "arent",
    "wasnt", "werent", "havent", "hasnt", "aint",
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.3),
    ("really", 1.3),
    ("so", 1.3),
    ("extremely", 1.5),
    ("incredibly", 1.5),
    ("absolutely", 1.5),
    ("totally", 1.3),
    ("completely", 1.3),
    ("highly", 1.3),
    ("super", 1.3),
    ("slightly", 0.5),
    ("somewhat", 0.7),
    ("barely", 0.5),
    ("little", 0.7),
];

/// Outcome of scoring one text against the lexicon
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconScore {
    /// Mean of matched word scores clamped to [-1, 1]; 0.0 without matches
    pub polarity: f64,
    /// Number of matched polarity words
    pub matched: usize,
}

/// Word scores plus negation and intensifier vocabularies
#[derive(Debug, Clone)]
pub struct Lexicon {
    words: FxHashMap<String, f64>,
    negations: FxHashSet<String>,
    intensifiers: FxHashMap<String, f64>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon {
    /// Built-in vaccine discourse lexicon
    #[must_use]
    pub fn new() -> Self {
        Self {
            words: POSITIVE_WORDS
                .iter()
                .chain(NEGATIVE_WORDS)
                .map(|&(w, s)| (w.to_string(), s))
                .collect(),
            negations: NEGATIONS.iter().map(|w| (*w).to_string()).collect(),
            intensifiers: INTENSIFIERS
                .iter()
                .map(|&(w, m)| (w.to_string(), m))
                .collect(),
        }
    }

    /// Lexicon with no entries
    #[must_use]
    pub fn empty() -> Self {
        Self {
            words: FxHashMap::default(),
            negations: FxHashSet::default(),
            intensifiers: FxHashMap::default(),
        }
    }

    /// Add or replace a word score
    #[must_use]
    pub fn with_word(mut self, word: &str, score: f64) -> Self {
        self.words.insert(word.to_lowercase(), score.clamp(-1.0, 1.0));
        self
    }

    #[must_use]
    pub fn word_score(&self, word: &str) -> Option<f64> {
        self.words.get(word).copied()
    }

    #[must_use]
    pub fn is_negation(&self, word: &str) -> bool {
        self.negations.contains(word)
    }

    #[must_use]
    pub fn intensifier(&self, word: &str) -> Option<f64> {
        self.intensifiers.get(word).copied()
    }

    /// Score whitespace-separated, already-normalized text
    #[must_use]
    pub fn score(&self, text: &str) -> LexiconScore {
        let mut total = 0.0;
        let mut matched = 0usize;
        let mut negate = false;
        let mut multiplier = 1.0;

        for word in text.split_whitespace() {
            if self.is_negation(word) {
                negate = true;
                continue;
            }
            if let Some(factor) = self.intensifier(word) {
                multiplier *= factor;
                continue;
            }
            if let Some(mut score) = self.word_score(word) {
                score *= multiplier;
                if negate {
                    score *= NEGATION_FACTOR;
                }
                total += score;
                matched += 1;
            }
            negate = false;
            multiplier = 1.0;
        }

        let polarity = if matched == 0 {
            0.0
        } else {
            (total / matched as f64).clamp(-1.0, 1.0)
        };
        LexiconScore { polarity, matched }
    }
}
