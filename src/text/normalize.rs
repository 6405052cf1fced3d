//! Text normalization ahead of sentiment scoring

use once_cell::sync::Lazy;
use regex::Regex;

/// Scheme followed by a run of non-space characters
static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-z][a-z0-9+.\-]*://\S+").expect("valid URL pattern"));
static MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").expect("valid mention pattern"));
static HASHTAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\w+").expect("valid hashtag pattern"));
static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid punctuation pattern"));

/// Lower-case and strip URLs, mentions, hashtags and punctuation
///
/// Hashtag text is discarded with its `#`. Interior whitespace is kept as is;
/// only the ends are trimmed. Applying the function twice gives the same result
/// as applying it once.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_urls = URL.replace_all(&lowered, "");
    let without_mentions = MENTION.replace_all(&without_urls, "");
    let without_tags = HASHTAG.replace_all(&without_mentions, "");
    NON_WORD.replace_all(&without_tags, "").trim().to_string()
}
