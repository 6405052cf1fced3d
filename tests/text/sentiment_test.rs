//! Tests for text normalization and sentiment scoring

use hesitancy::config::SentimentConfig;
use hesitancy::text::{
    Lexicon, SentimentLabel, SentimentScorer, TextRecord, classify, normalize_text,
    records_from_batch, score_corpus, scored_text_table,
};
use hesitancy::error::AnalysisError;
use hesitancy::table::string_column;

use crate::utils::{day, text_table};

#[test]
fn test_scenario_c_social_tokens_removed() {
    let cleaned = normalize_text("Got my vaccine today! 😟 #VaccineHesitancy http://x.co @user");

    assert_eq!(cleaned, cleaned.to_lowercase());
    assert!(!cleaned.contains("http"));
    assert!(!cleaned.contains("x.co"));
    assert!(!cleaned.contains('@') && !cleaned.contains("user"));
    assert!(!cleaned.contains('#') && !cleaned.contains("vaccinehesitancy"));
    assert!(cleaned.chars().all(|c| c.is_alphanumeric() || c.is_whitespace() || c == '_'));
    assert_eq!(cleaned, "got my vaccine today");
}

#[test]
fn test_normalization_is_idempotent() {
    let samples = [
        "Got my vaccine today! 😟 #VaccineHesitancy http://x.co @user",
        "   SPACED   out   ",
        "Ünïcödé façade — naïve café",
        "visit https://who.int/vaccines?lang=en&x=1 for info!!!",
        "@a @b #c",
    ];
    for text in samples {
        let once = normalize_text(text);
        assert_eq!(normalize_text(&once), once, "not idempotent for {text:?}");
    }
}

#[test]
fn test_threshold_boundaries_are_neutral() {
    let config = SentimentConfig::default();
    assert_eq!(classify(0.1, &config), SentimentLabel::Neutral);
    assert_eq!(classify(-0.1, &config), SentimentLabel::Neutral);
    assert_eq!(classify(0.1 + 1e-9, &config), SentimentLabel::Positive);
    assert_eq!(classify(-0.1 - 1e-9, &config), SentimentLabel::Negative);
}

#[test]
fn test_thresholds_are_injectable() {
    let config = SentimentConfig {
        positive_threshold: 0.5,
        negative_threshold: -0.5,
    };
    assert_eq!(classify(0.3, &config), SentimentLabel::Neutral);
    assert_eq!(classify(0.6, &config), SentimentLabel::Positive);
}

#[test]
fn test_polarity_direction_and_range() {
    let scorer = SentimentScorer::default();

    let positive = scorer.score("the vaccine is safe and effective");
    let negative = scorer.score("the vaccine is dangerous and i am scared");
    let neutral = scorer.score("the clinic opens at nine");

    assert_eq!(positive.label, SentimentLabel::Positive);
    assert_eq!(negative.label, SentimentLabel::Negative);
    assert_eq!(neutral.label, SentimentLabel::Neutral);
    assert!(neutral.polarity.abs() < f64::EPSILON);
    for s in [positive, negative, neutral] {
        assert!((-1.0..=1.0).contains(&s.polarity));
    }
}

#[test]
fn test_negation_reverses_direction() {
    let scorer = SentimentScorer::default();
    let plain = scorer.polarity("it is safe");
    let negated = scorer.polarity("it is not safe");
    assert!(plain > 0.0);
    assert!(negated < 0.0);
    assert!(negated.abs() < plain.abs());
}

#[test]
fn test_custom_lexicon() {
    let scorer = SentimentScorer::new(
        Lexicon::empty().with_word("jab", 0.9),
        SentimentConfig::default(),
    );
    assert_eq!(scorer.score("jab").label, SentimentLabel::Positive);
    assert_eq!(scorer.score("safe").label, SentimentLabel::Neutral);
}

#[test]
fn test_corpus_scoring_drops_empty_texts() {
    let batch = text_table(vec![
        (
            "text",
            vec![
                Some("Feeling safe after my shot!"),
                Some("#tags @only https://t.co/x"),
                None,
                Some("Worried about side effects..."),
            ],
        ),
        (
            "date",
            vec![Some("2021-03-02"), Some("2021-03-05"), None, Some("not a date")],
        ),
        ("user_location", vec![Some("Kerala"), None, None, Some("  ")]),
    ]);

    let records = records_from_batch(&batch).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].location.as_deref(), Some("Kerala"));
    assert_eq!(records[2].location, None);
    assert_eq!(records[2].timestamp, None);

    let now = day(2024, 6, 15);
    let scored = score_corpus(&records, &SentimentScorer::default(), now).unwrap();
    assert_eq!(scored.len(), 2);
    assert_eq!(scored[0].timestamp, day(2021, 3, 2));
    assert_eq!(scored[1].timestamp, now);
    assert_eq!(scored[0].label, SentimentLabel::Positive);
    assert_eq!(scored[1].label, SentimentLabel::Negative);

    let table = scored_text_table(&batch, &scored).unwrap();
    assert_eq!(table.num_rows(), 2);
    let labels = string_column(&table, "label").unwrap().unwrap();
    assert_eq!(
        labels,
        vec![Some("positive".to_string()), Some("negative".to_string())]
    );
    let months = string_column(&table, "month").unwrap().unwrap();
    assert_eq!(months, vec![Some("2021-03".to_string()), Some("2024-06".to_string())]);
    let clean = string_column(&table, "clean_text").unwrap().unwrap();
    assert_eq!(clean[0].as_deref(), Some("feeling safe after my shot"));
    assert!(table.column_by_name("user_location").is_some());
}

#[test]
fn test_empty_corpus() {
    let records = vec![TextRecord::new("!!!"), TextRecord::new("#x @y")];
    let err = score_corpus(&records, &SentimentScorer::default(), day(2024, 1, 1)).unwrap_err();
    assert!(matches!(err, AnalysisError::EmptyCorpus(_)));

    let no_text = text_table(vec![("body", vec![Some("hello")])]);
    assert!(matches!(
        records_from_batch(&no_text),
        Err(AnalysisError::EmptyCorpus(_))
    ));
}
