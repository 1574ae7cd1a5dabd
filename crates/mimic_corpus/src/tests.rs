use crate::*;
use mimic_core::{TokenizeError, Tokenizer};
use std::sync::Arc;

fn fresh() -> (LearningEngine, CorpusStore) {
    (LearningEngine::new(), CorpusStore::new())
}

/// Tokenizer that always fails, forcing the whitespace fallback.
struct BrokenTokenizer;

impl Tokenizer for BrokenTokenizer {
    fn tokenize(&self, _text: &str) -> Result<Vec<String>, TokenizeError> {
        Err(TokenizeError::Pattern("broken on purpose".into()))
    }
}

// ============================================================================
// Store defaults
// ============================================================================

#[test]
fn test_new_store_has_builtin_greetings_and_phrases() {
    let store = CorpusStore::new();
    assert_eq!(store.greetings.len(), BUILTIN_GREETINGS.len());
    assert!(store.greetings.contains("привет"));
    assert!(store.responses.is_empty());
    assert!(store.word_associations.is_empty());
    assert_eq!(store.message_patterns, BUILTIN_PHRASES.to_vec());
}

#[test]
fn test_add_greeting_normalizes_and_dedups() {
    let mut store = CorpusStore::new();
    assert!(store.add_greeting("  Добрый Вечер "));
    assert!(!store.add_greeting("добрый вечер"));
    assert!(!store.add_greeting("   "));
    assert!(store.greetings.contains("добрый вечер"));
}

#[test]
fn test_matching_greeting_is_first_in_order() {
    let store = CorpusStore::new();
    // "ку" sorts before "ку бро"
    assert_eq!(store.matching_greeting("ку бро как ты"), Some("ку"));
    assert_eq!(store.matching_greeting("привет всем"), Some("привет"));
    assert_eq!(store.matching_greeting("пока"), None);
}

#[test]
fn test_top_successors_orders_by_count_then_word() {
    let mut store = CorpusStore::empty();
    for (next, n) in [("б", 2), ("а", 2), ("в", 5), ("г", 1)] {
        for _ in 0..n {
            store.bump_association("x", next);
        }
    }
    let top = store.top_successors("x", 3);
    assert_eq!(top, vec![("в", 5), ("а", 2), ("б", 2)]);
    assert!(store.top_successors("missing", 5).is_empty());
}

// ============================================================================
// Learning
// ============================================================================

#[test]
fn test_short_messages_are_ignored() {
    let (engine, mut store) = fresh();
    let before = store.clone();
    engine.learn(&mut store, "");
    engine.learn(&mut store, "a");
    engine.learn(&mut store, "   ");
    assert_eq!(store, before);
}

#[test]
fn test_pattern_recorded_once() {
    let (engine, mut store) = fresh();
    for _ in 0..5 {
        engine.learn(&mut store, "  Как Прошел День  ");
    }
    let hits = store
        .message_patterns
        .iter()
        .filter(|p| p.as_str() == "как прошел день")
        .count();
    assert_eq!(hits, 1);
}

#[test]
fn test_short_normalized_message_not_archived() {
    let (engine, mut store) = fresh();
    let before = store.message_patterns.len();
    let outcome = engine.learn(&mut store, "да ");
    assert!(!outcome.pattern_added);
    assert_eq!(store.message_patterns.len(), before);
    // still classified
    assert_eq!(store.responses_for("statements"), &["да".to_string()]);
}

#[test]
fn test_pattern_cap_keeps_most_recent() {
    let (engine, mut store) = fresh();
    let total = MAX_PATTERNS + 5;
    for i in 0..total {
        engine.learn(&mut store, &format!("сообщение номер {}", i));
    }
    assert_eq!(store.message_patterns.len(), MAX_PATTERNS);
    assert_eq!(
        store.message_patterns.last().unwrap(),
        &format!("сообщение номер {}", total - 1)
    );
    // 20 seeded phrases + 5 oldest learned messages were evicted
    assert_eq!(store.message_patterns[0], "сообщение номер 5");
}

#[test]
fn test_word_association_counts() {
    let (engine, mut store) = fresh();
    for _ in 0..3 {
        engine.learn(&mut store, "кот спит");
    }
    assert_eq!(store.association_count("кот", "спит"), 3);
    assert_eq!(store.association_count("спит", "кот"), 0);
}

#[test]
fn test_punctuation_is_tokenized() {
    let (engine, mut store) = fresh();
    engine.learn(&mut store, "как дела?");
    assert_eq!(store.association_count("как", "дела"), 1);
    assert_eq!(store.association_count("дела", "?"), 1);
}

#[test]
fn test_tokenizer_failure_falls_back_to_whitespace() {
    let engine = LearningEngine::with_tokenizer(Arc::new(BrokenTokenizer));
    let mut store = CorpusStore::new();
    let outcome = engine.learn(&mut store, "как дела?");
    assert_eq!(outcome.pairs_counted, 1);
    assert_eq!(store.association_count("как", "дела?"), 1);
}

#[test]
fn test_greeting_continuation_learned() {
    let (engine, mut store) = fresh();
    let outcome = engine.learn(&mut store, "Привет как дела");
    assert_eq!(outcome.greetings_extended, vec!["привет".to_string()]);
    assert_eq!(store.responses_for("привет"), &["как дела".to_string()]);

    // Same continuation is not duplicated
    engine.learn(&mut store, "привет как дела");
    assert_eq!(store.responses_for("привет").len(), 1);
}

#[test]
fn test_greeting_with_short_tail_is_not_learned() {
    let (engine, mut store) = fresh();
    engine.learn(&mut store, "привет ок");
    // 9 chars - 6 chars = 3 > 2, learned
    assert_eq!(store.responses_for("привет"), &["ок".to_string()]);

    engine.learn(&mut store, "хай ты");
    // 6 chars - 3 chars = 3 > 2, learned
    assert_eq!(store.responses_for("хай"), &["ты".to_string()]);

    engine.learn(&mut store, "йоу я");
    // 5 chars - 3 chars = 2, not learned
    assert!(store.responses_for("йоу").is_empty());
}

#[test]
fn test_every_matching_greeting_learns() {
    let (engine, mut store) = fresh();
    engine.learn(&mut store, "ку бро что нового");
    assert_eq!(store.responses_for("ку"), &["бро что нового".to_string()]);
    assert_eq!(store.responses_for("ку бро"), &["что нового".to_string()]);
}

#[test]
fn test_question_beats_exclamation() {
    let (engine, mut store) = fresh();
    let outcome = engine.learn(&mut store, "это круто?");
    assert_eq!(outcome.class, Some(MessageClass::Question));
    assert_eq!(store.responses_for("questions"), &["это круто?".to_string()]);
    assert!(store.responses_for("exclamations").is_empty());
}

#[test]
fn test_exclamation_and_statement_buckets() {
    let (engine, mut store) = fresh();
    engine.learn(&mut store, "вау какой закат");
    engine.learn(&mut store, "сегодня дождь");
    engine.learn(&mut store, "сегодня дождь");
    assert_eq!(store.responses_for("exclamations"), &["вау какой закат".to_string()]);
    assert_eq!(store.responses_for("statements"), &["сегодня дождь".to_string()]);
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_load_missing_file_gives_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = CorpusStore::load(dir.path().join("absent.json"));
    assert_eq!(store, CorpusStore::new());
}

#[test]
fn test_load_malformed_file_gives_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("corpus.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(CorpusStore::try_load(&path), Err(CorpusError::Format(_))));
    assert_eq!(CorpusStore::load(&path), CorpusStore::new());
}

#[test]
fn test_save_load_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("data/corpus.json");
    let (engine, mut store) = fresh();
    store.add_greeting("доброе утро");
    for msg in ["доброе утро друзья", "как дела?", "ого, вот это да", "кот спит"] {
        engine.learn(&mut store, msg);
    }
    store.save(&path);

    let loaded = CorpusStore::load(&path);
    assert_eq!(loaded, store);

    loaded.save(&path);
    assert_eq!(CorpusStore::load(&path), store);
}

#[test]
fn test_to_json_matches_file_format() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("corpus.json");
    let (engine, mut store) = fresh();
    engine.learn(&mut store, "кот спит на окне");

    std::fs::write(&path, store.to_json().unwrap()).unwrap();
    assert_eq!(CorpusStore::try_load(&path).unwrap(), store);
}

#[test]
fn test_thin_archive_is_seeded_on_load() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("corpus.json");
    std::fs::write(
        &path,
        r#"{"greetings": ["Салам"], "message_patterns": ["норм", "своя фраза"]}"#,
    )
    .unwrap();

    let store = CorpusStore::load(&path);
    assert!(store.greetings.contains("салам"));
    assert!(store.greetings.contains("привет"));
    assert_eq!(store.message_patterns[0], "норм");
    assert_eq!(store.message_patterns[1], "своя фраза");
    // "норм" is not duplicated by seeding
    assert_eq!(store.message_patterns.len(), 1 + BUILTIN_PHRASES.len());
}

#[test]
fn test_save_to_unwritable_path_does_not_panic() {
    let dir = tempfile::TempDir::new().unwrap();
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").unwrap();
    let store = CorpusStore::new();
    // parent is a regular file, so the write must fail
    assert!(store.try_save(blocker.join("corpus.json")).is_err());
    store.save(blocker.join("corpus.json"));
}

#[test]
fn test_stats() {
    let (engine, mut store) = fresh();
    engine.learn(&mut store, "кот спит дома");
    let stats = store.stats();
    assert_eq!(stats.greetings, BUILTIN_GREETINGS.len());
    assert_eq!(stats.associated_words, 2);
    assert_eq!(stats.associations, 2);
    assert_eq!(stats.patterns, BUILTIN_PHRASES.len() + 1);
    assert_eq!(stats.response_keys, 1);
}
