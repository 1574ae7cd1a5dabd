//! Learning Engine: folds one message at a time into the corpus.
//!
//! Each message feeds three structures: the pattern archive, the
//! word-adjacency table, and the response map (greeting continuations plus
//! the question / exclamation / statement buckets).

use mimic_core::{normalize, tokenize_or_split, Tokenizer, WordTokenizer};
use std::sync::Arc;

use crate::CorpusStore;

/// Substrings that mark an exclamation besides `!`.
const EXCLAMATION_MARKERS: &[&str] = &["!", "ого", "вау", "круто"];

/// Response-map bucket a whole message is filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageClass {
    Question,
    Exclamation,
    Statement,
}

impl MessageClass {
    /// Classify a normalized message. A `?` wins over exclamation markers.
    pub fn of(message: &str) -> Self {
        if message.contains('?') {
            MessageClass::Question
        } else if EXCLAMATION_MARKERS.iter().any(|m| message.contains(m)) {
            MessageClass::Exclamation
        } else {
            MessageClass::Statement
        }
    }

    /// Key used in `CorpusStore::responses`
    pub fn key(self) -> &'static str {
        match self {
            MessageClass::Question => "questions",
            MessageClass::Exclamation => "exclamations",
            MessageClass::Statement => "statements",
        }
    }
}

/// What a single `learn` call changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LearnOutcome {
    pub pattern_added: bool,
    pub pairs_counted: usize,
    /// Greetings that received a new continuation
    pub greetings_extended: Vec<String>,
    pub class: Option<MessageClass>,
}

pub struct LearningEngine {
    tokenizer: Arc<dyn Tokenizer>,
}

impl LearningEngine {
    pub fn new() -> Self {
        Self::with_tokenizer(Arc::new(WordTokenizer::new()))
    }

    pub fn with_tokenizer(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> Arc<dyn Tokenizer> {
        Arc::clone(&self.tokenizer)
    }

    /// Learn from one raw message. Messages under 2 chars are ignored.
    pub fn learn(&self, store: &mut CorpusStore, message: &str) -> LearnOutcome {
        let mut outcome = LearnOutcome::default();
        if message.chars().count() < 2 {
            return outcome;
        }

        let message = normalize(message);
        if message.is_empty() {
            return outcome;
        }
        let message_len = message.chars().count();
        let tokens = tokenize_or_split(self.tokenizer.as_ref(), &message);

        if message_len > 3 {
            outcome.pattern_added = store.remember_pattern(&message);
        }

        for pair in tokens.windows(2) {
            store.bump_association(&pair[0], &pair[1]);
            outcome.pairs_counted += 1;
        }

        // Every greeting that prefixes the message learns its continuation
        let continuations: Vec<(String, String)> = store
            .greetings
            .iter()
            .filter_map(|greeting| {
                let rest = message.strip_prefix(greeting.as_str())?;
                if message_len - greeting.chars().count() > 2 {
                    Some((greeting.clone(), rest.trim().to_string()))
                } else {
                    None
                }
            })
            .collect();
        for (greeting, continuation) in continuations {
            if store.record_response(&greeting, &continuation) {
                outcome.greetings_extended.push(greeting);
            }
        }

        let class = MessageClass::of(&message);
        store.record_response(class.key(), &message);
        outcome.class = Some(class);

        tracing::trace!(
            "Learned {:?}: pattern_added={} pairs={} greetings={:?}",
            class,
            outcome.pattern_added,
            outcome.pairs_counted,
            outcome.greetings_extended
        );
        outcome
    }
}

impl Default for LearningEngine {
    fn default() -> Self {
        Self::new()
    }
}
