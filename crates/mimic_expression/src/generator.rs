//! Response Generator
//!
//! Tries, in order: echoing a known greeting with a learned continuation,
//! walking the word-adjacency table from a word of the input, and finally
//! replaying something from the corpus.

use mimic_core::{choose, normalize, tokenize_or_split, Entropy, Tokenizer, WordTokenizer};
use mimic_corpus::{CorpusStore, MessageClass};
use std::sync::Arc;

use crate::sampling::{sample_without_replacement, weighted_choice};

/// Used when the corpus has nothing to offer.
pub const FALLBACK_PHRASES: &[&str] = &["ну да", "согласен", "точно", "и не говори", "бывает"];

/// Tuning for the word-chain walk
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub min_steps: usize,
    pub max_steps: usize,
    /// Successors considered at each step
    pub top_k: usize,
    /// How many of the top-k are drawn before the weighted pick
    pub sample_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            min_steps: 3,
            max_steps: 10,
            top_k: 5,
            sample_size: 3,
        }
    }
}

pub struct ResponseGenerator {
    tokenizer: Arc<dyn Tokenizer>,
    chain: ChainConfig,
}

impl ResponseGenerator {
    pub fn new() -> Self {
        Self::with_tokenizer(Arc::new(WordTokenizer::new()))
    }

    pub fn with_tokenizer(tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self {
            tokenizer,
            chain: ChainConfig::default(),
        }
    }

    pub fn with_chain(mut self, chain: ChainConfig) -> Self {
        self.chain = chain;
        self
    }

    /// Produce a candidate reply. Never returns an empty string for a
    /// non-degenerate corpus.
    pub fn generate<E: Entropy + ?Sized>(
        &self,
        store: &CorpusStore,
        input: Option<&str>,
        entropy: &mut E,
    ) -> String {
        let Some(input) = input.filter(|i| !i.is_empty()) else {
            return store
                .random_pattern(entropy)
                .unwrap_or_else(|| store.random_greeting(entropy));
        };
        let input = normalize(input);

        if let Some(reply) = Self::greeting_echo(store, &input, entropy) {
            return reply;
        }
        if let Some(reply) = self.word_chain(store, &input, entropy) {
            return reply;
        }
        tracing::debug!("No greeting or known word in input, using fallback reply");
        Self::fallback(store, entropy)
    }

    /// `greeting + continuation` when the input opens with a known greeting.
    fn greeting_echo<E: Entropy + ?Sized>(
        store: &CorpusStore,
        input: &str,
        entropy: &mut E,
    ) -> Option<String> {
        let greeting = store.matching_greeting(input)?;
        match choose(entropy, store.responses_for(greeting)) {
            Some(continuation) => Some(format!("{} {}", greeting, continuation)),
            None => Some(greeting.to_string()),
        }
    }

    /// Markov-style walk starting from a random input word that has successors.
    fn word_chain<E: Entropy + ?Sized>(
        &self,
        store: &CorpusStore,
        input: &str,
        entropy: &mut E,
    ) -> Option<String> {
        let tokens = tokenize_or_split(self.tokenizer.as_ref(), input);
        let viable: Vec<&String> = tokens
            .iter()
            .filter(|t| store.successors(t).is_some())
            .collect();
        let start = (*choose(entropy, &viable)?).clone();

        let mut words = vec![start];
        let steps = entropy.range_inclusive(self.chain.min_steps, self.chain.max_steps);
        for _ in 0..steps {
            let current = words.last().map(String::as_str).unwrap_or_default();
            let top = store.top_successors(current, self.chain.top_k);
            if top.is_empty() {
                break;
            }
            let next = if top.len() > 2 {
                let drawn = sample_without_replacement(entropy, &top, self.chain.sample_size);
                weighted_choice(entropy, &drawn).copied()
            } else {
                top.first().map(|(w, _)| *w)
            };
            match next {
                Some(word) => words.push(word.to_string()),
                None => break,
            }
        }
        Some(words.join(" "))
    }

    fn fallback<E: Entropy + ?Sized>(store: &CorpusStore, entropy: &mut E) -> String {
        let statements = store.responses_for(MessageClass::Statement.key());
        if let Some(statement) = choose(entropy, statements) {
            return statement.clone();
        }
        if let Some(pattern) = store.random_pattern(entropy) {
            return pattern;
        }
        FALLBACK_PHRASES[entropy.below(FALLBACK_PHRASES.len())].to_string()
    }
}

impl Default for ResponseGenerator {
    fn default() -> Self {
        Self::new()
    }
}
