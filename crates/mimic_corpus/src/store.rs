//! Corpus Store: everything the agent has learned, and its JSON persistence.
//!
//! Load and save never fail from the caller's point of view. A missing file
//! starts a fresh corpus, a broken one is logged and replaced by defaults,
//! and a failed write leaves the in-memory state untouched.

use mimic_core::{choose, Entropy};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::{BUILTIN_GREETINGS, BUILTIN_PHRASES};

/// Upper bound on `message_patterns`.
pub const MAX_PATTERNS: usize = 5000;

/// Below this many archived patterns the built-in phrases are mixed in on load.
const MIN_SEEDED_PATTERNS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("corpus file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("corpus file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusStore {
    /// Ordered so prefix matching walks greetings in a stable order
    pub greetings: BTreeSet<String>,
    /// Greeting or class tag -> continuations in discovery order
    pub responses: BTreeMap<String, Vec<String>>,
    /// word -> next word -> count
    pub word_associations: BTreeMap<String, BTreeMap<String, u64>>,
    /// Oldest first, at most `MAX_PATTERNS`
    pub message_patterns: Vec<String>,
}

/// On-disk layout. Every field is optional so older or hand-edited files load.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CorpusFile {
    greetings: Vec<String>,
    responses: BTreeMap<String, Vec<String>>,
    word_associations: BTreeMap<String, BTreeMap<String, u64>>,
    message_patterns: Vec<String>,
}

/// Sizes of the learned structures, for logs and the REPL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorpusStats {
    pub greetings: usize,
    pub response_keys: usize,
    pub responses: usize,
    pub associated_words: usize,
    pub associations: usize,
    pub patterns: usize,
}

impl Default for CorpusStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusStore {
    /// Fresh corpus: built-in greetings, nothing learned, phrase-seeded archive.
    pub fn new() -> Self {
        let mut store = Self::empty();
        store.seed_patterns();
        store
    }

    /// Built-in greetings only, without any seeded patterns.
    pub fn empty() -> Self {
        Self {
            greetings: BUILTIN_GREETINGS.iter().map(|g| g.to_string()).collect(),
            responses: BTreeMap::new(),
            word_associations: BTreeMap::new(),
            message_patterns: Vec::new(),
        }
    }

    /// Load from `path`, falling back to [`CorpusStore::new`] on any problem.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No corpus at {}, starting fresh", path.display());
            return Self::new();
        }
        match Self::try_load(path) {
            Ok(store) => {
                let stats = store.stats();
                tracing::info!(
                    "Corpus loaded from {} ({} patterns, {} associated words)",
                    path.display(),
                    stats.patterns,
                    stats.associated_words
                );
                store
            }
            Err(e) => {
                tracing::error!("Failed to load corpus from {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Strict variant of [`CorpusStore::load`] for callers that want the error.
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self, CorpusError> {
        let content = std::fs::read_to_string(path)?;
        let file: CorpusFile = serde_json::from_str(&content)?;

        let mut store = Self::empty();
        store.greetings.extend(
            file.greetings
                .iter()
                .map(|g| mimic_core::normalize(g))
                .filter(|g| !g.is_empty()),
        );
        store.responses = file.responses;
        store.word_associations = file.word_associations;
        store.message_patterns = file.message_patterns;
        if store.message_patterns.len() < MIN_SEEDED_PATTERNS {
            store.seed_patterns();
        }
        store.enforce_pattern_cap();
        Ok(store)
    }

    /// Persist to `path`. Failures are logged, never returned.
    pub fn save<P: AsRef<Path>>(&self, path: P) {
        let path = path.as_ref();
        match self.try_save(path) {
            Ok(()) => tracing::debug!("Corpus saved to {}", path.display()),
            Err(e) => tracing::error!("Failed to save corpus to {}: {}", path.display(), e),
        }
    }

    pub fn try_save<P: AsRef<Path>>(&self, path: P) -> Result<(), CorpusError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Pretty JSON in the on-disk format, for callers that write the file themselves.
    pub fn to_json(&self) -> Result<String, CorpusError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Append built-in phrases that are not archived yet.
    fn seed_patterns(&mut self) {
        for phrase in BUILTIN_PHRASES {
            if !self.message_patterns.iter().any(|p| p == phrase) {
                self.message_patterns.push(phrase.to_string());
            }
        }
    }

    /// Archive `message` unless already present. Returns whether it was added.
    pub fn remember_pattern(&mut self, message: &str) -> bool {
        if self.message_patterns.iter().any(|p| p == message) {
            return false;
        }
        self.message_patterns.push(message.to_string());
        self.enforce_pattern_cap();
        true
    }

    fn enforce_pattern_cap(&mut self) {
        if self.message_patterns.len() > MAX_PATTERNS {
            let overflow = self.message_patterns.len() - MAX_PATTERNS;
            self.message_patterns.drain(..overflow);
        }
    }

    /// Append `value` under `key` unless present. Returns whether it was added.
    pub fn record_response(&mut self, key: &str, value: &str) -> bool {
        let entries = self.responses.entry(key.to_string()).or_default();
        if entries.iter().any(|v| v == value) {
            return false;
        }
        entries.push(value.to_string());
        true
    }

    pub fn responses_for(&self, key: &str) -> &[String] {
        self.responses.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn bump_association(&mut self, word: &str, next: &str) {
        *self
            .word_associations
            .entry(word.to_string())
            .or_default()
            .entry(next.to_string())
            .or_insert(0) += 1;
    }

    pub fn association_count(&self, word: &str, next: &str) -> u64 {
        self.word_associations
            .get(word)
            .and_then(|table| table.get(next))
            .copied()
            .unwrap_or(0)
    }

    /// Successor table of `word`, `None` when absent or empty.
    pub fn successors(&self, word: &str) -> Option<&BTreeMap<String, u64>> {
        self.word_associations.get(word).filter(|t| !t.is_empty())
    }

    /// Up to `k` successors of `word`, most frequent first.
    /// Equal counts keep lexicographic word order.
    pub fn top_successors(&self, word: &str, k: usize) -> Vec<(&str, u64)> {
        let Some(table) = self.successors(word) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&str, u64)> = table.iter().map(|(w, c)| (w.as_str(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(k);
        ranked
    }

    /// Add a custom greeting. Returns false for blanks and duplicates.
    pub fn add_greeting(&mut self, greeting: &str) -> bool {
        let greeting = mimic_core::normalize(greeting);
        !greeting.is_empty() && self.greetings.insert(greeting)
    }

    /// First greeting, in set order, that `text` starts with.
    pub fn matching_greeting(&self, text: &str) -> Option<&str> {
        self.greetings
            .iter()
            .map(String::as_str)
            .find(|g| text.starts_with(g))
    }

    pub fn random_greeting<E: Entropy + ?Sized>(&self, entropy: &mut E) -> String {
        if self.greetings.is_empty() {
            return BUILTIN_GREETINGS[entropy.below(BUILTIN_GREETINGS.len())].to_string();
        }
        let idx = entropy.below(self.greetings.len());
        self.greetings
            .iter()
            .nth(idx)
            .cloned()
            .unwrap_or_else(|| BUILTIN_GREETINGS[0].to_string())
    }

    pub fn random_pattern<E: Entropy + ?Sized>(&self, entropy: &mut E) -> Option<String> {
        choose(entropy, &self.message_patterns).cloned()
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            greetings: self.greetings.len(),
            response_keys: self.responses.len(),
            responses: self.responses.values().map(Vec::len).sum(),
            associated_words: self.word_associations.len(),
            associations: self.word_associations.values().map(BTreeMap::len).sum(),
            patterns: self.message_patterns.len(),
        }
    }
}
