use mimic_core::{choose, Entropy};
use mimic_corpus::CorpusStore;

mod generator;
pub mod sampling;
pub use generator::{ChainConfig, ResponseGenerator, FALLBACK_PHRASES};

/// Emoji appended to some replies
pub const EMOJI_PALETTE: &[&str] = &["👍", "😊", "🙂", "👌", "💪", "🔥", "😂", "👀", "🤔"];

/// Letters used for typos
pub const TYPO_ALPHABET: &str = "йцукенгшщзхъфывапролджэячсмитьбю";

/// Punctuation dropped by the stripping pass
const STRIPPED_PUNCTUATION: [char; 4] = [',', '.', ';', ':'];

#[derive(Debug, Clone)]
pub struct HumanizerConfig {
    pub strip_punctuation_probability: f64,
    pub emoji_probability: f64,
    pub typo_probability: f64,
    pub emojis: Vec<String>,
    pub typo_alphabet: Vec<char>,
}

impl Default for HumanizerConfig {
    fn default() -> Self {
        Self {
            strip_punctuation_probability: 0.7,
            emoji_probability: 0.2,
            typo_probability: 0.1,
            emojis: EMOJI_PALETTE.iter().map(|e| e.to_string()).collect(),
            typo_alphabet: TYPO_ALPHABET.chars().collect(),
        }
    }
}

/// Adds the small imperfections of hand-typed chat messages.
pub struct Humanizer {
    config: HumanizerConfig,
}

impl Humanizer {
    pub fn new() -> Self {
        Self::with_config(HumanizerConfig::default())
    }

    pub fn with_config(config: HumanizerConfig) -> Self {
        Self { config }
    }

    /// Run the three independent noise passes: punctuation stripping,
    /// emoji, typo. An empty message is replaced by a random greeting first.
    pub fn humanize<E: Entropy + ?Sized>(
        &self,
        message: &str,
        store: &CorpusStore,
        entropy: &mut E,
    ) -> String {
        let mut message = if message.is_empty() {
            store.random_greeting(entropy)
        } else {
            message.to_string()
        };

        if entropy.chance(self.config.strip_punctuation_probability) {
            message.retain(|c| !STRIPPED_PUNCTUATION.contains(&c));
        }

        if entropy.chance(self.config.emoji_probability) {
            if let Some(emoji) = choose(entropy, &self.config.emojis) {
                message.push(' ');
                message.push_str(emoji);
            }
        }

        if entropy.chance(self.config.typo_probability) {
            if let Some(typoed) = self.inject_typo(&message, entropy) {
                message = typoed;
            }
        }

        message
    }

    /// Replace one interior letter of a random word longer than 3 chars.
    /// Words are re-joined with single spaces.
    fn inject_typo<E: Entropy + ?Sized>(&self, message: &str, entropy: &mut E) -> Option<String> {
        let mut words: Vec<String> = message.split_whitespace().map(str::to_string).collect();
        let candidates: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| w.chars().count() > 3)
            .map(|(i, _)| i)
            .collect();
        let &index = choose(entropy, &candidates)?;
        let replacement = *choose(entropy, &self.config.typo_alphabet)?;

        let mut chars: Vec<char> = words[index].chars().collect();
        let pos = entropy.range_inclusive(1, chars.len() - 2);
        chars[pos] = replacement;
        words[index] = chars.into_iter().collect();
        Some(words.join(" "))
    }
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimic_core::StdEntropy;
    use std::collections::VecDeque;

    /// Replays a fixed script of draws, then repeats the last one.
    struct ScriptedEntropy {
        floats: VecDeque<f64>,
        indices: VecDeque<usize>,
    }

    impl ScriptedEntropy {
        fn new(floats: &[f64], indices: &[usize]) -> Self {
            Self {
                floats: floats.iter().copied().collect(),
                indices: indices.iter().copied().collect(),
            }
        }
    }

    impl Entropy for ScriptedEntropy {
        fn next_f64(&mut self) -> f64 {
            if self.floats.len() > 1 {
                self.floats.pop_front().unwrap_or(0.99)
            } else {
                self.floats.front().copied().unwrap_or(0.99)
            }
        }

        fn below(&mut self, upper: usize) -> usize {
            let i = if self.indices.len() > 1 {
                self.indices.pop_front().unwrap_or(0)
            } else {
                self.indices.front().copied().unwrap_or(0)
            };
            i % upper
        }
    }

    #[test]
    fn test_strip_only() {
        let humanizer = Humanizer::new();
        let store = CorpusStore::new();
        // strip fires (0.0 < 0.7), emoji (0.99 < 0.2) and typo (0.99 < 0.1) do not
        let mut e = ScriptedEntropy::new(&[0.0, 0.99, 0.99], &[0]);
        assert_eq!(
            humanizer.humanize("привет, как дела.", &store, &mut e),
            "привет как дела"
        );
    }

    #[test]
    fn test_nothing_fires() {
        let humanizer = Humanizer::new();
        let store = CorpusStore::new();
        let mut e = ScriptedEntropy::new(&[0.99], &[0]);
        assert_eq!(humanizer.humanize("ну: да; ok.", &store, &mut e), "ну: да; ok.");
    }

    #[test]
    fn test_emoji_appended() {
        let humanizer = Humanizer::new();
        let store = CorpusStore::new();
        // no strip, emoji #2, no typo
        let mut e = ScriptedEntropy::new(&[0.99, 0.0, 0.99], &[2]);
        assert_eq!(humanizer.humanize("ясно", &store, &mut e), "ясно 🙂");
    }

    #[test]
    fn test_typo_replaces_interior_char() {
        let humanizer = Humanizer::new();
        let store = CorpusStore::new();
        // only the typo pass fires; "дела" is the sole candidate,
        // alphabet[0] = 'й', interior offset 0 -> position 1
        let mut e = ScriptedEntropy::new(&[0.99, 0.99, 0.0], &[0]);
        assert_eq!(humanizer.humanize("ну как дела", &store, &mut e), "ну как дйла");
    }

    #[test]
    fn test_typo_skips_short_words() {
        let humanizer = Humanizer::new();
        let store = CorpusStore::new();
        let mut e = ScriptedEntropy::new(&[0.99, 0.99, 0.0], &[0]);
        assert_eq!(humanizer.humanize("да ну", &store, &mut e), "да ну");
    }

    #[test]
    fn test_empty_message_becomes_greeting() {
        let humanizer = Humanizer::new();
        let store = CorpusStore::new();
        let mut e = ScriptedEntropy::new(&[0.99], &[0]);
        let out = humanizer.humanize("", &store, &mut e);
        assert!(store.greetings.contains(&out));
    }

    #[test]
    fn test_typo_keeps_first_and_last_char() {
        let humanizer = Humanizer::with_config(HumanizerConfig {
            strip_punctuation_probability: 0.0,
            emoji_probability: 0.0,
            typo_probability: 1.0,
            ..HumanizerConfig::default()
        });
        let store = CorpusStore::new();
        let mut e = StdEntropy::seeded(5);
        for _ in 0..200 {
            let out = humanizer.humanize("замечательно", &store, &mut e);
            assert_eq!(out.chars().count(), 12);
            assert!(out.starts_with('з'));
            assert!(out.ends_with('о'));
        }
    }
}
