//! Word tokenizer with a whitespace fallback.

use once_cell::sync::Lazy;
use regex::Regex;

/// Words (with inner `-` or `'`), an ellipsis, or any single other symbol.
const WORD_PATTERN: &str = r"\w+(?:[-'’]\w+)*|\.\.\.|\S";

static WORD_RE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(WORD_PATTERN));

#[derive(Debug, thiserror::Error)]
pub enum TokenizeError {
    #[error("invalid token pattern: {0}")]
    Pattern(String),
}

pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizeError>;
}

/// Regex word tokenizer. Punctuation becomes separate tokens,
/// so `"как дела?"` yields `["как", "дела", "?"]`.
#[derive(Debug, Clone, Default)]
pub struct WordTokenizer {
    custom: Option<Result<Regex, String>>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenizer with a caller-supplied pattern. An invalid pattern is
    /// reported on every `tokenize` call rather than here.
    pub fn with_pattern(pattern: &str) -> Self {
        Self {
            custom: Some(Regex::new(pattern).map_err(|e| e.to_string())),
        }
    }

    fn regex(&self) -> Result<&Regex, TokenizeError> {
        match &self.custom {
            Some(Ok(re)) => Ok(re),
            Some(Err(e)) => Err(TokenizeError::Pattern(e.clone())),
            None => WORD_RE
                .as_ref()
                .map_err(|e| TokenizeError::Pattern(e.to_string())),
        }
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizeError> {
        let re = self.regex()?;
        Ok(re
            .find_iter(text)
            .map(|m| m.as_str().to_string())
            .collect())
    }
}

/// Tokenize, degrading to whitespace splitting if the tokenizer fails.
pub fn tokenize_or_split(tokenizer: &dyn Tokenizer, text: &str) -> Vec<String> {
    match tokenizer.tokenize(text) {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::debug!("Tokenizer failed ({}), splitting on whitespace", e);
            text.split_whitespace().map(str::to_string).collect()
        }
    }
}

/// Lowercase and trim.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}
