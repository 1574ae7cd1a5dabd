pub mod config;
pub mod entropy;
pub mod tokenizer;

pub use config::{ConfigError, DelayRange, MimicConfig, MAX_DELAY_SECS};
pub use entropy::{choose, Entropy, StdEntropy};
pub use tokenizer::{normalize, tokenize_or_split, TokenizeError, Tokenizer, WordTokenizer};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Opaque identifier of a chat the agent can talk in.
///
/// The OneBot transport uses `group:<id>` and `private:<id>`; the core
/// treats the value as an arbitrary string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ConversationId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A text message delivered by the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub conversation: ConversationId,
    pub sender: String,
    /// Sent by the account the agent is running as
    pub is_self: bool,
    pub text: String,
    pub timestamp: i64, // Unix timestamp
}

/// Outbound side of a messaging account.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, conversation: &ConversationId, text: &str) -> anyhow::Result<()>;

    /// Show a "typing..." indicator for roughly `duration`.
    /// Transports without such a notion keep the default no-op.
    async fn show_typing(
        &self,
        _conversation: &ConversationId,
        _duration: Duration,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_trims() {
        let id = ConversationId::new("  group:42 ");
        assert_eq!(id.as_str(), "group:42");
        assert_eq!(id.to_string(), "group:42");
    }

    #[test]
    fn test_conversation_id_ordering_is_lexicographic() {
        let mut ids = vec![
            ConversationId::from("private:2"),
            ConversationId::from("group:9"),
        ];
        ids.sort();
        assert_eq!(ids[0].as_str(), "group:9");
    }
}
