use anyhow::{bail, Context, Result};
use mimic_core::{ConversationId, IncomingMessage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "post_type")]
pub enum OneBotEvent {
    #[serde(rename = "message")]
    Message(MessageEvent),
    /// Echo of a message sent by the logged-in account (go-cqhttp, NapCat)
    #[serde(rename = "message_sent")]
    MessageSent(MessageEvent),
    #[serde(rename = "meta_event")]
    Meta(serde_json::Value),
    #[serde(rename = "notice")]
    Notice(serde_json::Value),
    #[serde(rename = "request")]
    Request(serde_json::Value),
}

impl OneBotEvent {
    /// Text message carried by this event, if any.
    pub fn into_incoming(self) -> Option<IncomingMessage> {
        match self {
            OneBotEvent::Message(event) => Some(event.into_incoming(false)),
            OneBotEvent::MessageSent(event) => Some(event.into_incoming(true)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEvent {
    pub message_type: String, // "private" or "group"
    pub sub_type: Option<String>,
    #[serde(default)]
    pub message_id: i64,
    pub user_id: i64,
    pub group_id: Option<i64>,
    pub self_id: Option<i64>,
    #[serde(default)]
    pub raw_message: String,
    pub sender: Option<Sender>,
    #[serde(default)]
    pub time: i64,
}

impl MessageEvent {
    pub fn target(&self) -> Target {
        match self.group_id {
            Some(group_id) => Target::Group(group_id),
            None => Target::Private(self.user_id),
        }
    }

    fn into_incoming(self, sent_by_self: bool) -> IncomingMessage {
        let is_self = sent_by_self || self.self_id == Some(self.user_id);
        IncomingMessage {
            conversation: self.target().conversation_id(),
            sender: self.user_id.to_string(),
            is_self,
            text: self.raw_message,
            timestamp: self.time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub user_id: Option<i64>,
    pub nickname: Option<String>,
    pub card: Option<String>,
}

/// Where an outgoing message goes. Round-trips through [`ConversationId`]
/// as `group:<id>` / `private:<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Group(i64),
    Private(i64),
}

impl Target {
    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::new(self.to_string())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Group(id) => write!(f, "group:{}", id),
            Target::Private(id) => write!(f, "private:{}", id),
        }
    }
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (kind, id) = s
            .trim()
            .split_once(':')
            .with_context(|| format!("Conversation id '{}' has no kind prefix", s))?;
        let id: i64 = id
            .parse()
            .with_context(|| format!("Invalid numeric id in '{}'", s))?;
        match kind {
            "group" => Ok(Target::Group(id)),
            "private" => Ok(Target::Private(id)),
            other => bail!("Unknown conversation kind '{}'", other),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SendMessageAction {
    pub action: String,
    pub params: SendMessageParams,
}

#[derive(Debug, Serialize)]
pub struct SendMessageParams {
    pub message_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
    pub message: String,
}

impl SendMessageAction {
    pub fn new(target: Target, message: &str) -> Self {
        let (action, message_type, user_id, group_id) = match target {
            Target::Group(id) => ("send_group_msg", "group", None, Some(id)),
            Target::Private(id) => ("send_private_msg", "private", Some(id), None),
        };
        Self {
            action: action.to_string(),
            params: SendMessageParams {
                message_type: message_type.to_string(),
                user_id,
                group_id,
                message: message.to_string(),
            },
        }
    }
}
