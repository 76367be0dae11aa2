use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Open key/value map attached to messages and contexts.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Opaque message identifier.
///
/// Backed by a UUID v7, so ids sort in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum Sender {
    #[strum(serialize = "User")]
    User,
    #[strum(serialize = "Bot")]
    Bot,
    /// The walkthrough avatar.
    #[strum(serialize = "Avatar")]
    Avatar,
    /// Error and notice messages produced by the chat core itself.
    #[strum(serialize = "System")]
    System,
}

impl Sender {
    /// Role tag used in query history (`"user"`, `"bot"`, ...).
    pub fn role(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// Delivery / lifecycle status of a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageStatus {
    #[default]
    #[strum(serialize = "PENDING")]
    Pending,
    #[strum(serialize = "LOADING")]
    Loading,
    #[strum(serialize = "SENT")]
    Sent,
    #[strum(serialize = "ERROR")]
    Error,
}

/// A single entry in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// `true` while this is the spinner entry awaiting a bot reply.
    #[serde(default)]
    pub is_loading_placeholder: bool,
    #[serde(default)]
    pub is_tour_message: bool,
    pub status: MessageStatus,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Message {
    /// Create a `Pending` message with a fresh id.
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender,
            text: text.into(),
            created_at: Utc::now(),
            is_loading_placeholder: false,
            is_tour_message: false,
            status: MessageStatus::Pending,
            metadata: Metadata::new(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    /// Avatar message that belongs to the walkthrough.
    pub fn tour(text: impl Into<String>) -> Self {
        Self {
            is_tour_message: true,
            ..Self::new(Sender::Avatar, text)
        }
    }

    /// Empty bot entry shown while a reply is being fetched.
    pub fn loading_placeholder() -> Self {
        Self {
            is_loading_placeholder: true,
            status: MessageStatus::Loading,
            ..Self::new(Sender::Bot, String::new())
        }
    }

    /// Final bot reply that takes over the id of `placeholder`.
    pub fn bot_reply(placeholder: MessageId, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: placeholder,
            status: MessageStatus::Sent,
            metadata,
            ..Self::new(Sender::Bot, text)
        }
    }

    /// System error entry that takes over the id of `placeholder`.
    pub fn system_error(placeholder: MessageId, text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            id: placeholder,
            status: MessageStatus::Error,
            metadata,
            ..Self::new(Sender::System, text)
        }
    }

    pub fn role(&self) -> String {
        self.sender.role()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_creation_ordered() {
        let first = MessageId::new();
        let second = MessageId::new();
        assert!(first < second);
    }

    #[test]
    fn sender_role_is_lowercased_tag() {
        assert_eq!(Sender::User.role(), "user");
        assert_eq!(Sender::Avatar.role(), "avatar");
        assert_eq!("Bot".parse::<Sender>().unwrap(), Sender::Bot);
    }

    #[test]
    fn placeholder_and_reply_share_id() {
        let placeholder = Message::loading_placeholder();
        assert!(placeholder.is_loading_placeholder);
        assert_eq!(placeholder.status, MessageStatus::Loading);

        let reply = Message::bot_reply(placeholder.id, "done", Metadata::new());
        assert_eq!(reply.id, placeholder.id);
        assert!(!reply.is_loading_placeholder);
        assert_eq!(reply.status, MessageStatus::Sent);
    }

    #[test]
    fn status_serializes_upper_case() {
        let json = serde_json::to_string(&MessageStatus::Loading).unwrap();
        assert_eq!(json, "\"LOADING\"");
    }
}
