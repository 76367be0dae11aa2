use serde::{Deserialize, Serialize};

use crate::message::Metadata;

/// One prior turn as sent to the query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Lower-cased sender tag (`"user"`, `"bot"`, `"system"`).
    pub role: String,
    pub content: String,
}

/// Conversation context attached to every outgoing query.
///
/// Rebuilt for each query and never persisted; the `Default` value is the
/// empty context a cleared conversation reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContext {
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Opaque insight records, passed through untouched.
    #[serde(default)]
    pub insights: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl MessageContext {
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.insights.is_empty() && self.metadata.is_empty()
    }
}
