//! Assembly of the context sent with each query.

use scope3_types::{HistoryEntry, Message, MessageContext, Metadata};

/// Accumulates the pieces of a [`MessageContext`] for one outgoing query.
///
/// ```rust
/// use scope3_chat::ContextBuilder;
///
/// let ctx = ContextBuilder::new().build();
/// assert!(ctx.history.is_empty() && ctx.insights.is_empty() && ctx.metadata.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    history: Option<Vec<HistoryEntry>>,
    history_limit: Option<usize>,
    insights: Option<Vec<serde_json::Value>>,
    metadata: Option<Metadata>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything accumulated so far.
    pub fn reset(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    /// Replace the history with the non-tour entries of `messages`.
    ///
    /// Loading placeholders carry no text and are skipped as well.
    pub fn with_history(&mut self, messages: &[Message]) -> &mut Self {
        self.history = Some(
            messages
                .iter()
                .filter(|m| !m.is_tour_message && !m.is_loading_placeholder)
                .map(|m| HistoryEntry {
                    role: m.role(),
                    content: m.text.clone(),
                })
                .collect(),
        );
        self
    }

    /// Keep only the most recent `limit` history entries in [`Self::build`].
    pub fn with_history_limit(&mut self, limit: usize) -> &mut Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn with_insights(&mut self, insights: Vec<serde_json::Value>) -> &mut Self {
        self.insights = Some(insights);
        self
    }

    /// Shallow-merge `metadata`; keys from later calls win.
    pub fn with_metadata(&mut self, metadata: Metadata) -> &mut Self {
        self.metadata.get_or_insert_with(Metadata::new).extend(metadata);
        self
    }

    /// Return a copy of the accumulated context, defaulting missing parts.
    pub fn build(&self) -> MessageContext {
        let mut history = self.history.clone().unwrap_or_default();
        if let Some(limit) = self.history_limit {
            let excess = history.len().saturating_sub(limit);
            history.drain(..excess);
        }
        MessageContext {
            history,
            insights: self.insights.clone().unwrap_or_default(),
            metadata: self.metadata.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn build_defaults_every_field() {
        let builder = ContextBuilder::new();
        let first = builder.build();
        let second = builder.build();
        assert_eq!(first, MessageContext::default());
        assert_eq!(first, second);
    }

    #[test]
    fn history_skips_tour_messages_and_lowercases_roles() {
        let messages = vec![
            Message::tour("Welcome aboard"),
            Message::user("How much did transport emit?"),
            Message::new(scope3_types::Sender::Bot, "500 tons"),
            Message::loading_placeholder(),
        ];
        let ctx = ContextBuilder::new().with_history(&messages).build();
        assert_eq!(
            ctx.history,
            vec![
                HistoryEntry { role: "user".into(), content: "How much did transport emit?".into() },
                HistoryEntry { role: "bot".into(), content: "500 tons".into() },
            ]
        );
    }

    #[test]
    fn history_limit_keeps_most_recent() {
        let messages: Vec<Message> = (0..5).map(|i| Message::user(format!("q{i}"))).collect();
        let ctx = ContextBuilder::new()
            .with_history(&messages)
            .with_history_limit(2)
            .build();
        let contents: Vec<_> = ctx.history.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(contents, ["q3", "q4"]);
    }

    #[test]
    fn metadata_merges_shallowly() {
        let ctx = ContextBuilder::new()
            .with_metadata(meta(json!({"messageId": "a", "source": "chat"})))
            .with_metadata(meta(json!({"messageId": "b"})))
            .build();
        assert_eq!(ctx.metadata["messageId"], "b");
        assert_eq!(ctx.metadata["source"], "chat");
    }

    #[test]
    fn reset_clears_state_and_build_is_a_copy() {
        let mut builder = ContextBuilder::new();
        builder.with_insights(vec![json!({"category": "Transport"})]);
        let mut built = builder.build();
        built.insights.clear();
        assert_eq!(builder.build().insights.len(), 1);

        builder.reset();
        assert!(builder.build().is_empty());
    }
}
