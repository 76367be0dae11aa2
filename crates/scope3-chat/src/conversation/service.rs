use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use scope3_types::{Insight, Message, MessageId, MessageStatus, Metadata, QueryRequest, Sender};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::reply;
use super::state::{ChatState, StateStore};
use crate::collab::{InsightService, QueryService};
use crate::config::ChatConfig;
use crate::context::ContextBuilder;
use crate::error::ChatError;
use crate::events::{ChatEvent, EventBus};
use crate::queue::{DeliveryPolicy, MessageProcessor, MessageQueue};

/// The conversation state machine.
///
/// Owns the [`ChatState`], turns user input into queued messages and merges
/// query results back into the conversation. Cloning yields another handle
/// to the same conversation.
///
/// The conversation starts in tour mode. [`ChatService::set_tour_complete`]
/// switches it to interactive mode; a walkthrough restart switches it back.
#[derive(Clone)]
pub struct ChatService {
    core: Arc<ChatCore>,
    queue: MessageQueue,
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// Processor side of the service, registered with the queue.
struct ChatCore {
    state: StateStore,
    insights: Arc<dyn InsightService>,
    query: Arc<dyn QueryService>,
    events: EventBus,
    config: ChatConfig,
    /// User message id → id of the loading placeholder answering it.
    pending_replies: Mutex<HashMap<MessageId, MessageId>>,
}

impl ChatService {
    pub fn new(
        config: ChatConfig,
        insights: Arc<dyn InsightService>,
        query: Arc<dyn QueryService>,
        events: EventBus,
    ) -> Self {
        let queue = MessageQueue::new(DeliveryPolicy::from(&config));
        let core = Arc::new(ChatCore {
            state: StateStore::new(ChatState::default()),
            insights,
            query,
            events,
            config,
            pending_replies: Mutex::new(HashMap::new()),
        });
        queue.set_processor(Arc::clone(&core) as Arc<dyn MessageProcessor>);
        info!(
            rag_api_url = %core.config.rag_api_url,
            max_history = core.config.max_history,
            retry_attempts = core.config.retry_attempts,
            "chat service initialised"
        );
        Self { core, queue }
    }

    // ── observation ──────────────────────────────────────────────────────────

    pub fn state(&self) -> ChatState {
        self.core.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.core.state.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.core.events
    }

    pub fn insight_service(&self) -> Arc<dyn InsightService> {
        Arc::clone(&self.core.insights)
    }

    /// Outcome of the queue's most recent processing step.
    pub fn queue_status(&self) -> MessageStatus {
        self.queue.status()
    }

    pub fn is_tour_mode(&self) -> bool {
        self.core.state.snapshot().is_tour_mode
    }

    // ── mode and visibility ──────────────────────────────────────────────────

    /// Apply the tour-completion signal: `true` enters interactive mode,
    /// `false` returns to tour mode and hides the chat.
    pub fn set_tour_complete(&self, complete: bool) {
        let tour_mode = !complete;
        let mut hidden = false;
        let changed = self.core.state.update(|state| {
            if state.is_tour_mode == tour_mode {
                return false;
            }
            state.is_tour_mode = tour_mode;
            if tour_mode && state.show_chat {
                state.show_chat = false;
                hidden = true;
            }
            true
        });
        if changed {
            info!(tour_mode, "conversation mode changed");
            self.core.events.publish(ChatEvent::TourModeChanged(tour_mode));
        }
        if hidden {
            self.core.events.publish(ChatEvent::ChatVisibility(false));
        }
    }

    /// Flip chat visibility. Returns the resulting visibility, which is
    /// always `false` in tour mode.
    pub fn toggle_chat(&self) -> bool {
        let visible = !self.core.state.snapshot().show_chat;
        self.set_chat_visible(visible)
    }

    /// Request chat visibility. Returns the resulting visibility.
    pub fn set_chat_visible(&self, visible: bool) -> bool {
        let mut result = false;
        self.core.state.update(|state| {
            let next = visible && !state.is_tour_mode;
            result = next;
            if state.show_chat == next {
                return false;
            }
            state.show_chat = next;
            true
        });
        if visible && !result {
            debug!("chat stays hidden during the tour");
        }
        self.core.events.publish(ChatEvent::ChatVisibility(result));
        result
    }

    // ── producers ────────────────────────────────────────────────────────────

    /// Append a walkthrough message, then a generated explanation for it.
    ///
    /// A failed explanation is logged and skipped.
    pub async fn add_tour_message(&self, text: impl Into<String>) -> Result<(), ChatError> {
        let text = text.into();
        self.enqueue(Message::tour(text.clone())).await?;

        match self
            .core
            .insights
            .generate_explanation(json!({ "message": text }))
            .await
        {
            Ok(explanation) if !explanation.trim().is_empty() => {
                self.enqueue(Message::tour(explanation)).await?;
            }
            Ok(_) => debug!("explanation service returned no text"),
            Err(err) => warn!(error = %err, "failed to generate tour explanation"),
        }
        Ok(())
    }

    /// Queue a user message. Blank input is ignored.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), ChatError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Ok(());
        }
        debug!(len = text.len(), "sending user message");
        self.enqueue(Message::user(text)).await
    }

    /// Drop queued work and the conversation, keeping the current mode.
    pub fn clear_history(&self) {
        self.queue.clear_queue();
        self.core.pending().clear();
        self.core.state.update(|state| {
            state.messages.clear();
            state.current_context = Default::default();
            true
        });
        info!("chat history cleared");
    }

    async fn enqueue(&self, message: Message) -> Result<(), ChatError> {
        let id = message.id;
        self.core.state.push(message.clone());
        if let Err(err) = self.queue.add_message(message).await {
            self.core.state.set_status(id, MessageStatus::Error);
            return Err(err);
        }
        Ok(())
    }
}

impl ChatCore {
    fn pending(&self) -> MutexGuard<'_, HashMap<MessageId, MessageId>> {
        self.pending_replies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn process_user_message(&self, message: &Message) {
        self.state.set_status(message.id, MessageStatus::Sent);
        // History is taken before the placeholder goes in.
        let history = self.state.snapshot().messages;

        let existing = self.pending().get(&message.id).copied();
        let placeholder_id = match existing {
            Some(id) => id,
            None => {
                let placeholder = Message::loading_placeholder();
                let id = placeholder.id;
                self.state.push(placeholder);
                self.pending().insert(message.id, id);
                id
            }
        };

        let outcome = self.answer(message, &history, placeholder_id).await;
        self.pending().remove(&message.id);

        match outcome {
            Ok((reply, context)) => {
                let merged = self.state.update(|state| {
                    match state.messages.iter_mut().find(|m| m.id == placeholder_id) {
                        Some(slot) => *slot = reply,
                        None => return false,
                    }
                    state.current_context = context;
                    true
                });
                if merged {
                    self.publish_dashboard_update();
                } else {
                    debug!(message_id = %message.id, "conversation cleared before the reply arrived");
                }
            }
            Err(err) => {
                warn!(message_id = %message.id, error = %err, "query failed");
                self.fail_reply(message, placeholder_id, &err);
            }
        }
    }

    async fn answer(
        &self,
        message: &Message,
        history: &[Message],
        placeholder_id: MessageId,
    ) -> Result<(Message, scope3_types::MessageContext), ChatError> {
        let insights = self.insights.get_insights().await?;
        debug!(count = insights.len(), "insights received");

        let mut metadata = Metadata::new();
        metadata.insert("messageId".to_owned(), Value::String(message.id.to_string()));
        let context = ContextBuilder::new()
            .with_history(history)
            .with_history_limit(self.config.max_history)
            .with_insights(insights.iter().map(Insight::to_value).collect())
            .with_metadata(metadata)
            .build();

        info!(
            message_id = %message.id,
            history = context.history.len(),
            insights = context.insights.len(),
            "querying rag service"
        );
        let request = QueryRequest::new(message.text.clone(), &context, self.config.query_options);
        let response = self.query.query(request).await?;

        let text = reply::reply_text(&response);
        let reply = Message::bot_reply(placeholder_id, text, reply::reply_metadata(&response));
        Ok((reply, context))
    }

    /// Replace the placeholder with a system error and mark the user message.
    fn fail_reply(&self, message: &Message, placeholder_id: MessageId, err: &ChatError) {
        let mut metadata = Metadata::new();
        metadata.insert("code".to_owned(), Value::String(err.code().to_owned()));
        metadata.insert("error".to_owned(), Value::String(err.to_string()));
        metadata.insert("messageId".to_owned(), Value::String(message.id.to_string()));
        if let ChatError::RagApi { status: Some(status), .. } = err {
            metadata.insert("statusCode".to_owned(), Value::from(*status));
        }

        let error_message = Message::system_error(placeholder_id, reply::error_text(err), metadata);
        if !self.state.replace(placeholder_id, error_message) {
            debug!(message_id = %message.id, "conversation cleared before the failure was reported");
        }
        self.state.set_status(message.id, MessageStatus::Error);
    }

    fn publish_dashboard_update(&self) {
        let text = self.state.snapshot().last_bot_reply().map(|m| m.text.clone());
        if let Some(text) = text {
            self.events.publish(ChatEvent::DashboardUpdate(text));
        }
    }
}

#[async_trait]
impl MessageProcessor for ChatCore {
    async fn process(&self, message: &Message) -> Result<(), ChatError> {
        match message.sender {
            Sender::User => self.process_user_message(message).await,
            Sender::Avatar => {
                self.state.set_status(message.id, MessageStatus::Sent);
            }
            Sender::Bot | Sender::System => {
                debug!(message_id = %message.id, sender = %message.sender, "nothing to deliver");
                self.state.set_status(message.id, MessageStatus::Sent);
            }
        }
        Ok(())
    }

    async fn abandoned(&self, message: &Message, error: &ChatError) {
        let placeholder = self.pending().remove(&message.id);
        match placeholder {
            Some(placeholder_id) => self.fail_reply(message, placeholder_id, error),
            None => {
                self.state.set_status(message.id, MessageStatus::Error);
            }
        }
    }
}
