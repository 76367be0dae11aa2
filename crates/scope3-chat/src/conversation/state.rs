use std::sync::Arc;

use scope3_types::{Message, MessageContext, MessageId, MessageStatus, Sender};
use tokio::sync::watch;

/// Snapshot of the conversation as shown to the host UI.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatState {
    /// Insertion order is display order.
    pub messages: Vec<Message>,
    pub is_tour_mode: bool,
    /// Whether the chat overlay is visible. Always `false` in tour mode.
    pub show_chat: bool,
    /// Context used for the most recent successful query.
    pub current_context: MessageContext,
}

impl Default for ChatState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            is_tour_mode: true,
            show_chat: false,
            current_context: MessageContext::default(),
        }
    }
}

impl ChatState {
    /// Latest finalized, non-tour bot reply.
    pub fn last_bot_reply(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| {
            m.sender == Sender::Bot
                && !m.is_tour_message
                && !m.is_loading_placeholder
                && m.status == MessageStatus::Sent
        })
    }
}

/// Exclusive owner of the [`ChatState`].
///
/// Mutations go through [`StateStore::update`], which swaps in the new
/// snapshot under the channel's write lock; observers only ever see complete
/// snapshots.
#[derive(Debug, Clone)]
pub(crate) struct StateStore {
    tx: Arc<watch::Sender<ChatState>>,
}

impl StateStore {
    pub(crate) fn new(initial: ChatState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn snapshot(&self) -> ChatState {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.tx.subscribe()
    }

    /// Apply `f`; subscribers are notified only when it returns `true`.
    pub(crate) fn update(&self, f: impl FnOnce(&mut ChatState) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    pub(crate) fn push(&self, message: Message) {
        self.update(|state| {
            state.messages.push(message);
            true
        });
    }

    /// Replace the message with `id` in place. Returns `false` when absent.
    pub(crate) fn replace(&self, id: MessageId, message: Message) -> bool {
        self.update(|state| match state.messages.iter_mut().find(|m| m.id == id) {
            Some(slot) => {
                *slot = message;
                true
            }
            None => false,
        })
    }

    pub(crate) fn set_status(&self, id: MessageId, status: MessageStatus) -> bool {
        self.update(|state| match state.messages.iter_mut().find(|m| m.id == id) {
            Some(slot) if slot.status != status => {
                slot.status = status;
                true
            }
            _ => false,
        })
    }
}
