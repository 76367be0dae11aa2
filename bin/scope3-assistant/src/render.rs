//! Terminal rendering of conversation snapshots and side-channel events.

use std::collections::HashMap;

use scope3_chat::{ChatEvent, ChatState};
use scope3_types::{Message, MessageId, MessageStatus, Sender};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Print every message whose id or status is new in `state`.
#[derive(Debug, Default)]
pub struct Renderer {
    seen: HashMap<MessageId, MessageStatus>,
}

impl Renderer {
    pub fn render(&mut self, state: &ChatState) -> Vec<String> {
        if state.messages.is_empty() && !self.seen.is_empty() {
            self.seen.clear();
            return vec!["── conversation cleared ──".to_owned()];
        }

        let mut lines = Vec::new();
        for message in &state.messages {
            if self.seen.get(&message.id) == Some(&message.status) {
                continue;
            }
            self.seen.insert(message.id, message.status);
            if let Some(line) = line_for(message) {
                lines.push(line);
            }
        }
        lines
    }
}

fn line_for(message: &Message) -> Option<String> {
    if message.is_loading_placeholder {
        return Some("assistant> …".to_owned());
    }
    match (message.sender, message.status) {
        // User lines are echoed by the terminal; only failures are worth repeating.
        (Sender::User, MessageStatus::Error) => Some(format!("  (not delivered: {})", message.text)),
        (Sender::User, _) => None,
        (_, MessageStatus::Pending) => None,
        (Sender::Avatar, _) => Some(format!("guide> {}", message.text)),
        (Sender::Bot, _) => Some(format!("assistant> {}", message.text)),
        (Sender::System, _) => Some(format!("system> {}", message.text)),
    }
}

/// Render snapshots until the state channel closes.
pub async fn watch_state(mut rx: watch::Receiver<ChatState>) {
    let mut renderer = Renderer::default();
    while rx.changed().await.is_ok() {
        let state = rx.borrow_and_update().clone();
        for line in renderer.render(&state) {
            println!("{line}");
        }
    }
    debug!("state channel closed");
}

/// Log dashboard and visibility events until the bus closes.
pub async fn log_events(mut rx: broadcast::Receiver<ChatEvent>) {
    loop {
        match rx.recv().await {
            Ok(ChatEvent::DashboardUpdate(text)) => info!(len = text.len(), "dashboard updated"),
            Ok(ChatEvent::ChatVisibility(visible)) => {
                println!("{}", if visible { "[chat shown]" } else { "[chat hidden]" });
            }
            Ok(ChatEvent::TourModeChanged(tour_mode)) => info!(tour_mode, "mode changed"),
            Ok(ChatEvent::TourCompleted) => println!("── walkthrough finished; ask me anything ──"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => debug!(skipped, "event log lagged"),
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
