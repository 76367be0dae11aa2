//! Sequential message delivery.
//!
//! [`MessageQueue`] hands queued messages one at a time to a single
//! registered [`MessageProcessor`]. Producers may enqueue concurrently; the
//! queue guarantees that no two processor invocations overlap.
//!
//! Failed deliveries are re-queued at the tail when the error is retryable
//! and the message still has attempts left, otherwise the message is dropped
//! and reported through [`MessageProcessor::abandoned`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use scope3_types::{Message, MessageStatus};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::config::ChatConfig;
use crate::error::ChatError;

#[cfg(test)]
mod tests;

/// Handler invoked by the queue for every message it delivers.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Deliver one message. A retryable error re-queues it at the tail.
    async fn process(&self, message: &Message) -> Result<(), ChatError>;

    /// Called once when the queue gives up on `message` for good.
    async fn abandoned(&self, message: &Message, error: &ChatError) {
        let _ = (message, error);
    }
}

/// Retry and timeout bounds applied to every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Total attempts per message, including the first one. Always `>= 1`.
    pub max_attempts: u32,
    /// Upper bound on a single processor invocation.
    pub message_timeout: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            message_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ChatConfig> for DeliveryPolicy {
    fn from(config: &ChatConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            message_timeout: config.message_timeout,
        }
    }
}

#[derive(Debug)]
struct Entry {
    message: Message,
    attempts: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<Entry>,
    /// `true` while a drain loop owns the head of the queue.
    processing: bool,
    /// Bumped by `clear`; a loop from an older generation stops touching
    /// the queue.
    generation: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    processor: RwLock<Option<Arc<dyn MessageProcessor>>>,
    status: watch::Sender<MessageStatus>,
    /// Held for the duration of each processor call.
    invocation: tokio::sync::Mutex<()>,
    policy: DeliveryPolicy,
}

/// FIFO of pending messages with at most one delivery in flight.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct MessageQueue {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("MessageQueue")
            .field("len", &state.entries.len())
            .field("processing", &state.processing)
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}

impl MessageQueue {
    pub fn new(policy: DeliveryPolicy) -> Self {
        let (status, _rx) = watch::channel(MessageStatus::Pending);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                processor: RwLock::new(None),
                status,
                invocation: tokio::sync::Mutex::new(()),
                policy: DeliveryPolicy {
                    max_attempts: policy.max_attempts.max(1),
                    ..policy
                },
            }),
        }
    }

    /// Register (or replace) the handler used for every delivery.
    pub fn set_processor(&self, processor: Arc<dyn MessageProcessor>) {
        *self
            .inner
            .processor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(processor);
    }

    /// Append `message` and, when no loop is running, drain the queue.
    ///
    /// The caller that starts a drain loop waits until the queue is empty.
    /// A caller that finds a loop already running returns as soon as the
    /// message is enqueued.
    ///
    /// Returns [`ChatError::ProcessorNotConfigured`] (without enqueuing)
    /// when no processor has been registered.
    pub async fn add_message(&self, message: Message) -> Result<(), ChatError> {
        let processor = self.processor().ok_or(ChatError::ProcessorNotConfigured)?;

        let generation = {
            let mut state = self.lock_state();
            debug!(message_id = %message.id, queued = state.entries.len(), "enqueue message");
            state.entries.push_back(Entry {
                message,
                attempts: 0,
            });
            if state.processing {
                return Ok(());
            }
            state.processing = true;
            state.generation
        };

        self.drain(processor, generation).await;
        Ok(())
    }

    /// Outcome of the most recent processing step.
    pub fn status(&self) -> MessageStatus {
        *self.inner.status.borrow()
    }

    /// Live view of [`Self::status`].
    pub fn subscribe_status(&self) -> watch::Receiver<MessageStatus> {
        self.inner.status.subscribe()
    }

    /// Drop every queued message and reset the status to `Pending`.
    ///
    /// A processor call already in flight runs to completion, but its
    /// outcome no longer affects the queue.
    pub fn clear_queue(&self) {
        let mut state = self.lock_state();
        let dropped = state.entries.len();
        state.entries.clear();
        state.processing = false;
        state.generation = state.generation.wrapping_add(1);
        self.inner.status.send_replace(MessageStatus::Pending);
        debug!(dropped, "queue cleared");
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_processing(&self) -> bool {
        self.lock_state().processing
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn processor(&self) -> Option<Arc<dyn MessageProcessor>> {
        self.inner
            .processor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn drain(&self, processor: Arc<dyn MessageProcessor>, generation: u64) {
        let policy = self.inner.policy;
        self.inner.status.send_replace(MessageStatus::Pending);

        loop {
            let (message, attempt) = {
                let mut state = self.lock_state();
                if state.generation != generation {
                    return;
                }
                match state.entries.front_mut() {
                    Some(entry) => {
                        entry.attempts += 1;
                        (entry.message.clone(), entry.attempts)
                    }
                    None => {
                        state.processing = false;
                        return;
                    }
                }
            };

            debug!(message_id = %message.id, attempt, "processing message");
            let outcome = {
                let _in_flight = self.inner.invocation.lock().await;
                match tokio::time::timeout(policy.message_timeout, processor.process(&message)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ChatError::Timeout(policy.message_timeout)),
                }
            };

            let given_up = {
                let mut state = self.lock_state();
                if state.generation != generation {
                    debug!(message_id = %message.id, "queue cleared while message was in flight");
                    return;
                }
                match outcome {
                    Ok(()) => {
                        state.entries.pop_front();
                        self.inner.status.send_replace(MessageStatus::Sent);
                        None
                    }
                    Err(err) => {
                        self.inner.status.send_replace(MessageStatus::Error);
                        match state.entries.pop_front() {
                            Some(entry) if err.is_retryable() && entry.attempts < policy.max_attempts => {
                                warn!(
                                    message_id = %entry.message.id,
                                    attempt = entry.attempts,
                                    error = %err,
                                    "delivery failed; re-queued at tail"
                                );
                                state.entries.push_back(entry);
                                None
                            }
                            Some(entry) => Some((entry.message, err)),
                            None => None,
                        }
                    }
                }
            };

            if let Some((message, err)) = given_up {
                error!(
                    message_id = %message.id,
                    attempts = attempt,
                    error = %err,
                    "giving up on message"
                );
                processor.abandoned(&message, &err).await;
            }
        }
    }
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new(DeliveryPolicy::default())
    }
}
