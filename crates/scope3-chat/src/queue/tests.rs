use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scope3_types::{Message, MessageStatus};
use tokio::sync::Notify;
use tracing_test::traced_test;

use super::{DeliveryPolicy, MessageProcessor, MessageQueue};
use crate::error::ChatError;

/// Processor that records every call and replays scripted outcomes.
#[derive(Default)]
struct ScriptedProcessor {
    calls: Mutex<Vec<String>>,
    abandoned: Mutex<Vec<(String, ChatError)>>,
    /// Outcomes per message text, consumed front to back; empty means `Ok`.
    script: Mutex<HashMap<String, Vec<Result<(), ChatError>>>>,
    /// Message text whose first delivery blocks until `release` fires.
    hold: Option<(String, Arc<Notify>, Arc<Notify>)>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProcessor {
    fn script(self, text: &str, outcomes: Vec<Result<(), ChatError>>) -> Self {
        self.script.lock().unwrap().insert(text.to_owned(), outcomes);
        self
    }

    /// Returns `(started, release)` notifiers for the held message.
    fn hold(mut self, text: &str) -> (Self, Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.hold = Some((text.to_owned(), Arc::clone(&started), Arc::clone(&release)));
        (self, started, release)
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn abandoned(&self) -> Vec<String> {
        self.abandoned.lock().unwrap().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl MessageProcessor for ScriptedProcessor {
    async fn process(&self, message: &Message) -> Result<(), ChatError> {
        let first_call = {
            let mut calls = self.calls.lock().unwrap();
            let first = !calls.contains(&message.text);
            calls.push(message.text.clone());
            first
        };
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some((text, started, release)) = &self.hold {
            if first_call && *text == message.text {
                started.notify_one();
                release.notified().await;
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut script = self.script.lock().unwrap();
        match script.get_mut(&message.text) {
            Some(outcomes) if !outcomes.is_empty() => outcomes.remove(0),
            _ => Ok(()),
        }
    }

    async fn abandoned(&self, message: &Message, error: &ChatError) {
        self.abandoned
            .lock()
            .unwrap()
            .push((message.text.clone(), error.clone()));
    }
}

fn retryable() -> ChatError {
    ChatError::QueueProcessing {
        message: "flaky".into(),
        retryable: true,
    }
}

fn fatal() -> ChatError {
    ChatError::QueueProcessing {
        message: "broken".into(),
        retryable: false,
    }
}

fn queue_with(processor: Arc<ScriptedProcessor>, max_attempts: u32) -> MessageQueue {
    let queue = MessageQueue::new(DeliveryPolicy {
        max_attempts,
        message_timeout: Duration::from_secs(5),
    });
    queue.set_processor(processor);
    queue
}

// ── setup ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_without_processor_is_rejected() {
    let queue = MessageQueue::default();
    let err = queue.add_message(Message::user("hello")).await.unwrap_err();
    assert!(matches!(err, ChatError::ProcessorNotConfigured));
    assert!(queue.is_empty(), "rejected message must not be enqueued");
}

// ── ordering ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delivers_in_fifo_order_while_loop_is_busy() {
    let (processor, started, release) = ScriptedProcessor::default().hold("a");
    let processor = Arc::new(processor);
    let queue = queue_with(Arc::clone(&processor), 3);

    let first = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.add_message(Message::user("a")).await })
    };
    started.notified().await;

    // A loop is running, so these return as soon as they are enqueued.
    queue.add_message(Message::user("b")).await.unwrap();
    queue.add_message(Message::user("c")).await.unwrap();
    assert_eq!(queue.len(), 3);

    release.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(processor.calls(), ["a", "b", "c"]);
    assert!(queue.is_empty());
    assert!(!queue.is_processing());
    assert_eq!(queue.status(), MessageStatus::Sent);
}

#[tokio::test]
async fn retryable_failure_moves_message_behind_queued_ones() {
    let (processor, started, release) = ScriptedProcessor::default()
        .script("a", vec![Err(retryable())])
        .hold("a");
    let processor = Arc::new(processor);
    let queue = queue_with(Arc::clone(&processor), 3);

    let first = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.add_message(Message::user("a")).await })
    };
    started.notified().await;
    queue.add_message(Message::user("b")).await.unwrap();
    queue.add_message(Message::user("c")).await.unwrap();

    release.notify_one();
    first.await.unwrap().unwrap();

    assert_eq!(processor.calls(), ["a", "b", "c", "a"]);
    assert!(processor.abandoned().is_empty());
    assert_eq!(queue.status(), MessageStatus::Sent);
}

// ── failure handling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn non_retryable_failure_is_dropped_without_retry() {
    let processor = Arc::new(ScriptedProcessor::default().script("a", vec![Err(fatal())]));
    let queue = queue_with(Arc::clone(&processor), 3);

    queue.add_message(Message::user("a")).await.unwrap();
    assert_eq!(queue.status(), MessageStatus::Error);

    queue.add_message(Message::user("b")).await.unwrap();
    assert_eq!(processor.calls(), ["a", "b"]);
    assert_eq!(processor.abandoned(), ["a"]);
    assert_eq!(queue.status(), MessageStatus::Sent);
}

#[tokio::test]
async fn retryable_failure_succeeds_on_later_attempt() {
    let processor = Arc::new(
        ScriptedProcessor::default().script("a", vec![Err(retryable()), Err(retryable())]),
    );
    let queue = queue_with(Arc::clone(&processor), 3);

    queue.add_message(Message::user("a")).await.unwrap();
    assert_eq!(processor.calls(), ["a", "a", "a"]);
    assert!(processor.abandoned().is_empty());
    assert_eq!(queue.status(), MessageStatus::Sent);
}

#[tokio::test]
#[traced_test]
async fn gives_up_after_max_attempts() {
    let processor = Arc::new(ScriptedProcessor::default().script(
        "a",
        vec![Err(retryable()), Err(retryable()), Err(retryable()), Err(retryable())],
    ));
    let queue = queue_with(Arc::clone(&processor), 3);

    queue.add_message(Message::user("a")).await.unwrap();
    assert_eq!(processor.calls().len(), 3, "attempts are bounded");
    assert_eq!(processor.abandoned(), ["a"]);
    assert!(queue.is_empty());
    assert_eq!(queue.status(), MessageStatus::Error);
    assert!(logs_contain("giving up on message"));
}

#[tokio::test(start_paused = true)]
async fn slow_processor_times_out() {
    let processor = Arc::new(ScriptedProcessor {
        delay: Some(Duration::from_secs(60)),
        ..Default::default()
    });
    let queue = MessageQueue::new(DeliveryPolicy {
        max_attempts: 2,
        message_timeout: Duration::from_secs(1),
    });
    queue.set_processor(Arc::clone(&processor) as Arc<dyn MessageProcessor>);

    queue.add_message(Message::user("slow")).await.unwrap();

    assert_eq!(processor.calls(), ["slow", "slow"]);
    let abandoned = processor.abandoned.lock().unwrap();
    assert!(matches!(abandoned[0].1, ChatError::Timeout(d) if d == Duration::from_secs(1)));
}

// ── clearing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clear_stops_further_dequeues_and_resets_status() {
    let (processor, started, release) = ScriptedProcessor::default().hold("a");
    let processor = Arc::new(processor);
    let queue = queue_with(Arc::clone(&processor), 3);

    let first = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.add_message(Message::user("a")).await })
    };
    started.notified().await;
    queue.add_message(Message::user("b")).await.unwrap();

    queue.clear_queue();
    assert!(queue.is_empty());
    assert_eq!(queue.status(), MessageStatus::Pending);

    // The in-flight call is not cancelled, but nothing after it runs.
    release.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(processor.calls(), ["a"]);
    assert_eq!(queue.status(), MessageStatus::Pending);

    // The queue resumes on the next insertion.
    queue.add_message(Message::user("c")).await.unwrap();
    assert_eq!(processor.calls(), ["a", "c"]);
}

#[tokio::test]
async fn calls_never_overlap_across_clear_and_new_message() {
    let (processor, started, release) = ScriptedProcessor::default().hold("a");
    let processor = Arc::new(processor);
    let queue = queue_with(Arc::clone(&processor), 3);

    let first = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.add_message(Message::user("a")).await })
    };
    started.notified().await;

    queue.clear_queue();
    let second = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.add_message(Message::user("b")).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(processor.calls(), ["a"], "new loop waits for the call in flight");

    release.notify_one();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(processor.calls(), ["a", "b"]);
    assert_eq!(processor.max_in_flight(), 1);
    assert_eq!(queue.status(), MessageStatus::Sent);
}

#[tokio::test]
async fn status_subscription_observes_outcomes() {
    let processor = Arc::new(ScriptedProcessor::default().script("bad", vec![Err(fatal())]));
    let queue = queue_with(processor, 1);
    let mut rx = queue.subscribe_status();

    queue.add_message(Message::user("bad")).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(*rx.borrow_and_update(), MessageStatus::Error);
}
