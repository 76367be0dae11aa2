//! In-memory collaborators shared by the conversation and walkthrough tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scope3_types::{Insight, QueryRequest, QueryResponse};
use serde_json::Value;
use tokio::sync::Notify;

use crate::collab::{InsightService, QueryService};
use crate::config::ChatConfig;
use crate::conversation::ChatService;
use crate::error::ChatError;
use crate::events::EventBus;

/// Insight source with canned insights and explanations.
///
/// Explanations are looked up by the context's `category` key, falling back
/// to its `message` key. A missing entry fails with [`ChatError::Insight`].
#[derive(Default)]
pub(crate) struct FakeInsights {
    insights: Mutex<Option<Result<Vec<Insight>, ChatError>>>,
    explanations: Mutex<HashMap<String, String>>,
    /// Explanation key that blocks until the paired notifier fires.
    hold: Mutex<Option<(String, Arc<Notify>)>>,
    explanation_calls: Mutex<Vec<Value>>,
}

impl FakeInsights {
    pub(crate) fn with_insights(self, insights: Vec<Insight>) -> Self {
        *self.insights.lock().unwrap() = Some(Ok(insights));
        self
    }

    pub(crate) fn failing_insights(self, error: ChatError) -> Self {
        *self.insights.lock().unwrap() = Some(Err(error));
        self
    }

    pub(crate) fn explain(self, key: &str, text: &str) -> Self {
        self.explanations
            .lock()
            .unwrap()
            .insert(key.to_owned(), text.to_owned());
        self
    }

    /// Make the explanation for `key` wait on the returned notifier.
    pub(crate) fn hold(&self, key: &str) -> Arc<Notify> {
        let release = Arc::new(Notify::new());
        *self.hold.lock().unwrap() = Some((key.to_owned(), Arc::clone(&release)));
        release
    }

    pub(crate) fn explanation_calls(&self) -> Vec<Value> {
        self.explanation_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InsightService for FakeInsights {
    async fn get_insights(&self) -> Result<Vec<Insight>, ChatError> {
        self.insights.lock().unwrap().clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn generate_explanation(&self, context: Value) -> Result<String, ChatError> {
        self.explanation_calls.lock().unwrap().push(context.clone());
        let key = context
            .get("category")
            .or_else(|| context.get("message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        let held = self
            .hold
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(k, _)| *k == key)
            .map(|(_, release)| Arc::clone(release));
        if let Some(release) = held {
            release.notified().await;
        }

        self.explanations
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| ChatError::Insight {
                message: format!("no explanation for {key:?}"),
            })
    }
}

/// Query backend replaying scripted outcomes front to back.
///
/// Once the script runs dry every call answers with an empty response.
#[derive(Default)]
pub(crate) struct FakeQuery {
    outcomes: Mutex<VecDeque<Result<QueryResponse, ChatError>>>,
    requests: Mutex<Vec<QueryRequest>>,
    /// Delay applied to the first call only.
    stall: Mutex<Option<Duration>>,
    /// `(started, release)` pair gating the first call.
    gate: Mutex<Option<(Arc<Notify>, Arc<Notify>)>>,
}

impl FakeQuery {
    pub(crate) fn respond(self, response: Value) -> Self {
        let parsed = serde_json::from_value(response).unwrap();
        self.outcomes.lock().unwrap().push_back(Ok(parsed));
        self
    }

    pub(crate) fn fail(self, error: ChatError) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    pub(crate) fn stall_first(self, delay: Duration) -> Self {
        *self.stall.lock().unwrap() = Some(delay);
        self
    }

    /// Block the first call until `release` fires; `started` fires when it
    /// arrives. Returns `(started, release)`.
    pub(crate) fn hold_first(&self) -> (Arc<Notify>, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some((Arc::clone(&started), Arc::clone(&release)));
        (started, release)
    }

    pub(crate) fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryService for FakeQuery {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, ChatError> {
        self.requests.lock().unwrap().push(request);
        let stall = self.stall.lock().unwrap().take();
        if let Some(delay) = stall {
            tokio::time::sleep(delay).await;
        }
        let gate = self.gate.lock().unwrap().take();
        if let Some((started, release)) = gate {
            started.notify_one();
            release.notified().await;
        }
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(QueryResponse::default()))
    }
}

pub(crate) fn transport_insight() -> Insight {
    Insight::new("Transport", 500.0, 50.0)
}

/// Service over the given fakes with a single delivery attempt per message.
pub(crate) fn chat_service(insights: Arc<FakeInsights>, query: Arc<FakeQuery>) -> ChatService {
    let config = ChatConfig {
        retry_attempts: 1,
        ..ChatConfig::default()
    };
    ChatService::new(config, insights, query, EventBus::new())
}
