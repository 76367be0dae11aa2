//! Scripted insight walkthrough.
//!
//! The [`TourController`] loads one explanation per insight and exposes them
//! as an ordered list of steps behind a fixed welcome step. While the tour
//! runs the conversation stays in tour mode; completing or skipping the tour
//! hands control to the [`ChatService`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{FuturesOrdered, StreamExt};
use scope3_types::Insight;
use tracing::{debug, info, warn};

use crate::collab::InsightService;
use crate::conversation::ChatService;
use crate::error::ChatError;
use crate::events::{ChatEvent, EventBus};

pub const WELCOME_TITLE: &str = "Welcome";
pub const WELCOME_DESCRIPTION: &str = "Hi! I'm your Scope 3 emissions assistant. \
     Let me walk you through the latest insights from your dashboard.";

/// One page of the walkthrough.
#[derive(Debug, Clone, PartialEq)]
pub struct TourStep {
    pub title: String,
    pub description: String,
    /// The insight this step explains; `None` for the welcome step.
    pub insight: Option<Insight>,
}

impl TourStep {
    pub fn welcome() -> Self {
        Self {
            title: WELCOME_TITLE.to_owned(),
            description: WELCOME_DESCRIPTION.to_owned(),
            insight: None,
        }
    }

    fn for_insight(insight: Insight, explanation: String) -> Self {
        Self {
            title: insight.category.clone(),
            description: explanation,
            insight: Some(insight),
        }
    }
}

#[derive(Debug, Default)]
struct TourState {
    steps: Vec<TourStep>,
    current: usize,
    /// Bumped on every (re)start; results of older loads are discarded.
    generation: u64,
    completed: bool,
}

struct TourInner {
    chat: ChatService,
    insights: Arc<dyn InsightService>,
    events: EventBus,
    state: Mutex<TourState>,
}

/// Drives the walkthrough. Cloning yields another handle to the same tour.
#[derive(Clone)]
pub struct TourController {
    inner: Arc<TourInner>,
}

impl std::fmt::Debug for TourController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("TourController")
            .field("steps", &state.steps.len())
            .field("current", &state.current)
            .field("completed", &state.completed)
            .finish()
    }
}

impl TourController {
    /// Build a controller that reports to `chat` and loads explanations
    /// through the chat's insight service.
    pub fn new(chat: ChatService) -> Self {
        let insights = chat.insight_service();
        Self::with_insight_service(chat, insights)
    }

    pub fn with_insight_service(chat: ChatService, insights: Arc<dyn InsightService>) -> Self {
        let events = chat.events().clone();
        Self {
            inner: Arc::new(TourInner {
                chat,
                insights,
                events,
                state: Mutex::new(TourState::default()),
            }),
        }
    }

    /// Load the walkthrough from scratch.
    ///
    /// The welcome step is available immediately; explanation steps follow
    /// in insight order as their requests finish. Failed explanations are
    /// logged and left out.
    pub async fn start(&self) {
        let generation = {
            let mut state = self.lock_state();
            state.generation = state.generation.wrapping_add(1);
            state.steps = vec![TourStep::welcome()];
            state.current = 0;
            state.completed = false;
            state.generation
        };
        info!(generation, "walkthrough started");
        self.load(generation).await;
    }

    /// Restart the walkthrough and put the conversation back in tour mode.
    ///
    /// Loads from an earlier start keep running, but their results are
    /// dropped.
    pub async fn reinitiate_walkthrough(&self) {
        self.inner.chat.set_tour_complete(false);
        self.start().await;
    }

    pub fn steps(&self) -> Vec<TourStep> {
        self.lock_state().steps.clone()
    }

    pub fn current_index(&self) -> usize {
        self.lock_state().current
    }

    pub fn current_step(&self) -> Option<TourStep> {
        let state = self.lock_state();
        state.steps.get(state.current).cloned()
    }

    pub fn is_last_step(&self) -> bool {
        let state = self.lock_state();
        state.current + 1 >= state.steps.len()
    }

    pub fn is_completed(&self) -> bool {
        self.lock_state().completed
    }

    /// Advance to the next step.
    ///
    /// On the last step this completes the tour instead and returns `None`;
    /// the cursor never moves past the end.
    pub fn next_step(&self) -> Option<TourStep> {
        let next = {
            let mut state = self.lock_state();
            if state.completed {
                return None;
            }
            if state.current + 1 < state.steps.len() {
                state.current += 1;
                state.steps.get(state.current).cloned()
            } else {
                None
            }
        };
        if next.is_none() {
            self.complete();
        }
        next
    }

    /// Finish the tour and switch the conversation to interactive mode.
    pub fn complete(&self) {
        {
            let mut state = self.lock_state();
            if state.completed {
                return;
            }
            state.completed = true;
        }
        info!("walkthrough complete");
        self.inner.chat.set_tour_complete(true);
        self.inner.events.publish(ChatEvent::TourCompleted);
    }

    pub fn skip(&self) {
        debug!("walkthrough skipped");
        self.complete();
    }

    /// Post the current step into the conversation as avatar messages.
    pub async fn present_current_step(&self) -> Result<(), ChatError> {
        match self.current_step() {
            Some(step) => self.inner.chat.add_tour_message(step.description).await,
            None => Ok(()),
        }
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn lock_state(&self) -> MutexGuard<'_, TourState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn load(&self, generation: u64) {
        let insights = match self.inner.insights.get_insights().await {
            Ok(insights) => insights,
            Err(err) => {
                warn!(error = %err, "failed to load insights for walkthrough");
                return;
            }
        };
        debug!(count = insights.len(), "requesting walkthrough explanations");

        let mut pending: FuturesOrdered<_> = insights
            .into_iter()
            .map(|insight| {
                let service = Arc::clone(&self.inner.insights);
                async move {
                    let result = service.generate_explanation(insight.to_value()).await;
                    (insight, result)
                }
            })
            .collect();

        while let Some((insight, result)) = pending.next().await {
            match result {
                Ok(explanation) if !explanation.trim().is_empty() => {
                    let mut state = self.lock_state();
                    if state.generation != generation {
                        debug!(generation, "dropping results of a superseded walkthrough");
                        return;
                    }
                    state.steps.push(TourStep::for_insight(insight, explanation));
                }
                Ok(_) => debug!(category = %insight.category, "empty explanation; step skipped"),
                Err(err) => warn!(
                    category = %insight.category,
                    error = %err,
                    "explanation failed; step skipped"
                ),
            }
        }
    }
}
