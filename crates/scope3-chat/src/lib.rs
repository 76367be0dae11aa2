//! Chat core of the Scope 3 assistant.
//!
//! - [`MessageQueue`] delivers messages one at a time with bounded retry.
//! - [`ChatService`] owns the conversation and drives tour / interactive mode.
//! - [`TourController`] plays the insight walkthrough and hands control to
//!   the conversation when it ends.
//! - [`ContextBuilder`] assembles the context sent with each query.
//!
//! Network access goes through the [`InsightService`] and [`QueryService`]
//! traits; `scope3-client` implements them over HTTP.

pub mod collab;
pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod events;
pub mod queue;
pub mod tour;

#[cfg(test)]
mod test_support;

pub use collab::{InsightService, QueryService};
pub use config::ChatConfig;
pub use context::ContextBuilder;
pub use conversation::{ChatService, ChatState};
pub use error::ChatError;
pub use events::{ChatEvent, EventBus};
pub use queue::{DeliveryPolicy, MessageProcessor, MessageQueue};
pub use tour::{TourController, TourStep};
