//! Wire types for the RAG query endpoint.
//!
//! Every response field is optional and nested parts stay raw JSON; the
//! shape depends on which experts answered.

use serde::{Deserialize, Serialize};

use crate::context::MessageContext;
use crate::message::Metadata;

/// Generation options sent with every query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Ask the backend to route through its mixture of experts.
    pub use_moe: bool,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            use_moe: true,
            max_tokens: 250,
            temperature: 0.2,
        }
    }
}

/// Request body for `POST <rag>/query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    /// The built [`MessageContext`] plus a `query` field echoing `text`.
    pub context: serde_json::Value,
    pub options: QueryOptions,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>, context: &MessageContext, options: QueryOptions) -> Self {
        let text = text.into();
        let mut body = match serde_json::to_value(context) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Metadata::new(),
        };
        body.insert("query".to_owned(), serde_json::Value::String(text.clone()));
        Self {
            text,
            context: serde_json::Value::Object(body),
            options,
        }
    }
}

/// Response body of `POST <rag>/query`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Per-expert answers keyed by expert name (`narrative`, `scope3`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expert_responses: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Set by the backend when it rejected the query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}
