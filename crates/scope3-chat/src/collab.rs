//! Collaborator seams.
//!
//! The chat core never talks HTTP itself; it consumes these two traits.
//! `scope3-client` provides the network implementation and tests use
//! in-memory fakes.

use async_trait::async_trait;
use scope3_types::{Insight, QueryRequest, QueryResponse};

use crate::error::ChatError;

/// Source of aggregated emissions insights and generated explanations.
#[async_trait]
pub trait InsightService: Send + Sync {
    /// Current insight records, one per emissions category.
    async fn get_insights(&self) -> Result<Vec<Insight>, ChatError>;

    /// Generate a natural-language explanation for `context`.
    async fn generate_explanation(&self, context: serde_json::Value) -> Result<String, ChatError>;
}

/// RAG / mixture-of-experts query backend.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, ChatError>;
}
