//! reqwest-backed implementation of the chat core's collaborator traits.
//!
//! | Endpoint                              | Used by                          |
//! |---------------------------------------|----------------------------------|
//! | `GET {api}/api/insights`              | [`InsightService::get_insights`] |
//! | `POST {api}/api/generateExplanation`  | explanations for the walkthrough |
//! | `POST {rag}/query`                    | [`QueryService::query`]          |
//! | `GET {rag}/health`                    | [`Scope3Client::health`]         |
//!
//! [`InsightService::get_insights`]: scope3_chat::InsightService::get_insights
//! [`QueryService::query`]: scope3_chat::QueryService::query

mod client;
pub mod error;

pub use client::{HealthStatus, Scope3Client};
pub use error::ClientError;
