//! Shared vocabulary for the Scope 3 assistant chat core.
//!
//! Everything here is plain data: messages and their lifecycle status, the
//! per-query [`MessageContext`], insight records and the RAG query wire
//! types. Behaviour lives in `scope3-chat`.

pub mod context;
pub mod insight;
pub mod message;
pub mod query;

pub use context::{HistoryEntry, MessageContext};
pub use insight::Insight;
pub use message::{Message, MessageId, MessageStatus, Metadata, Sender};
pub use query::{QueryOptions, QueryRequest, QueryResponse};
