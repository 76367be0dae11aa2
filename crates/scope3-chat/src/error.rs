use std::time::Duration;

use thiserror::Error;

/// Errors produced by the chat core and its collaborators.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    /// `add_message` was called before a processor was registered.
    #[error("message processor not configured")]
    ProcessorNotConfigured,

    /// A processor step failed; reported through the queue status signal.
    #[error("queue processing failed: {message}")]
    QueueProcessing { message: String, retryable: bool },

    /// The RAG query service failed. `status == Some(0)` means no
    /// connection could be made.
    #[error("rag api error (status {status:?}): {message}")]
    RagApi {
        message: String,
        status: Option<u16>,
        retryable: bool,
    },

    /// The insight or explanation service failed.
    #[error("insight service error: {message}")]
    Insight { message: String },

    /// A processor invocation exceeded the configured message timeout.
    #[error("message processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ChatError {
    /// Whether the message queue should re-queue the message.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChatError::QueueProcessing { retryable, .. } => *retryable,
            ChatError::RagApi { retryable, .. } => *retryable,
            ChatError::Timeout(_) => true,
            ChatError::ProcessorNotConfigured | ChatError::Insight { .. } | ChatError::Unknown(_) => {
                false
            }
        }
    }

    /// `true` for a RAG failure where the service could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ChatError::RagApi { status: Some(0), .. })
    }

    /// Short machine-readable code stored in error message metadata.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::ProcessorNotConfigured => "PROCESSOR_NOT_SET",
            ChatError::QueueProcessing { .. } => "QUEUE_ERROR",
            ChatError::RagApi { .. } => "RAG_API_ERROR",
            ChatError::Insight { .. } => "INSIGHT_ERROR",
            ChatError::Timeout(_) => "TIMEOUT",
            ChatError::Unknown(_) => "UNKNOWN",
        }
    }
}
