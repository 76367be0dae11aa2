use scope3_chat::ChatError;
use thiserror::Error;

/// Errors that can be returned by the HTTP collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or its body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have any of the accepted shapes.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },
}

impl ClientError {
    /// HTTP status of the failure; `0` when no response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http(err) if err.is_connect() || err.is_timeout() => Some(0),
            ClientError::Http(err) => err.status().map(|s| s.as_u16()),
            ClientError::Status { status, .. } => Some(*status),
            ClientError::InvalidResponse { .. } => None,
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self.status() {
            Some(0) | Some(429) => true,
            Some(status) => (500..600).contains(&status),
            None => false,
        }
    }

    /// Map a failure of the RAG query service.
    pub fn into_rag_error(self) -> ChatError {
        ChatError::RagApi {
            status: self.status(),
            retryable: self.is_retryable(),
            message: self.to_string(),
        }
    }

    /// Map a failure of the insight or explanation endpoints.
    pub fn into_insight_error(self) -> ChatError {
        ChatError::Insight {
            message: self.to_string(),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::InvalidResponse {
            message: err.to_string(),
        }
    }
}
