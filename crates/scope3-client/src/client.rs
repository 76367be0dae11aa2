use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use scope3_chat::{ChatConfig, ChatError, InsightService, QueryService};
use scope3_types::{Insight, QueryRequest, QueryResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::ClientError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Body of `GET <rag>/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Per-component status reported by the RAG pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// The insights endpoint answers with an envelope, older gateways with a
/// bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum InsightsBody {
    Envelope { insights: Vec<Insight> },
    Bare(Vec<Insight>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExplanationBody {
    Text(String),
    Detailed {
        result: String,
        #[serde(default)]
        #[allow(dead_code)]
        sources: Option<Value>,
    },
}

/// HTTP client for the API gateway and the RAG service.
///
/// Implements both [`InsightService`] and [`QueryService`], so one value can
/// be shared by the chat service and the walkthrough.
#[derive(Debug, Clone)]
pub struct Scope3Client {
    client: Client,
    api_url: String,
    rag_api_url: String,
}

impl Scope3Client {
    /// Build a client for the endpoints in `config`, with the queue's
    /// message timeout as the request timeout.
    pub fn new(config: &ChatConfig) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("scope3-assistant/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.message_timeout)
            .build()?;
        Ok(Self::with_client(client, &config.api_url, &config.rag_api_url))
    }

    pub fn with_client(client: Client, api_url: &str, rag_api_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_owned(),
            rag_api_url: rag_api_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn rag_api_url(&self) -> &str {
        &self.rag_api_url
    }

    /// Fetch the current insight records.
    pub async fn fetch_insights(&self) -> Result<Vec<Insight>, ClientError> {
        let url = format!("{}/api/insights", self.api_url);
        debug!(%url, "fetching insights");
        let body = read_json(self.client.get(&url).send().await?).await?;
        parse_insights(body)
    }

    /// Ask the gateway to explain `context`.
    pub async fn explain(&self, context: Value) -> Result<String, ClientError> {
        let url = format!("{}/api/generateExplanation", self.api_url);
        debug!(%url, "requesting explanation");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "context": context }))
            .send()
            .await?;
        parse_explanation(read_json(response).await?)
    }

    /// Send one query to the RAG service.
    pub async fn send_query(&self, request: &QueryRequest) -> Result<QueryResponse, ClientError> {
        let url = format!("{}/query", self.rag_api_url);
        debug!(%url, text_len = request.text.len(), "sending rag query");
        let body = read_json(self.client.post(&url).json(request).send().await?).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Probe the RAG service.
    ///
    /// An unhealthy service answers 500 with a status body; that body is
    /// returned as `Ok` so callers can show the reported error.
    pub async fn health(&self) -> Result<HealthStatus, ClientError> {
        let url = format!("{}/health", self.rag_api_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        match serde_json::from_str::<HealthStatus>(&text) {
            Ok(health) => Ok(health),
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
                body: text,
            }),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl InsightService for Scope3Client {
    async fn get_insights(&self) -> Result<Vec<Insight>, ChatError> {
        self.fetch_insights().await.map_err(|err| {
            warn!(error = %err, "insight fetch failed");
            err.into_insight_error()
        })
    }

    async fn generate_explanation(&self, context: Value) -> Result<String, ChatError> {
        self.explain(context).await.map_err(|err| {
            warn!(error = %err, "explanation request failed");
            err.into_insight_error()
        })
    }
}

#[async_trait]
impl QueryService for Scope3Client {
    async fn query(&self, request: QueryRequest) -> Result<QueryResponse, ChatError> {
        self.send_query(&request).await.map_err(|err| {
            warn!(error = %err, status = ?err.status(), "rag query failed");
            err.into_rag_error()
        })
    }
}

async fn read_json(response: Response) -> Result<Value, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

fn parse_insights(body: Value) -> Result<Vec<Insight>, ClientError> {
    match serde_json::from_value(body)? {
        InsightsBody::Envelope { insights } | InsightsBody::Bare(insights) => Ok(insights),
    }
}

fn parse_explanation(body: Value) -> Result<String, ClientError> {
    match serde_json::from_value(body) {
        Ok(ExplanationBody::Text(text)) | Ok(ExplanationBody::Detailed { result: text, .. }) => {
            Ok(text)
        }
        Err(_) => Err(ClientError::InvalidResponse {
            message: "explanation is neither a string nor an object with `result`".to_owned(),
        }),
    }
}
