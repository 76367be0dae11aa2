//! Chat core configuration, loaded from environment variables.

use std::time::Duration;

use scope3_types::QueryOptions;

/// Runtime configuration for the chat core.
///
/// Every field has a default so the core works without any environment
/// variables set.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the RAG query service (default: `"http://localhost:5000"`).
    pub rag_api_url: String,

    /// Base URL of the API gateway serving insights and explanations
    /// (default: `"http://localhost:3000"`).
    pub api_url: String,

    /// Maximum number of history entries sent with a query.
    pub max_history: usize,

    /// Maximum delivery attempts per message before the queue gives up.
    pub retry_attempts: u32,

    /// Upper bound on a single processor invocation.
    pub message_timeout: Duration,

    /// Generation options sent with every query.
    pub query_options: QueryOptions,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rag_api_url: "http://localhost:5000".to_owned(),
            api_url: "http://localhost:3000".to_owned(),
            max_history: 50,
            retry_attempts: 3,
            message_timeout: Duration::from_secs(30),
            query_options: QueryOptions::default(),
        }
    }
}

impl ChatConfig {
    /// Build [`ChatConfig`] from `SCOPE3_*` environment variables, falling
    /// back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            rag_api_url: env_or("SCOPE3_RAG_API_URL", &defaults.rag_api_url),
            api_url: env_or("SCOPE3_API_URL", &defaults.api_url),
            max_history: parse_env("SCOPE3_MAX_HISTORY", defaults.max_history),
            retry_attempts: parse_env("SCOPE3_RETRY_ATTEMPTS", defaults.retry_attempts).max(1),
            message_timeout: Duration::from_millis(parse_env(
                "SCOPE3_MESSAGE_TIMEOUT_MS",
                defaults.message_timeout.as_millis() as u64,
            )),
            query_options: QueryOptions {
                use_moe: std::env::var("SCOPE3_USE_MOE")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(defaults.query_options.use_moe),
                max_tokens: parse_env("SCOPE3_MAX_TOKENS", defaults.query_options.max_tokens),
                temperature: parse_env("SCOPE3_TEMPERATURE", defaults.query_options.temperature),
            },
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
