//! Host configuration: `SCOPE3_*` environment variables, overridden by
//! command-line flags.

use std::time::Duration;

use clap::Parser;
use scope3_chat::ChatConfig;

/// Terminal host for the Scope 3 emissions assistant.
#[derive(Debug, Parser)]
#[command(name = "scope3-assistant")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Base URL of the RAG query service [env: SCOPE3_RAG_API_URL]
    #[arg(long, value_name = "URL")]
    pub rag_api_url: Option<String>,

    /// Base URL of the API gateway serving insights [env: SCOPE3_API_URL]
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// History entries sent with each query [env: SCOPE3_MAX_HISTORY]
    #[arg(long, value_name = "N")]
    pub max_history: Option<usize>,

    /// Delivery attempts per message [env: SCOPE3_RETRY_ATTEMPTS]
    #[arg(long, value_name = "N")]
    pub retry_attempts: Option<u32>,

    /// Per-message processing timeout [env: SCOPE3_MESSAGE_TIMEOUT_MS]
    #[arg(long, value_name = "MS")]
    pub message_timeout_ms: Option<u64>,

    /// Start in interactive mode without playing the walkthrough
    #[arg(long)]
    pub no_tour: bool,

    /// `tracing` filter, e.g. `info` or `debug,reqwest=warn` [env: SCOPE3_LOG]
    #[arg(long, value_name = "FILTER")]
    pub log: Option<String>,

    /// Emit log records as newline-delimited JSON [env: SCOPE3_LOG_JSON]
    #[arg(long)]
    pub log_json: bool,
}

/// Everything the host needs at startup.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub chat: ChatConfig,
    pub log_level: String,
    pub log_json: bool,
    pub play_tour: bool,
}

impl HostConfig {
    pub fn load(args: Args) -> Self {
        let mut chat = ChatConfig::from_env();
        if let Some(url) = args.rag_api_url {
            chat.rag_api_url = url;
        }
        if let Some(url) = args.api_url {
            chat.api_url = url;
        }
        if let Some(n) = args.max_history {
            chat.max_history = n;
        }
        if let Some(n) = args.retry_attempts {
            chat.retry_attempts = n.max(1);
        }
        if let Some(ms) = args.message_timeout_ms {
            chat.message_timeout = Duration::from_millis(ms);
        }

        Self {
            chat,
            log_level: args
                .log
                .unwrap_or_else(|| std::env::var("SCOPE3_LOG").unwrap_or_else(|_| "info".to_owned())),
            log_json: args.log_json
                || std::env::var("SCOPE3_LOG_JSON")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
            play_tour: !args.no_tour,
        }
    }
}
