//! Turning query outcomes into user-visible text.

use scope3_types::{Metadata, QueryResponse};
use serde_json::Value;

use crate::error::ChatError;

/// Reply used when the backend flagged the query with an `error` field.
pub const UNABLE_TO_PROCESS: &str = "I'm not able to process that request right now. \
     Could you try asking something about scope 3 emissions or the dashboard?";

/// Reply used when no expert produced any usable text.
pub const CAPABILITY_FALLBACK: &str = "I specialize in scope 3 emissions and dashboard analysis. \
     While I can engage in general conversation, I can provide the most value when discussing \
     these topics. What would you like to know about emissions or the dashboard?";

const ERROR_PREFIX: &str = "I encountered an error. ";
const UNREACHABLE: &str =
    "Unable to connect to the AI service. Please ensure the service is running and try again.";
const TRY_AGAIN: &str = "There was an issue processing your request. Please try again in a moment.";
const REPHRASE: &str = "While I specialize in scope 3 emissions and dashboard analysis, I aim to be \
     helpful with any query. Could you try rephrasing your question?";

/// Pick the bot reply text.
///
/// Precedence: top-level `response`, then `expert_responses.narrative`, then
/// `analysis.scope3.summary`, then [`CAPABILITY_FALLBACK`].
pub fn reply_text(response: &QueryResponse) -> String {
    if response.error.as_ref().is_some_and(|e| !e.is_null()) {
        return UNABLE_TO_PROCESS.to_owned();
    }

    response
        .response
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::to_owned)
        .or_else(|| {
            response
                .expert_responses
                .as_ref()
                .and_then(|experts| experts.get("narrative"))
                .and_then(text_of)
        })
        .or_else(|| {
            response
                .analysis
                .as_ref()
                .and_then(|a| a.pointer("/scope3/summary"))
                .and_then(text_of)
        })
        .unwrap_or_else(|| CAPABILITY_FALLBACK.to_owned())
}

/// Metadata stored on the final bot message.
pub fn reply_metadata(response: &QueryResponse) -> Metadata {
    let experts_used = response
        .metadata
        .as_ref()
        .and_then(|m| m.get("experts_used"))
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    let mut metadata = Metadata::new();
    metadata.insert("experts_used".to_owned(), experts_used);
    metadata.insert(
        "confidence".to_owned(),
        Value::from(response.confidence.unwrap_or(0.0)),
    );
    metadata
}

/// User-facing text for a failed query.
pub fn error_text(error: &ChatError) -> String {
    let detail = match error {
        ChatError::RagApi { .. } if error.is_unreachable() => UNREACHABLE,
        ChatError::RagApi { .. } => TRY_AGAIN,
        _ => REPHRASE,
    };
    format!("{ERROR_PREFIX}{detail}")
}

/// An expert answer is either a bare string or an object carrying one.
fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => ["response", "content", "text", "summary"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    }?;
    (!text.trim().is_empty()).then(|| text.to_owned())
}
