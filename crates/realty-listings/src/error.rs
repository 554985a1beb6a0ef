use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Errors raised on the remote listing path.
///
/// None of these reach the end user of a search; [`crate::ListingSearch`]
/// absorbs them and serves the fallback dataset instead.
#[derive(Debug, Error)]
pub enum ListingsError {
    /// Network, TLS or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {endpoint}: {message}")]
    UnexpectedStatus {
        status: u16,
        endpoint: String,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("trigger response did not include a snapshot_id")]
    MissingSnapshotId,

    #[error("snapshot payload was empty")]
    EmptyPayload,

    #[error("snapshot payload has no recognized listing array (top-level keys: {keys})")]
    UnrecognizedPayload { keys: String },

    #[error("invalid base URL '{base_url}': {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

static STATUS_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{3})\b").expect("valid status regex"));

static CANNOT_ROUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Cannot (GET|POST|PUT|DELETE) ([^\s<]+)").expect("valid route regex")
});

const MAX_MESSAGE_CHARS: usize = 200;

/// Reduces an error response body to a short, log-friendly message.
///
/// Upstream gateways sometimes answer with a full HTML error page. Those are
/// collapsed to `API Error <status>: Cannot <VERB> <path>` when the route can
/// be recovered, or `API Error <status>` otherwise. Plain bodies are trimmed
/// and truncated to 200 characters.
#[must_use]
pub fn clean_error_message(status: u16, body: &str) -> String {
    let lowered = body.to_ascii_lowercase();
    if lowered.contains("<!doctype html") || lowered.contains("<html") {
        let code = STATUS_CODE
            .captures(body)
            .and_then(|c| c.get(1))
            .map_or_else(|| status.to_string(), |m| m.as_str().to_string());
        return match CANNOT_ROUTE.find(body) {
            Some(route) => format!("API Error {code}: {}", route.as_str()),
            None => format!("API Error {code}"),
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("API Error {status}");
    }
    trimmed.chars().take(MAX_MESSAGE_CHARS).collect()
}
