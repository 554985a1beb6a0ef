use thiserror::Error;

const MAX_MESSAGE_CHARS: usize = 200;

/// Errors returned by the OAuth service and the CRM REST client.
#[derive(Debug, Error)]
pub enum CrmError {
    /// Network, TLS or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The CRM answered with a non-2xx status.
    #[error("CRM API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// An OAuth credential needed for this call is not configured.
    #[error("missing OAuth {0}")]
    MissingCredential(&'static str),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl CrmError {
    /// Builds an [`CrmError::Api`] from a status and a raw response body,
    /// keeping the message short enough to log.
    pub(crate) fn api(status: u16, body: &str) -> Self {
        let trimmed = body.trim();
        let message = if trimmed.is_empty() {
            format!("HTTP {status}")
        } else {
            trimmed.chars().take(MAX_MESSAGE_CHARS).collect()
        };
        CrmError::Api { status, message }
    }

    /// `true` when the CRM rejected the access token.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CrmError::Api { status: 401, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_uses_status_for_blank_body() {
        let err = CrmError::api(503, "  ");
        assert!(matches!(err, CrmError::Api { status: 503, ref message } if message == "HTTP 503"));
    }

    #[test]
    fn api_error_truncates_long_body() {
        let err = CrmError::api(400, &"e".repeat(1_000));
        match err {
            CrmError::Api { message, .. } => assert_eq!(message.len(), MAX_MESSAGE_CHARS),
            other => panic!("expected Api, got: {other:?}"),
        }
    }

    #[test]
    fn only_401_counts_as_unauthorized() {
        assert!(CrmError::api(401, "Invalid JWT").is_unauthorized());
        assert!(!CrmError::api(403, "forbidden").is_unauthorized());
        assert!(!CrmError::MissingCredential("client id").is_unauthorized());
    }
}
