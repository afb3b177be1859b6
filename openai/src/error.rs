use std::time::Duration;

/// Errors that can arise when calling the `OpenAI` API.
#[derive(Debug, thiserror::Error)]
pub enum OpenAIError {
    /// Transport-level failure (connection, TLS, DNS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// API contract violations or unsupported operations.
    #[error("{0}")]
    Api(String),
    /// Rate limit exceeded (HTTP 429).
    #[error("rate limit exceeded: {message}{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimit {
        /// Message from the API.
        message: String,
        /// Suggested retry delay from the `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// Server error (HTTP 5xx).
    #[error("server error {status}: {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
    },
    /// Request timed out.
    #[error("request timed out")]
    Timeout,
}
