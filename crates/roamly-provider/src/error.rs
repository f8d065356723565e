use thiserror::Error;

/// Errors returned by the marketplace API client.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429; the server supplied a minimum wait before the next attempt.
    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// A non-2xx, non-429 status from the provider.
    #[error("unexpected HTTP status {status} from provider: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The configured base URL does not parse.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl ProviderError {
    /// True for statuses the caller should treat as permanent rejections
    /// (4xx other than rate limit).
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::Status { status, .. } => (400..500).contains(status),
            ProviderError::Deserialize { .. } | ProviderError::InvalidBaseUrl(_) => true,
            ProviderError::Http(_) | ProviderError::RateLimited { .. } => false,
        }
    }
}
