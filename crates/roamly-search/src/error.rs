use roamly_provider::ProviderError;
use thiserror::Error;

/// Failure taxonomy for the search pipeline.
///
/// Every variant maps to a distinct, stable error code so callers can always
/// tell "no matches" from "something broke". `Validation` and
/// `LocationNotFound` are terminal, reportable outcomes; the rest are
/// service-level failures.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The request failed boundary validation before any resolution ran.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The resolver found no sufficiently confident match for the location.
    #[error("location not found: {query}")]
    LocationNotFound { query: String },

    /// Retry-exhausted network failure, 5xx, or rate limit from the provider.
    #[error("upstream provider unavailable: {0}")]
    UpstreamTransient(String),

    /// Non-retryable provider rejection (4xx other than rate limit).
    #[error("upstream provider rejected the request: {0}")]
    UpstreamPermanent(String),

    /// Connectivity failure against the place catalog or another store the
    /// request cannot be served without.
    #[error("backing store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

impl SearchError {
    /// Classify a provider error into the transient/permanent split.
    #[must_use]
    pub fn from_provider(err: ProviderError) -> Self {
        if err.is_permanent() {
            SearchError::UpstreamPermanent(err.to_string())
        } else {
            SearchError::UpstreamTransient(err.to_string())
        }
    }

    /// Stable machine-readable code for this failure mode.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::Validation(_) => "validation_error",
            SearchError::LocationNotFound { .. } => "location_not_found",
            SearchError::UpstreamTransient(_) => "upstream_unavailable",
            SearchError::UpstreamPermanent(_) => "upstream_rejected",
            SearchError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_rate_limit_is_transient() {
        let err = SearchError::from_provider(ProviderError::RateLimited {
            retry_after_secs: 5,
        });
        assert!(matches!(err, SearchError::UpstreamTransient(_)));
        assert_eq!(err.code(), "upstream_unavailable");
    }

    #[test]
    fn provider_client_error_is_permanent() {
        let err = SearchError::from_provider(ProviderError::Status {
            status: 403,
            body: "forbidden".to_string(),
        });
        assert!(matches!(err, SearchError::UpstreamPermanent(_)));
        assert_eq!(err.code(), "upstream_rejected");
    }

    #[test]
    fn codes_are_distinct() {
        use std::collections::HashSet;
        let codes: HashSet<&str> = [
            SearchError::Validation(String::new()).code(),
            SearchError::LocationNotFound {
                query: String::new(),
            }
            .code(),
            SearchError::UpstreamTransient(String::new()).code(),
            SearchError::UpstreamPermanent(String::new()).code(),
        ]
        .into_iter()
        .collect();
        assert_eq!(codes.len(), 4);
    }
}
