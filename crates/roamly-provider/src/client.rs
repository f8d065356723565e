//! HTTP client for the marketplace partner REST API.
//!
//! Wraps `reqwest` with API-key management, typed response deserialization,
//! and bounded retry. All endpoint methods go through the retry loop in
//! [`crate::retry`], so callers see either a parsed response or the last
//! error after the budget is exhausted.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use crate::error::ProviderError;
use crate::retry::retry_with_backoff;
use crate::types::{
    DestinationListEnvelope, DestinationListing, ProductSearchRequest, ProductSearchResponse,
    TagListEnvelope, TagListing,
};

const DEFAULT_BASE_URL: &str = "https://api.tourstream.io/partner/";
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 60;

/// Retry budget for a single logical call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}

/// Client for the marketplace partner REST API.
///
/// Manages the HTTP client, API key, base URL, and retry policy. Use
/// [`MarketplaceClient::new`] for production or
/// [`MarketplaceClient::with_base_url`] to point at a mock server in tests.
pub struct MarketplaceClient {
    client: Client,
    api_key: String,
    base_url: Url,
    retry: RetryPolicy,
}

impl MarketplaceClient {
    /// Creates a new client pointed at the production marketplace API.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(api_key: &str, timeout_secs: u64) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, timeout_secs, DEFAULT_BASE_URL)
    }

    /// Creates a new client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ProviderError::Status`] if `base_url` is
    /// not a valid URL.
    pub fn with_base_url(
        api_key: &str,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("roamly/0.1 (activities-search)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends path segments instead of replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ProviderError::InvalidBaseUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the default retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Searches activity products for a destination.
    ///
    /// Calls `POST products/search` with the provider's filtering envelope.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::RateLimited`] / [`ProviderError::Status`] 5xx /
    ///   [`ProviderError::Http`] once the retry budget is exhausted.
    /// - [`ProviderError::Status`] 4xx immediately, without retry.
    /// - [`ProviderError::Deserialize`] if the response does not match the
    ///   expected shape.
    pub async fn search_products(
        &self,
        request: &ProductSearchRequest,
        language: &str,
    ) -> Result<ProductSearchResponse, ProviderError> {
        let url = self.endpoint("products/search");
        let body = serde_json::to_value(request).map_err(|e| ProviderError::Deserialize {
            context: "products/search request".to_owned(),
            source: e,
        })?;

        retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || {
            self.post_json::<ProductSearchResponse>(url.clone(), &body, language)
        })
        .await
    }

    /// Fetches the complete category taxonomy in one pass.
    ///
    /// # Errors
    ///
    /// Same surface as [`MarketplaceClient::search_products`].
    pub async fn list_tags(&self, language: &str) -> Result<Vec<TagListing>, ProviderError> {
        let url = self.endpoint("products/tags");
        let envelope = retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || {
            self.get_json::<TagListEnvelope>(url.clone(), language)
        })
        .await?;
        Ok(envelope.tags)
    }

    /// Fetches the complete destination (place) listing.
    ///
    /// # Errors
    ///
    /// Same surface as [`MarketplaceClient::search_products`].
    pub async fn list_destinations(&self) -> Result<Vec<DestinationListing>, ProviderError> {
        let url = self.endpoint("destinations");
        let envelope = retry_with_backoff(self.retry.max_retries, self.retry.backoff_base_ms, || {
            self.get_json::<DestinationListEnvelope>(url.clone(), "en")
        })
        .await?;
        Ok(envelope.destinations)
    }

    /// Resolves an endpoint path against the normalised base URL.
    fn endpoint(&self, path: &str) -> Url {
        // The base URL is validated at construction and `path` is a static
        // relative segment, so join cannot fail here.
        self.base_url
            .join(path)
            .unwrap_or_else(|_| self.base_url.clone())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        language: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(url.clone())
            .header("x-api-key", &self.api_key)
            .header("Accept-Language", language)
            .send()
            .await?;
        Self::parse_response(url, response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        body: &serde_json::Value,
        language: &str,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .post(url.clone())
            .header("x-api-key", &self.api_key)
            .header("Accept-Language", language)
            .json(body)
            .send()
            .await?;
        Self::parse_response(url, response).await
    }

    /// Maps a raw response into the typed result or the error taxonomy:
    /// 429 → `RateLimited` with the server's wait, other non-2xx → `Status`,
    /// unparseable body → `Deserialize`.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        url: Url,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> MarketplaceClient {
        MarketplaceClient::with_base_url("test-key", 30, base_url)
            .expect("client construction should not fail")
    }

    #[test]
    fn endpoint_joins_relative_paths() {
        let client = test_client("https://api.tourstream.io/partner");
        let url = client.endpoint("products/search");
        assert_eq!(
            url.as_str(),
            "https://api.tourstream.io/partner/products/search"
        );
    }

    #[test]
    fn endpoint_normalises_trailing_slash() {
        let client = test_client("https://api.tourstream.io/partner///");
        let url = client.endpoint("destinations");
        assert_eq!(
            url.as_str(),
            "https://api.tourstream.io/partner/destinations"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let result = MarketplaceClient::with_base_url("key", 30, "not a url");
        assert!(matches!(result, Err(ProviderError::InvalidBaseUrl(_))));
    }
}
