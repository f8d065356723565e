//! HTTP client for the upstream activities-marketplace partner API.
//!
//! Wraps `reqwest` with typed endpoints, an explicit error taxonomy that
//! separates retryable from non-retryable failures, and bounded retry with
//! exponential backoff. Rate-limit responses carry the server-specified
//! minimum wait, which takes precedence over the computed backoff.

mod client;
mod error;
mod retry;
mod types;

pub use client::{MarketplaceClient, RetryPolicy};
pub use error::ProviderError;
pub use types::{
    DestinationListing, DurationBounds, GeoPoint, ImageVariant, PricingSummary,
    ProductDestinationRef, ProductDuration, ProductImage, ProductPricing, ProductReviews,
    ProductSearchRequest, ProductSearchResponse, ProductSummary, RatingFrom, SearchFiltering,
    SearchPagination, SearchSorting, TagListing,
};
