//! Resolution-and-orchestration pipeline for activity search.
//!
//! Turns an ambiguous location input (place name, coordinates, or an opaque
//! destination id), a date range, and free-text category hints into a
//! deterministic marketplace query, served cache-aside: resolve → fingerprint
//! → cache check → bounded upstream fetch → transform → write-through.

mod error;
mod fingerprint;
mod location;
mod mapper;
mod orchestrator;
mod taxonomy;
mod types;

pub use error::SearchError;
pub use fingerprint::cache_key;
pub use location::{sync_destinations, DestinationSyncReport, LocationResolver};
pub use mapper::map_product_summary;
pub use orchestrator::SearchOrchestrator;
pub use taxonomy::{SyncReport, TaxonomyEntry, TaxonomyIndex};
pub use types::{
    Activity, ActivityDuration, ActivityImage, ActivityPricing, ActivityRating, CacheInfo,
    DateRange, DurationRange, GeoInput, ImageVariants, LocationInput, LocationSpecifier,
    Pagination, PriceRange, ResolvedLocation, SearchFilters, SearchRequest, SearchResponse,
    SearchResults, SortBy, SortOrder, SortSpec, MAX_PAGE_LIMIT,
};
