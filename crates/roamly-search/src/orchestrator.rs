//! The cache-aside search pipeline.
//!
//! Per request, strictly in order: validate → resolve location → resolve
//! category keywords → fingerprint → cache check → upstream fetch under an
//! overall timeout → transform → write-through (catalog + cache) → return.
//! Cache and catalog failures degrade (miss / skip / log) — correctness never
//! depends on either store being available. Two concurrent identical requests
//! may both miss and both call upstream; results are idempotent and the
//! second cache write simply overwrites the first.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::error::SearchError;
use crate::fingerprint;
use crate::location::LocationResolver;
use crate::mapper::map_product_summary;
use crate::taxonomy::TaxonomyIndex;
use crate::types::{
    Activity, CacheInfo, SearchRequest, SearchResponse, SearchResults, MAX_PAGE_LIMIT,
};
use roamly_core::constants::{provider_order, provider_sort};
use roamly_db::{cache_clear, cache_get, cache_put, upsert_catalog_items, NewCatalogItem};
use roamly_provider::{
    DurationBounds, MarketplaceClient, ProductSearchRequest, RatingFrom, SearchFiltering,
    SearchPagination, SearchSorting,
};

pub struct SearchOrchestrator {
    pool: PgPool,
    client: Arc<MarketplaceClient>,
    resolver: Arc<LocationResolver>,
    taxonomy: Arc<TaxonomyIndex>,
    cache_ttl_secs: u64,
    overall_timeout: Duration,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new(
        pool: PgPool,
        client: Arc<MarketplaceClient>,
        resolver: Arc<LocationResolver>,
        taxonomy: Arc<TaxonomyIndex>,
        cache_ttl_secs: u64,
        overall_timeout_secs: u64,
    ) -> Self {
        Self {
            pool,
            client,
            resolver,
            taxonomy,
            cache_ttl_secs,
            overall_timeout: Duration::from_secs(overall_timeout_secs),
        }
    }

    /// Run one search request through the full pipeline.
    ///
    /// # Errors
    ///
    /// - [`SearchError::Validation`] before any resolution runs.
    /// - [`SearchError::LocationNotFound`] when no confident match exists.
    /// - [`SearchError::StoreUnavailable`] if the place catalog is down.
    /// - [`SearchError::UpstreamTransient`] / [`SearchError::UpstreamPermanent`]
    ///   when the marketplace call fails after the retry budget.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let spec = request.validate()?;

        let resolved = self
            .resolver
            .resolve(&spec)
            .await?
            .ok_or_else(|| SearchError::LocationNotFound {
                query: spec.describe(),
            })?;

        // An empty tag set is not an error: the search proceeds unfiltered.
        let tags = self.resolve_category_tags(&request.filters.categories);

        let cache_key = fingerprint::cache_key(&resolved.destination_id, request);
        if let Some(hit) = self.cache_lookup(&cache_key).await {
            tracing::info!(cache_key = %cache_key, "search cache hit");
            return Ok(SearchResponse {
                location: resolved,
                filters_applied: request.filters.clone(),
                results: hit.results,
                cache: hit.cache,
            });
        }
        tracing::info!(cache_key = %cache_key, "search cache miss");

        let provider_request = build_provider_request(&resolved.destination_id, request, &tags);
        let response = self.fetch_upstream(&provider_request, &request.language).await?;

        let activities: Vec<Activity> = response
            .products
            .iter()
            .map(|product| map_product_summary(product, &self.taxonomy))
            .collect();

        let results = SearchResults {
            total: response.total_count,
            page: request.pagination.page,
            limit: request.pagination.limit,
            activities,
        };

        // Write-through is best-effort on both sides; the fetch already
        // succeeded and the response is served regardless.
        self.persist_catalog(&results.activities, &response.products)
            .await;
        self.cache_store(&cache_key, &results).await;

        Ok(SearchResponse {
            location: resolved,
            filters_applied: request.filters.clone(),
            results,
            cache: CacheInfo::miss(),
        })
    }

    /// Drop cached results, optionally only those for one destination.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::StoreUnavailable`] if the cache store is down —
    /// an explicit admin operation does not degrade silently.
    pub async fn clear_cache(&self, destination_id: Option<&str>) -> Result<u64, SearchError> {
        let prefix = destination_id.map(|id| format!("{id}:"));
        let removed = cache_clear(&self.pool, prefix.as_deref()).await?;
        tracing::info!(removed, destination_id = ?destination_id, "cleared search cache");
        Ok(removed)
    }

    fn resolve_category_tags(&self, categories: &[String]) -> Vec<i64> {
        let mut tags: BTreeSet<i64> = BTreeSet::new();
        for keyword in categories {
            let matched = self.taxonomy.lookup(keyword);
            if matched.is_empty() {
                tracing::warn!(keyword = %keyword, "no taxonomy tags match category keyword");
            }
            tags.extend(matched);
        }
        tags.into_iter().collect()
    }

    async fn fetch_upstream(
        &self,
        provider_request: &ProductSearchRequest,
        language: &str,
    ) -> Result<roamly_provider::ProductSearchResponse, SearchError> {
        // The overall deadline is independent of the per-attempt timeout and
        // retry budget inside the client.
        match tokio::time::timeout(
            self.overall_timeout,
            self.client.search_products(provider_request, language),
        )
        .await
        {
            Ok(result) => result.map_err(SearchError::from_provider),
            Err(_) => Err(SearchError::UpstreamTransient(format!(
                "upstream call exceeded {}s overall deadline",
                self.overall_timeout.as_secs()
            ))),
        }
    }

    /// Check the cache, treating store failures as misses.
    async fn cache_lookup(&self, cache_key: &str) -> Option<CachedResults> {
        let row = match cache_get(&self.pool, cache_key).await {
            Ok(row) => row?,
            Err(e) => {
                tracing::warn!(error = %e, "cache read failed; treating as miss");
                return None;
            }
        };
        match serde_json::from_value::<SearchResults>(row.payload) {
            Ok(results) => Some(CachedResults {
                results,
                cache: CacheInfo {
                    cached: true,
                    cached_at: Some(row.created_at),
                    expires_at: Some(row.expires_at),
                },
            }),
            Err(e) => {
                tracing::warn!(error = %e, cache_key = %cache_key, "cached payload unreadable; treating as miss");
                None
            }
        }
    }

    /// Store fresh results in the cache; a failure skips caching only.
    async fn cache_store(&self, cache_key: &str, results: &SearchResults) {
        let payload = match serde_json::to_value(results) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize results for caching");
                return;
            }
        };
        if let Err(e) = cache_put(&self.pool, cache_key, &payload, self.cache_ttl_secs).await {
            tracing::warn!(error = %e, cache_key = %cache_key, "cache write failed; skipping");
        }
    }

    /// Record every returned item in the durable catalog, best-effort.
    async fn persist_catalog(
        &self,
        activities: &[Activity],
        products: &[roamly_provider::ProductSummary],
    ) {
        if activities.is_empty() {
            return;
        }
        let items: Vec<NewCatalogItem> = activities
            .iter()
            .zip(products)
            .map(|(activity, product)| NewCatalogItem {
                item_id: activity.id.clone(),
                title: activity.title.clone(),
                description: activity.description.clone(),
                destination: activity.destination.clone(),
                country: activity.country.clone(),
                from_price: Some(activity.pricing.from_price),
                currency: Some(activity.pricing.currency.clone()),
                rating_average: Some(activity.rating.average),
                rating_count: Some(activity.rating.count),
                payload: serde_json::to_value(product).unwrap_or_else(|_| serde_json::json!({})),
            })
            .collect();

        match upsert_catalog_items(&self.pool, &items).await {
            Ok((new_count, updated_count)) => {
                tracing::debug!(new = new_count, updated = updated_count, "catalog upserted");
            }
            Err(e) => {
                tracing::warn!(error = %e, "catalog upsert failed; continuing");
            }
        }
    }
}

struct CachedResults {
    results: SearchResults,
    cache: CacheInfo,
}

/// Map the normalized request onto the provider's search envelope.
fn build_provider_request(
    destination_id: &str,
    request: &SearchRequest,
    tags: &[i64],
) -> ProductSearchRequest {
    let filters = &request.filters;

    let filtering = SearchFiltering {
        destination: destination_id.to_string(),
        start_date: Some(request.dates.start.to_string()),
        end_date: request.dates.end.map(|d| d.to_string()),
        tags: if tags.is_empty() {
            None
        } else {
            Some(tags.to_vec())
        },
        lowest_price: filters.price_range.as_ref().and_then(|r| r.min),
        highest_price: filters.price_range.as_ref().and_then(|r| r.max),
        rating: filters.rating_min.map(|from| RatingFrom { from }),
        duration_in_minutes: filters.duration_minutes.as_ref().map(|r| DurationBounds {
            from: r.min,
            to: r.max,
        }),
        flags: if filters.flags.is_empty() {
            None
        } else {
            Some(filters.flags.clone())
        },
    };

    // Provider pagination is 1-based start/count.
    let limit = request.pagination.limit.min(MAX_PAGE_LIMIT);
    let start = (request.pagination.page - 1) * limit + 1;

    let sorting = if request.sorting.sort_by == crate::types::SortBy::Default {
        None
    } else {
        Some(SearchSorting {
            sort: provider_sort(request.sorting.sort_by.as_str()).to_string(),
            order: provider_order(request.sorting.order.as_str()).to_string(),
        })
    };

    ProductSearchRequest {
        filtering,
        currency: request.currency.clone(),
        sorting,
        pagination: SearchPagination { start, count: limit },
    }
}
