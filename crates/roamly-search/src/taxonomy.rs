//! The synchronized category taxonomy.
//!
//! The queryable state is an immutable snapshot behind a single swapped
//! reference: readers clone the `Arc` and never observe a mixed generation,
//! while `sync` builds a full replacement off to the side. A failed fetch
//! leaves the previous snapshot (and the persisted copy) untouched.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::error::SearchError;
use roamly_db::{load_taxonomy_tags, prune_taxonomy_tags, upsert_taxonomy_tag, NewTaxonomyTag};
use roamly_provider::MarketplaceClient;

/// One taxonomy entry: a provider tag with its multilingual names.
#[derive(Debug, Clone)]
pub struct TaxonomyEntry {
    pub tag_id: i64,
    pub name: String,
    pub parent_tag_id: Option<i64>,
    pub names: HashMap<String, String>,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TaxonomySnapshot {
    entries: Vec<TaxonomyEntry>,
}

/// Statistics for one taxonomy sync run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub fetched: usize,
    pub updated: usize,
    pub errored: usize,
    pub root_tags: usize,
    pub child_tags: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Read-mostly keyword → tag-id index over the provider taxonomy.
pub struct TaxonomyIndex {
    snapshot: RwLock<Arc<TaxonomySnapshot>>,
}

impl Default for TaxonomyIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl TaxonomyIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(TaxonomySnapshot::default())),
        }
    }

    /// Number of entries in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.current().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive substring lookup over canonical and translated names.
    ///
    /// An empty result set is a valid outcome; the caller proceeds with an
    /// unfiltered search rather than failing the request.
    #[must_use]
    pub fn lookup(&self, keyword: &str) -> BTreeSet<i64> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return BTreeSet::new();
        }
        let snapshot = self.current();
        snapshot
            .entries
            .iter()
            .filter(|entry| {
                entry.name.to_lowercase().contains(&needle)
                    || entry
                        .names
                        .values()
                        .any(|name| name.to_lowercase().contains(&needle))
            })
            .map(|entry| entry.tag_id)
            .collect()
    }

    /// Canonical name for a tag id in the current snapshot.
    #[must_use]
    pub fn tag_name(&self, tag_id: i64) -> Option<String> {
        self.current()
            .entries
            .iter()
            .find(|entry| entry.tag_id == tag_id)
            .map(|entry| entry.name.clone())
    }

    /// Hydrate the index from the persisted last-good generation.
    ///
    /// Returns the number of entries loaded.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::StoreUnavailable`] if the table cannot be read;
    /// the in-memory snapshot is left unchanged.
    pub async fn hydrate(&self, pool: &PgPool) -> Result<usize, SearchError> {
        let rows = load_taxonomy_tags(pool).await?;
        let entries: Vec<TaxonomyEntry> = rows
            .into_iter()
            .map(|row| TaxonomyEntry {
                tag_id: row.tag_id,
                name: row.tag_name,
                parent_tag_id: row.parent_tag_id,
                names: names_from_json(&row.names),
                synced_at: row.synced_at,
            })
            .collect();
        let count = entries.len();
        self.swap(entries);
        tracing::info!(count, "hydrated taxonomy index from store");
        Ok(count)
    }

    /// Fetch the complete taxonomy from the provider and replace the snapshot.
    ///
    /// The fetch is all-or-nothing: any provider failure aborts the sync with
    /// the previous generation still serving. Per-tag persistence failures
    /// are counted in the report but do not block the in-memory swap.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::UpstreamTransient`] /
    /// [`SearchError::UpstreamPermanent`] if the taxonomy listing fetch fails.
    pub async fn sync(
        &self,
        pool: &PgPool,
        client: &MarketplaceClient,
        language: &str,
    ) -> Result<SyncReport, SearchError> {
        let started_at = Utc::now();
        tracing::info!("starting taxonomy sync");

        let listings = client
            .list_tags(language)
            .await
            .map_err(SearchError::from_provider)?;

        let mut updated = 0usize;
        let mut errored = 0usize;
        let mut root_tags = 0usize;
        let mut child_tags = 0usize;
        let mut entries: Vec<TaxonomyEntry> = Vec::with_capacity(listings.len());
        let mut keep_ids: Vec<i64> = Vec::with_capacity(listings.len());

        for listing in &listings {
            if listing.parent_tag_id.is_none() {
                root_tags += 1;
            } else {
                child_tags += 1;
            }

            let names_json = serde_json::to_value(&listing.all_names_by_locale)
                .unwrap_or_else(|_| serde_json::json!({}));
            let tag = NewTaxonomyTag {
                tag_id: listing.tag_id,
                tag_name: listing.tag_name.clone(),
                parent_tag_id: listing.parent_tag_id,
                names: names_json,
            };
            match upsert_taxonomy_tag(pool, &tag).await {
                Ok(()) => updated += 1,
                Err(e) => {
                    errored += 1;
                    tracing::error!(tag_id = listing.tag_id, error = %e, "failed to persist taxonomy tag");
                }
            }

            keep_ids.push(listing.tag_id);
            entries.push(TaxonomyEntry {
                tag_id: listing.tag_id,
                name: listing.tag_name.clone(),
                parent_tag_id: listing.parent_tag_id,
                names: listing.all_names_by_locale.clone(),
                synced_at: started_at,
            });
        }

        // Tags the provider no longer publishes drop out of the new
        // generation; mirror that in the persisted copy.
        if let Err(e) = prune_taxonomy_tags(pool, &keep_ids).await {
            errored += 1;
            tracing::error!(error = %e, "failed to prune stale taxonomy tags");
        }

        self.swap(entries);

        let report = SyncReport {
            fetched: listings.len(),
            updated,
            errored,
            root_tags,
            child_tags,
            started_at,
            completed_at: Utc::now(),
        };
        tracing::info!(
            fetched = report.fetched,
            updated = report.updated,
            errored = report.errored,
            root_tags = report.root_tags,
            child_tags = report.child_tags,
            "taxonomy sync complete"
        );
        Ok(report)
    }

    /// Build an index directly from entries, bypassing store and provider.
    #[cfg(test)]
    pub(crate) fn with_entries(entries: Vec<TaxonomyEntry>) -> Self {
        let index = Self::new();
        index.swap(entries);
        index
    }

    fn current(&self) -> Arc<TaxonomySnapshot> {
        self.snapshot
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_default()
    }

    fn swap(&self, entries: Vec<TaxonomyEntry>) {
        let next = Arc::new(TaxonomySnapshot { entries });
        if let Ok(mut guard) = self.snapshot.write() {
            *guard = next;
        }
    }
}

fn names_from_json(value: &serde_json::Value) -> HashMap<String, String> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
