//! Persistence for the synchronized provider taxonomy.
//!
//! The sync job upserts tags one at a time so a malformed entry can be
//! counted and skipped without aborting the whole generation; the in-memory
//! index is only swapped after the full fetch succeeds, so a partial write
//! here never becomes queryable state.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaxonomyTagRow {
    pub tag_id: i64,
    pub tag_name: String,
    pub parent_tag_id: Option<i64>,
    pub names: serde_json::Value,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTaxonomyTag {
    pub tag_id: i64,
    pub tag_name: String,
    pub parent_tag_id: Option<i64>,
    pub names: serde_json::Value,
}

/// Upsert a single taxonomy tag, refreshing `synced_at`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn upsert_taxonomy_tag(pool: &PgPool, tag: &NewTaxonomyTag) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO taxonomy_tags (tag_id, tag_name, parent_tag_id, names, synced_at) \
         VALUES ($1, $2, $3, $4, NOW()) \
         ON CONFLICT (tag_id) DO UPDATE SET \
             tag_name      = EXCLUDED.tag_name, \
             parent_tag_id = EXCLUDED.parent_tag_id, \
             names         = EXCLUDED.names, \
             synced_at     = NOW()",
    )
    .bind(tag.tag_id)
    .bind(&tag.tag_name)
    .bind(tag.parent_tag_id)
    .bind(&tag.names)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load the full persisted taxonomy, ordered by tag id.
///
/// Used to hydrate the in-memory index at startup.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn load_taxonomy_tags(pool: &PgPool) -> Result<Vec<TaxonomyTagRow>, sqlx::Error> {
    sqlx::query_as::<_, TaxonomyTagRow>(
        "SELECT tag_id, tag_name, parent_tag_id, names, synced_at \
         FROM taxonomy_tags \
         ORDER BY tag_id ASC",
    )
    .fetch_all(pool)
    .await
}

/// Delete tags that were not part of the latest sync generation.
///
/// `keep_ids` is the complete id set of the new generation; everything else
/// is a tag the provider no longer publishes.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn prune_taxonomy_tags(pool: &PgPool, keep_ids: &[i64]) -> Result<u64, sqlx::Error> {
    let rows_affected = sqlx::query("DELETE FROM taxonomy_tags WHERE tag_id != ALL($1::bigint[])")
        .bind(keep_ids)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows_affected)
}
