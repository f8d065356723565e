//! The `search_cache` table: a key-value store with TTL expiry.
//!
//! Entries are keyed by the deterministic request fingerprint and are only
//! ever replaced wholesale. An expired row is indistinguishable from a miss
//! to callers; rows are reaped lazily on write.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CacheRow {
    pub cache_key: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Fetch a live cache entry by key.
///
/// Returns `None` for both absent and expired entries.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn cache_get(pool: &PgPool, cache_key: &str) -> Result<Option<CacheRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheRow>(
        "SELECT cache_key, payload, created_at, expires_at \
         FROM search_cache \
         WHERE cache_key = $1 AND expires_at > NOW()",
    )
    .bind(cache_key)
    .fetch_optional(pool)
    .await
}

/// Store a cache entry, replacing any previous entry under the same key.
///
/// The new entry gets a fresh `created_at`/`expires_at` window; concurrent
/// writers to the same key resolve as last-write-wins.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn cache_put(
    pool: &PgPool,
    cache_key: &str,
    payload: &serde_json::Value,
    ttl_secs: u64,
) -> Result<(), sqlx::Error> {
    #[allow(clippy::cast_precision_loss)]
    let ttl = ttl_secs as f64;
    sqlx::query(
        "INSERT INTO search_cache (cache_key, payload, created_at, expires_at) \
         VALUES ($1, $2, NOW(), NOW() + make_interval(secs => $3)) \
         ON CONFLICT (cache_key) DO UPDATE SET \
             payload    = EXCLUDED.payload, \
             created_at = EXCLUDED.created_at, \
             expires_at = EXCLUDED.expires_at",
    )
    .bind(cache_key)
    .bind(payload)
    .bind(ttl)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete cache entries, optionally restricted to keys with a given prefix.
///
/// With `prefix = None` the whole cache is dropped. Returns the number of
/// rows deleted.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn cache_clear(pool: &PgPool, prefix: Option<&str>) -> Result<u64, sqlx::Error> {
    let rows_affected = if let Some(prefix) = prefix {
        let pattern = format!("{prefix}%");
        sqlx::query("DELETE FROM search_cache WHERE cache_key LIKE $1")
            .bind(pattern)
            .execute(pool)
            .await?
            .rows_affected()
    } else {
        sqlx::query("DELETE FROM search_cache")
            .execute(pool)
            .await?
            .rows_affected()
    };
    Ok(rows_affected)
}
