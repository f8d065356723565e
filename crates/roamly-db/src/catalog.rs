//! The `catalog_items` table: a durable record of activity items seen in
//! upstream responses.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogItemRow {
    pub id: i64,
    pub item_id: String,
    pub title: String,
    pub description: String,
    pub destination: Option<String>,
    pub country: Option<String>,
    pub from_price: Option<f64>,
    pub currency: Option<String>,
    pub rating_average: Option<f64>,
    pub rating_count: Option<i64>,
    pub payload: serde_json::Value,
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub fetch_count: i64,
}

/// A catalog item extracted from a fresh upstream result, ready for upsert.
#[derive(Debug, Clone)]
pub struct NewCatalogItem {
    pub item_id: String,
    pub title: String,
    pub description: String,
    pub destination: Option<String>,
    pub country: Option<String>,
    pub from_price: Option<f64>,
    pub currency: Option<String>,
    pub rating_average: Option<f64>,
    pub rating_count: Option<i64>,
    pub payload: serde_json::Value,
}

/// Idempotently upsert a batch of catalog items.
///
/// New items are inserted with `fetch_count = 1`; existing items have their
/// display fields replaced, `last_updated_at` refreshed, and `fetch_count`
/// incremented. `first_seen_at` is never touched after insert. Returns
/// `(new_count, updated_count)`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn upsert_catalog_items(
    pool: &PgPool,
    items: &[NewCatalogItem],
) -> Result<(u64, u64), sqlx::Error> {
    if items.is_empty() {
        return Ok((0, 0));
    }

    let mut item_ids: Vec<String> = Vec::with_capacity(items.len());
    let mut titles: Vec<String> = Vec::with_capacity(items.len());
    let mut descriptions: Vec<String> = Vec::with_capacity(items.len());
    let mut destinations: Vec<Option<String>> = Vec::with_capacity(items.len());
    let mut countries: Vec<Option<String>> = Vec::with_capacity(items.len());
    let mut from_prices: Vec<Option<f64>> = Vec::with_capacity(items.len());
    let mut currencies: Vec<Option<String>> = Vec::with_capacity(items.len());
    let mut rating_averages: Vec<Option<f64>> = Vec::with_capacity(items.len());
    let mut rating_counts: Vec<Option<i64>> = Vec::with_capacity(items.len());
    let mut payloads: Vec<serde_json::Value> = Vec::with_capacity(items.len());

    for item in items {
        item_ids.push(item.item_id.clone());
        titles.push(item.title.clone());
        descriptions.push(item.description.clone());
        destinations.push(item.destination.clone());
        countries.push(item.country.clone());
        from_prices.push(item.from_price);
        currencies.push(item.currency.clone());
        rating_averages.push(item.rating_average);
        rating_counts.push(item.rating_count);
        payloads.push(item.payload.clone());
    }

    let rows: Vec<bool> = sqlx::query_scalar::<_, bool>(
        "INSERT INTO catalog_items \
             (item_id, title, description, destination, country, from_price, \
              currency, rating_average, rating_count, payload) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::text[], $3::text[], $4::text[], $5::text[], \
              $6::float8[], $7::text[], $8::float8[], $9::bigint[], $10::jsonb[]) \
         ON CONFLICT (item_id) DO UPDATE SET \
             title           = EXCLUDED.title, \
             description     = EXCLUDED.description, \
             destination     = EXCLUDED.destination, \
             country         = EXCLUDED.country, \
             from_price      = EXCLUDED.from_price, \
             currency        = EXCLUDED.currency, \
             rating_average  = EXCLUDED.rating_average, \
             rating_count    = EXCLUDED.rating_count, \
             payload         = EXCLUDED.payload, \
             last_updated_at = NOW(), \
             fetch_count     = catalog_items.fetch_count + 1 \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(&item_ids)
    .bind(&titles)
    .bind(&descriptions)
    .bind(&destinations)
    .bind(&countries)
    .bind(&from_prices)
    .bind(&currencies)
    .bind(&rating_averages)
    .bind(&rating_counts)
    .bind(&payloads)
    .fetch_all(pool)
    .await?;

    let new_count = rows.iter().filter(|&&is_new| is_new).count() as u64;
    let updated_count = rows.len() as u64 - new_count;

    Ok((new_count, updated_count))
}

/// Fetch a single catalog item by its provider item id.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn get_catalog_item(
    pool: &PgPool,
    item_id: &str,
) -> Result<Option<CatalogItemRow>, sqlx::Error> {
    sqlx::query_as::<_, CatalogItemRow>(
        "SELECT id, item_id, title, description, destination, country, from_price, \
                currency, rating_average, rating_count, payload, \
                first_seen_at, last_updated_at, fetch_count \
         FROM catalog_items \
         WHERE item_id = $1",
    )
    .bind(item_id)
    .fetch_optional(pool)
    .await
}
