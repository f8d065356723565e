//! Read/write operations for the `destinations` place catalog.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// A place catalog row as read by the location resolver.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DestinationRow {
    pub id: i64,
    pub destination_id: String,
    pub name: String,
    pub kind: String,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lookup_rank: f64,
    pub synced_at: DateTime<Utc>,
}

/// A destination as fetched from the provider listing, ready for upsert.
#[derive(Debug, Clone)]
pub struct NewDestination {
    pub destination_id: String,
    pub name: String,
    pub kind: String,
    pub country_code: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lookup_rank: f64,
}

/// List resolvable city candidates, optionally scoped to a country.
///
/// `limit` bounds the candidate sample for fuzzy-matching cost control.
/// Rows are ordered by `lookup_rank DESC, name ASC` so a truncated sample
/// keeps the most important places.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn list_city_candidates(
    pool: &PgPool,
    country_code: Option<&str>,
    limit: i64,
) -> Result<Vec<DestinationRow>, sqlx::Error> {
    if let Some(country) = country_code {
        sqlx::query_as::<_, DestinationRow>(
            "SELECT id, destination_id, name, kind, country_code, \
                    latitude, longitude, lookup_rank, synced_at \
             FROM destinations \
             WHERE kind = 'city' AND country_code = $1 \
             ORDER BY lookup_rank DESC, name ASC \
             LIMIT $2",
        )
        .bind(country)
        .bind(limit)
        .fetch_all(pool)
        .await
    } else {
        sqlx::query_as::<_, DestinationRow>(
            "SELECT id, destination_id, name, kind, country_code, \
                    latitude, longitude, lookup_rank, synced_at \
             FROM destinations \
             WHERE kind = 'city' \
             ORDER BY lookup_rank DESC, name ASC \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}

/// List cities with coordinates inside a bounding box.
///
/// The box is a cheap prefilter for nearest-neighbor lookup; the caller
/// computes exact great-circle distances over the returned rows.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn list_cities_in_bbox(
    pool: &PgPool,
    min_lat: f64,
    max_lat: f64,
    min_lon: f64,
    max_lon: f64,
) -> Result<Vec<DestinationRow>, sqlx::Error> {
    sqlx::query_as::<_, DestinationRow>(
        "SELECT id, destination_id, name, kind, country_code, \
                latitude, longitude, lookup_rank, synced_at \
         FROM destinations \
         WHERE kind = 'city' \
           AND latitude  IS NOT NULL AND latitude  BETWEEN $1 AND $2 \
           AND longitude IS NOT NULL AND longitude BETWEEN $3 AND $4",
    )
    .bind(min_lat)
    .bind(max_lat)
    .bind(min_lon)
    .bind(max_lon)
    .fetch_all(pool)
    .await
}

/// Insert new destinations and refresh existing ones.
///
/// Returns `(new_count, updated_count)`. Uses a single
/// `INSERT … SELECT * FROM UNNEST(…) ON CONFLICT` so the entire batch is
/// upserted in one round-trip regardless of batch size.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn upsert_destinations(
    pool: &PgPool,
    destinations: &[NewDestination],
) -> Result<(u64, u64), sqlx::Error> {
    if destinations.is_empty() {
        return Ok((0, 0));
    }

    // Collect each column into a parallel Vec for UNNEST binding.
    let mut destination_ids: Vec<String> = Vec::with_capacity(destinations.len());
    let mut names: Vec<String> = Vec::with_capacity(destinations.len());
    let mut kinds: Vec<String> = Vec::with_capacity(destinations.len());
    let mut country_codes: Vec<Option<String>> = Vec::with_capacity(destinations.len());
    let mut latitudes: Vec<Option<f64>> = Vec::with_capacity(destinations.len());
    let mut longitudes: Vec<Option<f64>> = Vec::with_capacity(destinations.len());
    let mut lookup_ranks: Vec<f64> = Vec::with_capacity(destinations.len());

    for dest in destinations {
        destination_ids.push(dest.destination_id.clone());
        names.push(dest.name.clone());
        kinds.push(dest.kind.clone());
        country_codes.push(dest.country_code.clone());
        latitudes.push(dest.latitude);
        longitudes.push(dest.longitude);
        lookup_ranks.push(dest.lookup_rank);
    }

    let rows: Vec<bool> = sqlx::query_scalar::<_, bool>(
        "INSERT INTO destinations \
             (destination_id, name, kind, country_code, latitude, longitude, lookup_rank) \
         SELECT * FROM UNNEST(\
              $1::text[], $2::text[], $3::text[], $4::text[], \
              $5::float8[], $6::float8[], $7::float8[]) \
         ON CONFLICT (destination_id) DO UPDATE SET \
             name         = EXCLUDED.name, \
             kind         = EXCLUDED.kind, \
             country_code = EXCLUDED.country_code, \
             latitude     = EXCLUDED.latitude, \
             longitude    = EXCLUDED.longitude, \
             lookup_rank  = EXCLUDED.lookup_rank, \
             synced_at    = NOW(), \
             updated_at   = NOW() \
         RETURNING (xmax = 0) AS is_new",
    )
    .bind(&destination_ids)
    .bind(&names)
    .bind(&kinds)
    .bind(&country_codes)
    .bind(&latitudes)
    .bind(&longitudes)
    .bind(&lookup_ranks)
    .fetch_all(pool)
    .await?;

    let new_count = rows.iter().filter(|&&is_new| is_new).count() as u64;
    let updated_count = rows.len() as u64 - new_count;

    Ok((new_count, updated_count))
}
