//! Resolution of heterogeneous location inputs to canonical destination ids.
//!
//! Three paths: opaque ids pass through untouched, free-text names go through
//! fuzzy matching over a bounded candidate sample from the place catalog, and
//! coordinates go through a bounding-box prefilter plus exact great-circle
//! ordering. "No match" is a normal outcome (`Ok(None)`); only store
//! connectivity failures surface as errors.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use crate::error::SearchError;
use crate::types::{LocationSpecifier, ResolvedLocation};
use roamly_db::{list_cities_in_bbox, list_city_candidates, DestinationRow, NewDestination};
use roamly_provider::MarketplaceClient;

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE_LAT: f64 = 111.0;

pub struct LocationResolver {
    pool: PgPool,
    min_confidence: f64,
    candidate_limit: i64,
    // Process-lifetime memo for text/geo lookups; invalidated whenever the
    // destination sync rewrites the place catalog.
    memo: RwLock<HashMap<String, ResolvedLocation>>,
}

impl LocationResolver {
    #[must_use]
    pub fn new(pool: PgPool, min_confidence: f64, candidate_limit: i64) -> Self {
        Self {
            pool,
            min_confidence,
            candidate_limit,
            memo: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a location specifier to a canonical destination.
    ///
    /// Returns `Ok(None)` when no sufficiently confident match exists — never
    /// a low-confidence guess.
    ///
    /// # Errors
    ///
    /// Returns [`sqlx::Error`] if the place catalog is unreachable; callers
    /// must surface this as a store failure, not as "not found".
    pub async fn resolve(
        &self,
        spec: &LocationSpecifier,
    ) -> Result<Option<ResolvedLocation>, sqlx::Error> {
        match spec {
            LocationSpecifier::Destination { id } => Ok(Some(ResolvedLocation {
                destination_id: id.clone(),
                matched_name: None,
                confidence: 100.0,
                distance_km: None,
            })),
            LocationSpecifier::Place { name, country_hint } => {
                self.resolve_place(name, country_hint.as_deref()).await
            }
            LocationSpecifier::Coordinates {
                latitude,
                longitude,
                radius_km,
            } => self.resolve_geo(*latitude, *longitude, *radius_km).await,
        }
    }

    /// Drop all memoized resolutions. Called after the place catalog changes.
    pub fn invalidate_memo(&self) {
        if let Ok(mut memo) = self.memo.write() {
            memo.clear();
        }
    }

    async fn resolve_place(
        &self,
        name: &str,
        country_hint: Option<&str>,
    ) -> Result<Option<ResolvedLocation>, sqlx::Error> {
        let normalized = normalize_place_name(name);
        let memo_key = format!("place:{normalized}:{}", country_hint.unwrap_or("all"));
        if let Some(hit) = self.memo_get(&memo_key) {
            return Ok(Some(hit));
        }

        let candidates =
            list_city_candidates(&self.pool, country_hint, self.candidate_limit).await?;
        if candidates.is_empty() {
            tracing::warn!(
                place = name,
                country_hint = ?country_hint,
                "no place candidates in catalog; run a destination sync"
            );
            return Ok(None);
        }

        let Some((row, score)) = best_candidate(&normalized, &candidates) else {
            return Ok(None);
        };
        if score < self.min_confidence {
            tracing::debug!(
                place = name,
                best = %row.name,
                score,
                threshold = self.min_confidence,
                "best fuzzy match below confidence threshold"
            );
            return Ok(None);
        }

        tracing::debug!(place = name, matched = %row.name, destination_id = %row.destination_id, score, "resolved place");

        let resolved = ResolvedLocation {
            destination_id: row.destination_id.clone(),
            matched_name: Some(row.name.clone()),
            confidence: score,
            distance_km: None,
        };
        self.memo_put(memo_key, resolved.clone());
        Ok(Some(resolved))
    }

    async fn resolve_geo(
        &self,
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    ) -> Result<Option<ResolvedLocation>, sqlx::Error> {
        let memo_key = format!("geo:{latitude:.4}:{longitude:.4}:{radius_km:.1}");
        if let Some(hit) = self.memo_get(&memo_key) {
            return Ok(Some(hit));
        }

        let (min_lat, max_lat, min_lon, max_lon) = bounding_box(latitude, longitude, radius_km);
        let candidates =
            list_cities_in_bbox(&self.pool, min_lat, max_lat, min_lon, max_lon).await?;

        let mut nearest: Option<(&DestinationRow, f64)> = None;
        for row in &candidates {
            let (Some(lat), Some(lon)) = (row.latitude, row.longitude) else {
                continue;
            };
            let distance = haversine_km(latitude, longitude, lat, lon);
            if distance > radius_km {
                continue;
            }
            match nearest {
                Some((_, best)) if best <= distance => {}
                _ => nearest = Some((row, distance)),
            }
        }

        let Some((row, distance)) = nearest else {
            tracing::debug!(latitude, longitude, radius_km, "no destination within radius");
            return Ok(None);
        };

        tracing::debug!(
            latitude,
            longitude,
            matched = %row.name,
            destination_id = %row.destination_id,
            distance_km = distance,
            "resolved coordinates"
        );

        let resolved = ResolvedLocation {
            destination_id: row.destination_id.clone(),
            matched_name: Some(row.name.clone()),
            confidence: 100.0,
            distance_km: Some(distance),
        };
        self.memo_put(memo_key, resolved.clone());
        Ok(Some(resolved))
    }

    fn memo_get(&self, key: &str) -> Option<ResolvedLocation> {
        self.memo.read().ok()?.get(key).cloned()
    }

    fn memo_put(&self, key: String, value: ResolvedLocation) {
        if let Ok(mut memo) = self.memo.write() {
            memo.insert(key, value);
        }
    }
}

/// Pick the highest-scoring candidate for a normalized query.
///
/// Ties (within float tolerance) are broken by higher `lookup_rank`, then
/// alphabetically by name.
fn best_candidate<'a>(
    normalized_query: &str,
    candidates: &'a [DestinationRow],
) -> Option<(&'a DestinationRow, f64)> {
    const EPSILON: f64 = 1e-9;
    let mut best: Option<(&DestinationRow, f64)> = None;
    for row in candidates {
        let score = similarity_score(normalized_query, &normalize_place_name(&row.name));
        match best {
            None => best = Some((row, score)),
            Some((current, current_score)) => {
                if score > current_score + EPSILON {
                    best = Some((row, score));
                } else if (score - current_score).abs() <= EPSILON {
                    let wins = row.lookup_rank > current.lookup_rank
                        || (row.lookup_rank == current.lookup_rank && row.name < current.name);
                    if wins {
                        best = Some((row, score));
                    }
                }
            }
        }
    }
    best
}

/// Symmetric string similarity scaled to [0, 100].
fn similarity_score(a: &str, b: &str) -> f64 {
    strsim::jaro_winkler(a, b) * 100.0
}

/// Lowercase, fold diacritics, and collapse internal whitespace so that
/// "São  Paulo" and "sao paulo" compare equal.
fn normalize_place_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_space = true;
    for c in name.trim().chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }
        last_was_space = false;
        match fold_diacritic(c) {
            Some(folded) => out.push_str(folded),
            None => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Map common Latin diacritics to their lowercase ASCII base letters.
fn fold_diacritic(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => "u",
        'ç' | 'Ç' => "c",
        'ñ' | 'Ñ' => "n",
        'ý' | 'ÿ' | 'Ý' => "y",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        _ => return None,
    };
    Some(folded)
}

/// Great-circle distance between two points in kilometers.
fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Degree-space bounding box covering `radius_km` around a point.
///
/// The longitude delta widens with latitude; near the poles the box degrades
/// to a full longitude sweep rather than dividing by ~zero.
fn bounding_box(latitude: f64, longitude: f64, radius_km: f64) -> (f64, f64, f64, f64) {
    let dlat = radius_km / KM_PER_DEGREE_LAT;
    let cos_lat = latitude.to_radians().cos().abs();
    let dlon = if cos_lat < 0.01 {
        180.0
    } else {
        radius_km / (KM_PER_DEGREE_LAT * cos_lat)
    };
    (
        (latitude - dlat).max(-90.0),
        (latitude + dlat).min(90.0),
        (longitude - dlon).max(-180.0),
        (longitude + dlon).min(180.0),
    )
}

// ---------------------------------------------------------------------------
// Destination catalog sync
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DestinationSyncReport {
    pub fetched: usize,
    pub new: u64,
    pub updated: u64,
    pub started_at: chrono::DateTime<Utc>,
    pub completed_at: chrono::DateTime<Utc>,
}

/// Fetch the provider's destination listing and rewrite the place catalog.
///
/// Invalidates the resolver memo afterwards so no memoized resolution can
/// outlive the catalog generation it was computed against.
///
/// # Errors
///
/// Returns [`SearchError::UpstreamTransient`]/[`SearchError::UpstreamPermanent`]
/// if the listing fetch fails, or [`SearchError::StoreUnavailable`] if the
/// upsert fails. A failed sync leaves the previous catalog intact.
pub async fn sync_destinations(
    pool: &PgPool,
    client: &MarketplaceClient,
    resolver: &LocationResolver,
) -> Result<DestinationSyncReport, SearchError> {
    let started_at = Utc::now();
    tracing::info!("starting destination catalog sync");

    let listings = client
        .list_destinations()
        .await
        .map_err(SearchError::from_provider)?;

    let rows: Vec<NewDestination> = listings
        .iter()
        .map(|d| NewDestination {
            destination_id: d.destination_id.to_string(),
            name: d.name.clone(),
            kind: d.kind.clone(),
            country_code: d.country_code.clone(),
            latitude: d.center.map(|c| c.latitude),
            longitude: d.center.map(|c| c.longitude),
            lookup_rank: d.rank,
        })
        .collect();

    let (new, updated) = roamly_db::upsert_destinations(pool, &rows).await?;
    resolver.invalidate_memo();

    let report = DestinationSyncReport {
        fetched: listings.len(),
        new,
        updated,
        started_at,
        completed_at: Utc::now(),
    };
    tracing::info!(
        fetched = report.fetched,
        new = report.new,
        updated = report.updated,
        "destination catalog sync complete"
    );
    Ok(report)
}
