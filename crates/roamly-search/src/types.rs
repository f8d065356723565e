//! Request and response models for the search pipeline.
//!
//! Inbound shapes are validated at this boundary — the resolver and
//! orchestrator downstream assume a well-formed request.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use roamly_core::constants::{ACTIVITY_FLAGS, SUPPORTED_CURRENCIES, SUPPORTED_LANGUAGES};

/// Hard cap on page size, matching the provider's per-request maximum.
pub const MAX_PAGE_LIMIT: u32 = 50;

// ---------------------------------------------------------------------------
// Inbound request
// ---------------------------------------------------------------------------

/// Raw location input as accepted on the wire: a free-text place name, raw
/// coordinates, or an opaque destination id. Exactly one form must be
/// populated; [`SearchRequest::validate`] enforces that.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LocationInput {
    pub place: Option<String>,
    pub country_hint: Option<String>,
    pub destination_id: Option<String>,
    pub coordinates: Option<GeoInput>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct GeoInput {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
}

fn default_radius_km() -> f64 {
    50.0
}

/// Validated location input with exactly one variant populated.
#[derive(Debug, Clone)]
pub enum LocationSpecifier {
    Place {
        name: String,
        country_hint: Option<String>,
    },
    Coordinates {
        latitude: f64,
        longitude: f64,
        radius_km: f64,
    },
    Destination {
        id: String,
    },
}

impl LocationSpecifier {
    /// Short human-readable description for "location not found" reporting.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            LocationSpecifier::Place { name, country_hint } => match country_hint {
                Some(hint) => format!("{name} ({hint})"),
                None => name.clone(),
            },
            LocationSpecifier::Coordinates {
                latitude,
                longitude,
                radius_km,
            } => format!("({latitude:.4}, {longitude:.4}) within {radius_km}km"),
            LocationSpecifier::Destination { id } => format!("destination {id}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct PriceRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct DurationRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct SearchFilters {
    #[serde(default)]
    pub categories: Vec<String>,
    pub price_range: Option<PriceRange>,
    pub rating_min: Option<f64>,
    pub duration_minutes: Option<DurationRange>,
    #[serde(default)]
    pub flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Default,
    Rating,
    Price,
    Duration,
    DateAdded,
}

impl SortBy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::Default => "default",
            SortBy::Rating => "rating",
            SortBy::Price => "price",
            SortBy::Duration => "duration",
            SortBy::DateAdded => "date_added",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct SortSpec {
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

fn default_currency() -> String {
    "EUR".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchRequest {
    pub location: LocationInput,
    pub dates: DateRange,
    #[serde(default)]
    pub filters: SearchFilters,
    #[serde(default)]
    pub sorting: SortSpec,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_language")]
    pub language: String,
}

impl SearchRequest {
    /// Validate the request at the boundary and extract the single populated
    /// location variant.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Validation`] with a self-correcting message on
    /// any malformed field.
    pub fn validate(&self) -> Result<LocationSpecifier, SearchError> {
        let spec = self.validate_location()?;

        if let Some(end) = self.dates.end {
            if end < self.dates.start {
                return Err(SearchError::Validation(format!(
                    "end date {} precedes start date {}",
                    end, self.dates.start
                )));
            }
        }

        if let Some(range) = &self.filters.price_range {
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(SearchError::Validation(format!(
                        "price range min {min} exceeds max {max}"
                    )));
                }
            }
            if range.min.is_some_and(|v| v < 0.0) || range.max.is_some_and(|v| v < 0.0) {
                return Err(SearchError::Validation(
                    "price bounds must be non-negative".to_string(),
                ));
            }
        }

        if let Some(range) = &self.filters.duration_minutes {
            if let (Some(min), Some(max)) = (range.min, range.max) {
                if min > max {
                    return Err(SearchError::Validation(format!(
                        "duration range min {min} exceeds max {max}"
                    )));
                }
            }
            if range.min.is_some_and(|v| v < 0) || range.max.is_some_and(|v| v < 0) {
                return Err(SearchError::Validation(
                    "duration bounds must be non-negative".to_string(),
                ));
            }
        }

        if let Some(rating) = self.filters.rating_min {
            if !(0.0..=5.0).contains(&rating) {
                return Err(SearchError::Validation(format!(
                    "rating_min {rating} outside [0, 5]"
                )));
            }
        }

        for flag in &self.filters.flags {
            let canonical = flag.trim().to_uppercase();
            if !ACTIVITY_FLAGS.contains(&canonical.as_str()) {
                return Err(SearchError::Validation(format!(
                    "unknown activity flag '{flag}'"
                )));
            }
        }

        if self.pagination.page < 1 {
            return Err(SearchError::Validation("page must be >= 1".to_string()));
        }
        if self.pagination.limit < 1 || self.pagination.limit > MAX_PAGE_LIMIT {
            return Err(SearchError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }

        if !SUPPORTED_CURRENCIES.contains(&self.currency.as_str()) {
            return Err(SearchError::Validation(format!(
                "unsupported currency '{}'",
                self.currency
            )));
        }
        if !SUPPORTED_LANGUAGES.contains(&self.language.as_str()) {
            return Err(SearchError::Validation(format!(
                "unsupported language '{}'",
                self.language
            )));
        }

        Ok(spec)
    }

    fn validate_location(&self) -> Result<LocationSpecifier, SearchError> {
        let loc = &self.location;
        let populated = usize::from(loc.place.is_some())
            + usize::from(loc.destination_id.is_some())
            + usize::from(loc.coordinates.is_some());
        if populated != 1 {
            return Err(SearchError::Validation(
                "location must carry exactly one of place, destination_id, or coordinates"
                    .to_string(),
            ));
        }

        if let Some(id) = &loc.destination_id {
            if id.trim().is_empty() {
                return Err(SearchError::Validation(
                    "destination_id must not be empty".to_string(),
                ));
            }
            return Ok(LocationSpecifier::Destination { id: id.clone() });
        }

        if let Some(name) = &loc.place {
            if name.trim().len() < 2 {
                return Err(SearchError::Validation(
                    "place name must be at least 2 characters".to_string(),
                ));
            }
            let hint = match &loc.country_hint {
                Some(hint) => {
                    if hint.len() != 2 || !hint.chars().all(|c| c.is_ascii_alphabetic()) {
                        return Err(SearchError::Validation(format!(
                            "country_hint '{hint}' is not a 2-letter code"
                        )));
                    }
                    Some(hint.to_ascii_uppercase())
                }
                None => None,
            };
            return Ok(LocationSpecifier::Place {
                name: name.clone(),
                country_hint: hint,
            });
        }

        // validate_location counted exactly one populated field above.
        let geo = loc.coordinates.as_ref().ok_or_else(|| {
            SearchError::Validation("location input is missing".to_string())
        })?;
        if !(-90.0..=90.0).contains(&geo.latitude) || !(-180.0..=180.0).contains(&geo.longitude) {
            return Err(SearchError::Validation(format!(
                "coordinates ({}, {}) out of range",
                geo.latitude, geo.longitude
            )));
        }
        if !(1.0..=200.0).contains(&geo.radius_km) {
            return Err(SearchError::Validation(
                "radius_km must be between 1 and 200".to_string(),
            ));
        }
        Ok(LocationSpecifier::Coordinates {
            latitude: geo.latitude,
            longitude: geo.longitude,
            radius_km: geo.radius_km,
        })
    }
}

// ---------------------------------------------------------------------------
// Outbound response
// ---------------------------------------------------------------------------

/// A location resolved to a canonical destination id. Recomputed per request;
/// cached only as part of the enclosing search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub destination_id: String,
    pub matched_name: Option<String>,
    /// Match confidence in [0, 100]; 100 for opaque ids and geo matches.
    pub confidence: f64,
    /// Present only when resolved via geospatial lookup.
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageVariants {
    pub small: Option<String>,
    pub medium: Option<String>,
    pub large: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityImage {
    pub url: String,
    pub is_cover: bool,
    pub variants: ImageVariants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPricing {
    pub from_price: f64,
    pub currency: String,
    pub original_price: Option<f64>,
    pub is_discounted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRating {
    pub average: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDuration {
    pub minutes: i64,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub description: String,
    pub images: Vec<ActivityImage>,
    pub pricing: ActivityPricing,
    pub rating: ActivityRating,
    pub duration: ActivityDuration,
    pub categories: Vec<String>,
    pub flags: Vec<String>,
    pub booking_url: String,
    pub confirmation_type: String,
    pub destination: Option<String>,
    pub country: Option<String>,
    pub availability: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub activities: Vec<Activity>,
}

/// Cache metadata annotated onto every response: whether it was served from
/// cache, and if so the entry's creation/expiry window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfo {
    pub cached: bool,
    pub cached_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheInfo {
    #[must_use]
    pub fn miss() -> Self {
        Self {
            cached: false,
            cached_at: None,
            expires_at: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub location: ResolvedLocation,
    pub filters_applied: SearchFilters,
    pub results: SearchResults,
    pub cache: CacheInfo,
}
