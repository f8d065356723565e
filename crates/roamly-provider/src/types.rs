//! Wire types for the marketplace partner API.
//!
//! Request bodies serialize to the provider's camelCase envelope; response
//! types are tolerant of absent fields so a sparse listing never fails the
//! whole page.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Product search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSearchRequest {
    pub filtering: SearchFiltering,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorting: Option<SearchSorting>,
    pub pagination: SearchPagination,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFiltering {
    pub destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<RatingFrom>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_minutes: Option<DurationBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingFrom {
    pub from: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DurationBounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchSorting {
    pub sort: String,
    pub order: String,
}

/// Provider pagination is 1-based `start`/`count`; `count` is capped at 50
/// server-side, so callers should clamp before building the request.
#[derive(Debug, Clone, Serialize)]
pub struct SearchPagination {
    pub start: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSearchResponse {
    #[serde(default)]
    pub products: Vec<ProductSummary>,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub product_code: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    pub pricing: Option<ProductPricing>,
    pub reviews: Option<ProductReviews>,
    pub duration: Option<ProductDuration>,
    #[serde(default)]
    pub destinations: Vec<ProductDestinationRef>,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub flags: Vec<String>,
    pub product_url: Option<String>,
    pub confirmation_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    #[serde(default)]
    pub is_cover: bool,
    #[serde(default)]
    pub variants: Vec<ImageVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVariant {
    pub url: String,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub width: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPricing {
    pub currency: Option<String>,
    pub summary: Option<PricingSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingSummary {
    pub from_price: Option<f64>,
    pub from_price_before_discount: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductReviews {
    pub combined_average_rating: Option<f64>,
    pub total_reviews: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDuration {
    pub fixed_duration_in_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDestinationRef {
    pub name: Option<String>,
    pub country: Option<String>,
}

// ---------------------------------------------------------------------------
// Taxonomy listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagListing {
    pub tag_id: i64,
    #[serde(default)]
    pub tag_name: String,
    pub parent_tag_id: Option<i64>,
    #[serde(default)]
    pub all_names_by_locale: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TagListEnvelope {
    #[serde(default)]
    pub tags: Vec<TagListing>,
}

// ---------------------------------------------------------------------------
// Destination listing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationListing {
    pub destination_id: i64,
    pub name: String,
    #[serde(rename = "type", default = "default_destination_kind")]
    pub kind: String,
    pub country_code: Option<String>,
    pub center: Option<GeoPoint>,
    #[serde(default)]
    pub rank: f64,
}

fn default_destination_kind() -> String {
    "city".to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DestinationListEnvelope {
    #[serde(default)]
    pub destinations: Vec<DestinationListing>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_request_serializes_to_camel_case() {
        let req = ProductSearchRequest {
            filtering: SearchFiltering {
                destination: "77".to_string(),
                start_date: Some("2026-03-15".to_string()),
                end_date: None,
                tags: Some(vec![10, 11]),
                lowest_price: Some(10.0),
                highest_price: None,
                rating: Some(RatingFrom { from: 4.0 }),
                duration_in_minutes: None,
                flags: Some(vec!["FREE_CANCELLATION".to_string()]),
            },
            currency: "EUR".to_string(),
            sorting: Some(SearchSorting {
                sort: "PRICE".to_string(),
                order: "ASCENDING".to_string(),
            }),
            pagination: SearchPagination { start: 1, count: 20 },
        };

        let json = serde_json::to_value(&req).expect("serialize");
        assert_eq!(json["filtering"]["destination"], "77");
        assert_eq!(json["filtering"]["startDate"], "2026-03-15");
        assert_eq!(json["filtering"]["lowestPrice"], 10.0);
        assert_eq!(json["filtering"]["rating"]["from"], 4.0);
        assert!(json["filtering"].get("endDate").is_none());
        assert!(json["filtering"].get("highestPrice").is_none());
        assert_eq!(json["sorting"]["sort"], "PRICE");
        assert_eq!(json["pagination"]["start"], 1);
    }

    #[test]
    fn product_summary_tolerates_sparse_payload() {
        let json = serde_json::json!({ "productCode": "TOUR-1" });
        let product: ProductSummary = serde_json::from_value(json).expect("deserialize");
        assert_eq!(product.product_code, "TOUR-1");
        assert!(product.title.is_empty());
        assert!(product.images.is_empty());
        assert!(product.pricing.is_none());
        assert!(product.tags.is_empty());
    }

    #[test]
    fn destination_listing_maps_type_field() {
        let json = serde_json::json!({
            "destinationId": 77,
            "name": "Paris",
            "type": "city",
            "countryCode": "FR",
            "center": { "latitude": 48.8566, "longitude": 2.3522 },
            "rank": 9.5
        });
        let dest: DestinationListing = serde_json::from_value(json).expect("deserialize");
        assert_eq!(dest.destination_id, 77);
        assert_eq!(dest.kind, "city");
        assert_eq!(dest.country_code.as_deref(), Some("FR"));
        let center = dest.center.expect("center");
        assert!((center.latitude - 48.8566).abs() < 1e-9);
    }
}
