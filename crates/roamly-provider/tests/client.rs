//! Integration tests for `MarketplaceClient` using wiremock HTTP mocks.

use roamly_provider::{
    MarketplaceClient, ProductSearchRequest, ProviderError, RetryPolicy, SearchFiltering,
    SearchPagination,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn test_client(base_url: &str) -> MarketplaceClient {
    MarketplaceClient::with_base_url("test-key", 30, base_url)
        .expect("client construction should not fail")
        .with_retry_policy(RetryPolicy {
            max_retries: 3,
            backoff_base_ms: 0,
        })
}

fn search_request(destination: &str) -> ProductSearchRequest {
    ProductSearchRequest {
        filtering: SearchFiltering {
            destination: destination.to_string(),
            start_date: Some("2026-03-15".to_string()),
            end_date: Some("2026-03-20".to_string()),
            ..SearchFiltering::default()
        },
        currency: "EUR".to_string(),
        sorting: None,
        pagination: SearchPagination { start: 1, count: 20 },
    }
}

#[tokio::test]
async fn search_products_returns_parsed_products() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "products": [
            {
                "productCode": "TOUR-1",
                "title": "Louvre Guided Tour",
                "description": "Skip the line at the Louvre",
                "images": [
                    {
                        "isCover": true,
                        "variants": [
                            { "url": "https://img.example/s.jpg", "height": 150, "width": 200 },
                            { "url": "https://img.example/l.jpg", "height": 800, "width": 1200 }
                        ]
                    }
                ],
                "pricing": { "currency": "EUR", "summary": { "fromPrice": 52.0 } },
                "reviews": { "combinedAverageRating": 4.7, "totalReviews": 1234 },
                "duration": { "fixedDurationInMinutes": 150 },
                "destinations": [ { "name": "Paris", "country": "France" } ],
                "tags": [ 10, 11 ],
                "flags": [ "SKIP_THE_LINE" ],
                "productUrl": "https://marketplace.example/tours/TOUR-1",
                "confirmationType": "INSTANT"
            }
        ],
        "totalCount": 1
    });

    Mock::given(method("POST"))
        .and(path("/products/search"))
        .and(header("x-api-key", "test-key"))
        .and(header("Accept-Language", "en"))
        .and(body_partial_json(
            serde_json::json!({ "filtering": { "destination": "77" } }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client
        .search_products(&search_request("77"), "en")
        .await
        .expect("should parse search response");

    assert_eq!(response.total_count, 1);
    assert_eq!(response.products.len(), 1);
    let product = &response.products[0];
    assert_eq!(product.product_code, "TOUR-1");
    assert_eq!(product.tags, vec![10, 11]);
    assert_eq!(
        product
            .duration
            .as_ref()
            .and_then(|d| d.fixed_duration_in_minutes),
        Some(150)
    );
}

/// Responder that rate-limits the first two requests, then succeeds.
struct RateLimitedTwice {
    hits: std::sync::atomic::AtomicU32,
    success_body: serde_json::Value,
}

impl Respond for RateLimitedTwice {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if n < 2 {
            ResponseTemplate::new(429).insert_header("Retry-After", "0")
        } else {
            ResponseTemplate::new(200).set_body_json(&self.success_body)
        }
    }
}

#[tokio::test]
async fn search_products_retries_rate_limit_then_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/products/search"))
        .respond_with(RateLimitedTwice {
            hits: std::sync::atomic::AtomicU32::new(0),
            success_body: serde_json::json!({ "products": [], "totalCount": 0 }),
        })
        .expect(3)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let response = client
        .search_products(&search_request("77"), "en")
        .await
        .expect("third attempt should succeed");

    assert_eq!(response.total_count, 0);
}

#[tokio::test]
async fn search_products_surfaces_rate_limit_after_budget() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/products/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        // max_retries = 3 → 4 total attempts
        .expect(4)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.search_products(&search_request("77"), "en").await;

    assert!(matches!(
        result,
        Err(ProviderError::RateLimited { retry_after_secs: 0 })
    ));
}

#[tokio::test]
async fn search_products_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/products/search"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string("destination is required"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.search_products(&search_request("77"), "en").await;

    match result {
        Err(ProviderError::Status { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("destination is required"));
        }
        other => panic!("expected Status error, got: {other:?}"),
    }
}

#[tokio::test]
async fn list_tags_returns_taxonomy_entries() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "tags": [
            {
                "tagId": 10,
                "tagName": "Museums",
                "parentTagId": null,
                "allNamesByLocale": { "en": "Museums", "fr": "Musées" }
            },
            {
                "tagId": 11,
                "tagName": "Art Museums",
                "parentTagId": 10,
                "allNamesByLocale": { "en": "Art Museums" }
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/products/tags"))
        .and(header("Accept-Language", "fr"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let tags = client.list_tags("fr").await.expect("should parse tags");

    assert_eq!(tags.len(), 2);
    assert_eq!(tags[0].tag_id, 10);
    assert_eq!(tags[0].parent_tag_id, None);
    assert_eq!(tags[1].parent_tag_id, Some(10));
    assert_eq!(tags[0].all_names_by_locale.get("fr").map(String::as_str), Some("Musées"));
}

#[tokio::test]
async fn list_destinations_returns_places() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "destinations": [
            {
                "destinationId": 77,
                "name": "Paris",
                "type": "city",
                "countryCode": "FR",
                "center": { "latitude": 48.8566, "longitude": 2.3522 },
                "rank": 9.5
            },
            {
                "destinationId": 80,
                "name": "Île-de-France",
                "type": "region",
                "countryCode": "FR"
            }
        ]
    });

    Mock::given(method("GET"))
        .and(path("/destinations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let destinations = client
        .list_destinations()
        .await
        .expect("should parse destinations");

    assert_eq!(destinations.len(), 2);
    assert_eq!(destinations[0].destination_id, 77);
    assert_eq!(destinations[0].kind, "city");
    assert_eq!(destinations[1].kind, "region");
    assert!(destinations[1].center.is_none());
}

#[tokio::test]
async fn malformed_body_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/products/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let result = client.list_tags("en").await;

    assert!(matches!(result, Err(ProviderError::Deserialize { .. })));
}
