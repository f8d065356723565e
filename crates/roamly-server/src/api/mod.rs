mod admin;
mod search;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{request_id, RequestId};
use roamly_provider::MarketplaceClient;
use roamly_search::{LocationResolver, SearchError, SearchOrchestrator, TaxonomyIndex};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub client: Arc<MarketplaceClient>,
    pub resolver: Arc<LocationResolver>,
    pub taxonomy: Arc<TaxonomyIndex>,
    pub orchestrator: Arc<SearchOrchestrator>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    /// Map a pipeline failure onto its stable code and message.
    pub fn from_search_error(request_id: String, error: &SearchError) -> Self {
        match error {
            SearchError::Validation(_) | SearchError::LocationNotFound { .. } => {
                tracing::info!(code = error.code(), error = %error, "request rejected");
            }
            _ => {
                tracing::error!(code = error.code(), error = %error, "search pipeline failed");
            }
        }
        Self::new(request_id, error.code(), error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "location_not_found" | "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "upstream_unavailable" | "upstream_rejected" => StatusCode::BAD_GATEWAY,
            "store_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/activities/search", post(search::search_activities))
        .route("/api/v1/admin/taxonomy/sync", post(admin::sync_taxonomy))
        .route(
            "/api/v1/admin/destinations/sync",
            post(admin::sync_destination_catalog),
        )
        .route("/api/v1/admin/cache/clear", post(admin::clear_cache))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match roamly_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use roamly_provider::RetryPolicy;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_state(pool: sqlx::PgPool, provider_base_url: &str) -> AppState {
        let client = Arc::new(
            MarketplaceClient::with_base_url("test-key", 30, provider_base_url)
                .expect("client")
                .with_retry_policy(RetryPolicy {
                    max_retries: 1,
                    backoff_base_ms: 0,
                }),
        );
        let resolver = Arc::new(LocationResolver::new(pool.clone(), 80.0, 1000));
        let taxonomy = Arc::new(TaxonomyIndex::new());
        let orchestrator = Arc::new(SearchOrchestrator::new(
            pool.clone(),
            Arc::clone(&client),
            Arc::clone(&resolver),
            Arc::clone(&taxonomy),
            3600,
            30,
        ));
        AppState {
            pool,
            client,
            resolver,
            taxonomy,
            orchestrator,
        }
    }

    async fn seed_destination(pool: &sqlx::PgPool, destination_id: &str, name: &str, country: &str) {
        sqlx::query(
            "INSERT INTO destinations (destination_id, name, kind, country_code, lookup_rank) \
             VALUES ($1, $2, 'city', $3, 1.0)",
        )
        .bind(destination_id)
        .bind(name)
        .bind(country)
        .execute(pool)
        .await
        .expect("seed destination");
    }

    fn search_body(destination_id: &str) -> serde_json::Value {
        serde_json::json!({
            "location": { "destination_id": destination_id },
            "dates": { "start": "2026-03-15", "end": "2026-03-20" }
        })
    }

    async fn post_json(
        app: Router,
        uri: &str,
        body: &serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .expect("request"),
            )
            .await
            .expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json parse");
        (status, json)
    }

    fn provider_success_body() -> serde_json::Value {
        serde_json::json!({
            "products": [
                {
                    "productCode": "TOUR-1",
                    "title": "Louvre Guided Tour",
                    "description": "Skip the line",
                    "pricing": { "currency": "EUR", "summary": { "fromPrice": 52.0 } },
                    "reviews": { "combinedAverageRating": 4.7, "totalReviews": 1234 },
                    "duration": { "fixedDurationInMinutes": 150 },
                    "destinations": [ { "name": "Paris", "country": "France" } ],
                    "tags": [ 10 ]
                }
            ],
            "totalCount": 1
        })
    }

    #[test]
    fn api_error_codes_map_to_statuses() {
        let cases = [
            ("validation_error", StatusCode::BAD_REQUEST),
            ("location_not_found", StatusCode::NOT_FOUND),
            ("upstream_unavailable", StatusCode::BAD_GATEWAY),
            ("upstream_rejected", StatusCode::BAD_GATEWAY),
            ("store_unavailable", StatusCode::SERVICE_UNAVAILABLE),
            ("internal_error", StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (code, expected) in cases {
            let response = ApiError::new("req-1", code, "message").into_response();
            assert_eq!(response.status(), expected, "code {code}");
        }
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_returns_ok(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool, "http://localhost:9"));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["data"]["status"], "ok");
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn search_misses_then_hits_cache_with_one_upstream_call(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/products/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider_success_body()))
            .expect(1)
            .mount(&server)
            .await;

        let state = test_state(pool, &server.uri());

        let (status, first) =
            post_json(build_app(state.clone()), "/api/v1/activities/search", &search_body("77"))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["cache"]["cached"], false);
        assert_eq!(first["data"]["results"]["total"], 1);
        assert_eq!(
            first["data"]["results"]["activities"][0]["id"],
            "TOUR-1"
        );
        assert_eq!(first["data"]["location"]["destination_id"], "77");
        assert_eq!(first["data"]["location"]["confidence"], 100.0);

        // An identical repeated request is served from cache; the mock's
        // expect(1) fails the test if a second upstream call happens.
        let (status, second) =
            post_json(build_app(state), "/api/v1/activities/search", &search_body("77")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["data"]["cache"]["cached"], true);
        assert!(second["data"]["cache"]["cached_at"].is_string());
        assert_eq!(second["data"]["results"]["total"], 1);
        assert_eq!(
            second["data"]["results"]["activities"][0]["id"],
            "TOUR-1"
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn search_resolves_hinted_city_over_foreign_duplicate(pool: sqlx::PgPool) {
        seed_destination(&pool, "77", "Paris", "FR").await;
        seed_destination(&pool, "1022", "Paris", "US").await;

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/products/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(provider_success_body()))
            .mount(&server)
            .await;

        let body = serde_json::json!({
            "location": { "place": "Paris", "country_hint": "FR" },
            "dates": { "start": "2026-03-15" }
        });
        let (status, json) = post_json(
            build_app(test_state(pool, &server.uri())),
            "/api/v1/activities/search",
            &body,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["location"]["destination_id"], "77");
        assert_eq!(json["data"]["location"]["matched_name"], "Paris");
        assert_eq!(json["data"]["location"]["confidence"], 100.0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unresolvable_place_returns_404_with_stable_code(pool: sqlx::PgPool) {
        seed_destination(&pool, "77", "Paris", "FR").await;

        let body = serde_json::json!({
            "location": { "place": "Zzyzzxville" },
            "dates": { "start": "2026-03-15" }
        });
        let (status, json) = post_json(
            build_app(test_state(pool, "http://localhost:9")),
            "/api/v1/activities/search",
            &body,
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "location_not_found");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn invalid_request_returns_400(pool: sqlx::PgPool) {
        let body = serde_json::json!({
            "location": { "destination_id": "77" },
            "dates": { "start": "2026-03-20", "end": "2026-03-15" }
        });
        let (status, json) = post_json(
            build_app(test_state(pool, "http://localhost:9")),
            "/api/v1/activities/search",
            &body,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn upstream_rejection_maps_to_bad_gateway(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/products/search"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
            .mount(&server)
            .await;

        let (status, json) = post_json(
            build_app(test_state(pool, &server.uri())),
            "/api/v1/activities/search",
            &search_body("77"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["code"], "upstream_rejected");
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn admin_taxonomy_sync_populates_index_and_store(pool: sqlx::PgPool) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "tags": [
                    { "tagId": 10, "tagName": "Museums", "parentTagId": null,
                      "allNamesByLocale": { "en": "Museums" } },
                    { "tagId": 11, "tagName": "Art Museums", "parentTagId": 10,
                      "allNamesByLocale": { "en": "Art Museums" } }
                ]
            })))
            .mount(&server)
            .await;

        let state = test_state(pool.clone(), &server.uri());
        let (status, json) = post_json(
            build_app(state.clone()),
            "/api/v1/admin/taxonomy/sync",
            &serde_json::json!({}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["fetched"], 2);
        assert_eq!(json["data"]["updated"], 2);
        assert_eq!(json["data"]["errored"], 0);
        assert_eq!(json["data"]["root_tags"], 1);
        assert_eq!(json["data"]["child_tags"], 1);

        let ids = state.taxonomy.lookup("museum");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![10, 11]);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM taxonomy_tags")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 2);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn admin_cache_clear_reports_removed_rows(pool: sqlx::PgPool) {
        roamly_db::cache_put(&pool, "77:abc", &serde_json::json!({}), 3600)
            .await
            .expect("put");
        roamly_db::cache_put(&pool, "512:def", &serde_json::json!({}), 3600)
            .await
            .expect("put");

        let (status, json) = post_json(
            build_app(test_state(pool.clone(), "http://localhost:9")),
            "/api/v1/admin/cache/clear?destination_id=77",
            &serde_json::json!({}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["removed"], 1);

        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM search_cache")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(remaining, 1);
    }
}
