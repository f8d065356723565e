//! Admin-triggered maintenance routes: manual resyncs and cache invalidation.
//!
//! Scheduling and authorization live outside this service; these routes are
//! the entry points the operator tooling calls.

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;
use roamly_search::sync_destinations;

/// `POST /api/v1/admin/taxonomy/sync`
pub async fn sync_taxonomy(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<impl IntoResponse, ApiError> {
    match state.taxonomy.sync(&state.pool, &state.client, "en").await {
        Ok(report) => Ok(Json(ApiResponse {
            data: report,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(ApiError::from_search_error(req_id.0, &e)),
    }
}

/// `POST /api/v1/admin/destinations/sync`
pub async fn sync_destination_catalog(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<impl IntoResponse, ApiError> {
    match sync_destinations(&state.pool, &state.client, &state.resolver).await {
        Ok(report) => Ok(Json(ApiResponse {
            data: report,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(ApiError::from_search_error(req_id.0, &e)),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearCacheParams {
    /// Restrict invalidation to one destination's entries.
    pub destination_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClearCacheData {
    pub removed: u64,
}

/// `POST /api/v1/admin/cache/clear`
pub async fn clear_cache(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ClearCacheParams>,
) -> Result<impl IntoResponse, ApiError> {
    match state
        .orchestrator
        .clear_cache(params.destination_id.as_deref())
        .await
    {
        Ok(removed) => Ok(Json(ApiResponse {
            data: ClearCacheData { removed },
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(ApiError::from_search_error(req_id.0, &e)),
    }
}
