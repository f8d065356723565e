//! The activity search route.

use axum::{extract::State, response::IntoResponse, Extension, Json};

use super::{ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;
use roamly_search::SearchRequest;

/// `POST /api/v1/activities/search`
///
/// Runs the full resolve → cache → fetch → transform → persist pipeline and
/// returns the result set annotated with cache metadata.
pub async fn search_activities(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match state.orchestrator.search(&request).await {
        Ok(response) => Ok(Json(ApiResponse {
            data: response,
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(e) => Err(ApiError::from_search_error(req_id.0, &e)),
    }
}
