//! Browsing history search handler
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use trail_core::SearchQuery;
use utoipa::ToSchema;

/// Search response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SearchResponse {
    /// Flattened page views in discovery order
    #[schema(value_type = Vec<crate::handlers::page_views::PageViewBody>)]
    pub results: Vec<Value>,
}

/// Search a user's page views around a point in time
#[utoipa::path(
    get,
    path = "/api/v1/search",
    tag = "search",
    params(
        ("userGuid" = String, Query, description = "User whose devices are searched"),
        ("openTime" = String, Query, description = "Window centre, epoch milliseconds"),
        ("timeRange" = Option<i64>, Query, description = "Window half-width (default 30)"),
        ("timeRangeUnits" = Option<String>, Query, description = "seconds, minutes or hours (default minutes)"),
        ("domain" = Option<String>, Query, description = "Only page views under this domain"),
        ("includeSuccessors" = Option<bool>, Query, description = "Follow navigation successors"),
        ("includeChildren" = Option<bool>, Query, description = "Follow child page views")
    ),
    responses(
        (status = 200, description = "Matching page views", body = SearchResponse),
        (status = 400, description = "Missing parameters or unknown user", body = crate::error::ApiError)
    )
)]
pub async fn search_page_views(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    state.increment_requests();
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let start = Instant::now();
    let results = state.search.search(&query).await?;

    tracing::debug!(
        user = %query.user_guid,
        results = results.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Search completed"
    );

    Ok(Json(SearchResponse { results }))
}
