//! Page view ingest, update and fetch handlers
//!
//! Bodies are free-form attribute objects; recognized fields are
//! `deviceGuid`, `predecessor`, `parent`, `pageUrl` and `pageOpenTime`.
//!
//! Author: hephaex@gmail.com

use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use trail_core::IngestOutcome;
use utoipa::ToSchema;

/// Free-form page view attributes
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PageViewBody(#[schema(value_type = Object)] pub Value);

/// Ingest response body
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IngestResponse {
    /// Id of the new page view
    pub id: String,
    /// `predecessor created successfully` or `predecessor could not be created`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predecessor: Option<String>,
    /// `parent created successfully` or `parent could not be created`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            id: outcome.id,
            predecessor: outcome.predecessor,
            parent: outcome.parent,
        }
    }
}

/// Update acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateResponse {
    pub message: String,
}

/// Record a page view
#[utoipa::path(
    post,
    path = "/api/v1/page-views",
    tag = "page-views",
    request_body(content = PageViewBody, description = "Page view attributes, `deviceGuid` required"),
    responses(
        (status = 200, description = "Page view created", body = IngestResponse),
        (status = 400, description = "Missing or invalid device reference", body = crate::error::ApiError),
        (status = 500, description = "Malformed attributes or storage failure", body = crate::error::ApiError)
    )
)]
pub async fn ingest_page_view(
    State(state): State<Arc<AppState>>,
    attributes: Result<Json<Value>, JsonRejection>,
) -> Result<Json<IngestResponse>, AppError> {
    state.increment_requests();
    let Json(attributes) = attributes?;

    let outcome = state.page_views.ingest(&attributes).await?;
    Ok(Json(outcome.into()))
}

/// Merge attributes onto an existing page view
#[utoipa::path(
    post,
    path = "/api/v1/page-views/{id}",
    tag = "page-views",
    params(("id" = String, Path, description = "Page view id")),
    request_body(content = PageViewBody, description = "Attributes to overwrite"),
    responses(
        (status = 200, description = "Page view updated", body = UpdateResponse),
        (status = 400, description = "Unknown page view", body = crate::error::ApiError),
        (status = 500, description = "Malformed attributes or storage failure", body = crate::error::ApiError)
    )
)]
pub async fn update_page_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    attributes: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UpdateResponse>, AppError> {
    state.increment_requests();
    let Json(attributes) = attributes?;

    let message = state.page_views.update(&id, &attributes).await?;
    Ok(Json(UpdateResponse {
        message: message.to_string(),
    }))
}

/// Fetch one page view with its parent and predecessor ids
#[utoipa::path(
    get,
    path = "/api/v1/page-views/{id}",
    tag = "page-views",
    params(("id" = String, Path, description = "Page view id")),
    responses(
        (status = 200, description = "Page view attributes", body = PageViewBody),
        (status = 404, description = "Unknown page view", body = crate::error::ApiError)
    )
)]
pub async fn get_page_view(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.increment_requests();

    let page_view = state
        .page_views
        .get(&id)
        .await
        .map_err(AppError::not_found_on_fetch)?;
    Ok(Json(page_view))
}
