//! Trail API - page-view graph REST server
//!
//! Ingests page views, merges attribute updates and searches a user's
//! browsing history over a shared graph store.
//!
//! Author: hephaex@gmail.com

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{middleware as axum_middleware, routing::get, Json, Router};
use handlers::{accounts, health, page_views, search};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use utoipa::OpenApi;

/// OpenAPI document
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Trail API",
        description = "Page-view browsing graph: ingest, update and search"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        health::metrics,
        page_views::ingest_page_view,
        page_views::update_page_view,
        page_views::get_page_view,
        search::search_page_views,
        accounts::register_user,
        accounts::register_device,
        accounts::list_devices,
    ),
    components(schemas(
        error::ApiError,
        health::HealthResponse,
        health::BuildInfo,
        health::ReadinessResponse,
        health::ReadinessChecks,
        health::MetricsResponse,
        page_views::PageViewBody,
        page_views::IngestResponse,
        page_views::UpdateResponse,
        search::SearchResponse,
        accounts::RegisterUserRequest,
        accounts::RegisterDeviceRequest,
        accounts::RegisteredResponse,
        accounts::DeviceListResponse,
    )),
    tags(
        (name = "health", description = "Liveness, readiness and metrics"),
        (name = "page-views", description = "Page view ingest and update"),
        (name = "search", description = "Browsing history search"),
        (name = "accounts", description = "User and device registration")
    )
)]
pub struct ApiDoc;

/// Build the application router with every layer applied
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;
    let timeout = Duration::from_secs(server.request_timeout_secs);
    let body_limit = server.max_body_size;
    let cors = server.cors_enabled.then(|| middleware::cors_layer(server));

    let router = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::prometheus_metrics))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/v1", routes::api_routes())
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::metrics_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http());

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// Router over a fresh in-memory graph with default configuration
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::default()))
}
