//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::handlers::{accounts, page_views, search};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Page views
        .route("/page-views", post(page_views::ingest_page_view))
        .route(
            "/page-views/:id",
            post(page_views::update_page_view).get(page_views::get_page_view),
        )
        // Search
        .route("/search", get(search::search_page_views))
        // Registration
        .route("/users", post(accounts::register_user))
        .route(
            "/users/:id/devices",
            post(accounts::register_device).get(accounts::list_devices),
        )
}
