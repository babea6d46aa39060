//! HTTP middleware
//!
//! Author: hephaex@gmail.com

pub mod metrics;

pub use metrics::metrics_middleware;

use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use trail_core::config::ServerConfig;

/// CORS layer from server configuration
///
/// No configured origins means any origin is accepted.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}
