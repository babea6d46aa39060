//! Metrics tracking middleware
//!
//! Tracks request latency, counts and status codes per endpoint
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Records status and latency per normalized endpoint
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = normalize_endpoint(request.uri().path());

    let response = next.run(request).await;

    let latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    state
        .record_request(endpoint, response.status().as_u16(), latency_us)
        .await;

    response
}

/// Normalize endpoint paths for consistent metrics
///
/// Replaces id segments with placeholders to group similar endpoints. User
/// and page view ids may be caller-chosen strings, so the segment after
/// those collections is always an id.
fn normalize_endpoint(path: &str) -> String {
    let mut previous = "";
    let normalized: Vec<&str> = path
        .split('/')
        .map(|seg| {
            let is_id = is_uuid(seg)
                || is_numeric(seg)
                || (matches!(previous, "users" | "page-views") && !seg.is_empty());
            previous = seg;
            if is_id {
                ":id"
            } else {
                seg
            }
        })
        .collect();

    normalized.join("/")
}

/// Check if a string looks like a UUID
fn is_uuid(s: &str) -> bool {
    s.len() == 36
        && s.chars()
            .enumerate()
            .all(|(i, c)| match i {
                8 | 13 | 18 | 23 => c == '-',
                _ => c.is_ascii_hexdigit(),
            })
}

/// Check if a string is numeric (likely an ID)
fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}
