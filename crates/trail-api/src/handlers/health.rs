//! Health check handlers
//!
//! Author: hephaex@gmail.com

use crate::state::{AppState, EndpointMetrics};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;
use utoipa::ToSchema;

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build_info: BuildInfo,
}

#[derive(Serialize, ToSchema)]
pub struct BuildInfo {
    pub name: String,
    pub rust_version: String,
}

/// Liveness probe - basic health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build_info: BuildInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            rust_version: "1.75+".to_string(),
        },
    })
}

/// Readiness response
#[derive(Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Serialize, ToSchema)]
pub struct ReadinessChecks {
    pub graph_store: bool,
    pub backend: String,
}

/// Readiness probe - checks the graph store
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Service is ready", body = ReadinessResponse),
        (status = 503, description = "Service not ready", body = ReadinessResponse)
    )
)]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Graph store ping failed");
            false
        }
    };
    let ready = state.is_ready() && store_ok;

    let response = ReadinessResponse {
        ready,
        checks: ReadinessChecks {
            graph_store: store_ok,
            backend: state.store.name().to_string(),
        },
    };

    if ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// JSON metrics response
#[derive(Serialize, ToSchema)]
pub struct MetricsResponse {
    pub uptime_seconds: u64,
    pub total_requests: u64,
    pub requests_per_second: f64,
    pub backend: String,
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Request counters", body = MetricsResponse)
    )
)]
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let uptime = state.uptime_secs();
    let total_requests = state.get_request_count();
    let rps = if uptime > 0 {
        total_requests as f64 / uptime as f64
    } else {
        0.0
    };

    Json(MetricsResponse {
        uptime_seconds: uptime,
        total_requests,
        requests_per_second: rps,
        backend: state.store.name().to_string(),
    })
}

/// Prometheus-compatible metrics endpoint
pub async fn prometheus_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut output = String::new();

    let _ = writeln!(output, "# HELP trail_uptime_seconds Time since server start");
    let _ = writeln!(output, "# TYPE trail_uptime_seconds gauge");
    let _ = writeln!(output, "trail_uptime_seconds {}\n", state.uptime_secs());

    let _ = writeln!(output, "# HELP trail_requests_total Total number of HTTP requests");
    let _ = writeln!(output, "# TYPE trail_requests_total counter");
    let _ = writeln!(output, "trail_requests_total {}\n", state.get_request_count());

    let _ = writeln!(output, "# HELP trail_build_info Build information");
    let _ = writeln!(output, "# TYPE trail_build_info gauge");
    let _ = writeln!(
        output,
        "trail_build_info{{version=\"{}\",backend=\"{}\"}} 1\n",
        env!("CARGO_PKG_VERSION"),
        state.store.name()
    );

    let metrics = state.metrics.read().await;
    let mut endpoints: Vec<_> = metrics.iter().collect();
    endpoints.sort_by(|a, b| a.0.cmp(b.0));

    let _ = writeln!(output, "# HELP trail_http_requests_total HTTP requests by endpoint and status");
    let _ = writeln!(output, "# TYPE trail_http_requests_total counter");
    for (endpoint, endpoint_metrics) in &endpoints {
        let mut statuses: Vec<_> = endpoint_metrics.status_counts.iter().collect();
        statuses.sort();
        for (status, count) in statuses {
            let _ = writeln!(
                output,
                "trail_http_requests_total{{endpoint=\"{endpoint}\",status=\"{status}\"}} {count}"
            );
        }
    }
    output.push('\n');

    let _ = writeln!(output, "# HELP trail_http_request_duration_seconds HTTP request latency");
    let _ = writeln!(output, "# TYPE trail_http_request_duration_seconds histogram");
    for (endpoint, endpoint_metrics) in &endpoints {
        write_histogram(&mut output, endpoint, endpoint_metrics);
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}

fn write_histogram(output: &mut String, endpoint: &str, metrics: &EndpointMetrics) {
    if metrics.latency_count == 0 {
        return;
    }

    let buckets = &metrics.latency_buckets;
    let mut cumulative = 0u64;
    for (le, count) in [
        ("0.01", buckets.under_10ms),
        ("0.05", buckets.ms_10_50),
        ("0.1", buckets.ms_50_100),
        ("0.5", buckets.ms_100_500),
        ("1.0", buckets.ms_500_1000),
        ("+Inf", buckets.over_1s),
    ] {
        cumulative += count;
        let _ = writeln!(
            output,
            "trail_http_request_duration_seconds_bucket{{endpoint=\"{endpoint}\",le=\"{le}\"}} {cumulative}"
        );
    }

    let total_sum_s = metrics.total_latency_us as f64 / 1_000_000.0;
    let _ = writeln!(
        output,
        "trail_http_request_duration_seconds_sum{{endpoint=\"{endpoint}\"}} {total_sum_s:.6}"
    );
    let _ = writeln!(
        output,
        "trail_http_request_duration_seconds_count{{endpoint=\"{endpoint}\"}} {}",
        metrics.latency_count
    );
}
