//! Request logging middleware.
//!
//! Logs every HTTP request with method, path, status code, and latency.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn, Instrument};

const HEALTH_PATH: &str = "/api/v1/health";

/// Logs at INFO for completed requests, WARN for 5xx.
///
/// The client address is included when the server was started with
/// `into_make_service_with_connect_info`.
pub async fn request_logging(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // Skip logging for health checks to reduce noise
    if path == HEALTH_PATH {
        return next.run(request).await;
    }

    let client_ip = connect_info
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "-".to_string());

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        client_ip = %client_ip,
    );

    let start = Instant::now();
    let response = next.run(request).instrument(span).await;
    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    if status >= 500 {
        warn!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            client_ip = %client_ip,
            "Request failed (5xx)"
        );
    } else if status >= 400 {
        info!(
            method = %method,
            path = %path,
            status,
            latency_ms,
            client_ip = %client_ip,
            "Request completed (4xx)"
        );
    } else {
        info!(method = %method, path = %path, status, latency_ms, "Request completed");
    }

    response
}
