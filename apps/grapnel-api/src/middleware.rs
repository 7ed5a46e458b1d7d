//! Global request middleware: per-client admission control and timing.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use grapnel_cache::Admission;
use grapnel_notifications::ErrorResponse;

use crate::state::AppState;

pub const PROCESS_TIME_HEADER: &str = "x-process-time";

/// Paths never counted against the global ceiling.
const EXEMPT_PATHS: [&str; 2] = ["/health", "/ready"];

/// Best-effort client IP: `X-Forwarded-For` (first entry), then `X-Real-IP`,
/// then the peer address.
pub fn extract_client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let header_ip = |name: &str, first_only: bool| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| if first_only { v.split(',').next() } else { Some(v) })
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for", true)
        .or_else(|| header_ip("x-real-ip", false))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

fn add_rate_limit_headers(headers: &mut header::HeaderMap, admission: &Admission) {
    headers.insert(
        HeaderName::from_static("x-ratelimit-limit"),
        HeaderValue::from(admission.limit),
    );
    headers.insert(
        HeaderName::from_static("x-ratelimit-remaining"),
        HeaderValue::from(admission.remaining()),
    );
}

fn rate_limit_exceeded_response(admission: &Admission) -> Response {
    let body = ErrorResponse {
        error: "rate_limit_exceeded".to_string(),
        message: "Too many requests. Try again later.".to_string(),
        status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    add_rate_limit_headers(response.headers_mut(), admission);
    response.headers_mut().insert(
        header::RETRY_AFTER,
        HeaderValue::from(admission.window.as_secs()),
    );
    response
}

/// Enforce the per-client ceiling under `global:{client_ip}`.
///
/// Requests from clients whose address cannot be determined, and all requests
/// while the limiter's cache is unavailable, are admitted.
pub async fn global_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if EXEMPT_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    let Some(ip) = extract_client_ip(&request) else {
        tracing::debug!(target: "rate_limit", "Cannot determine client IP, allowing request");
        return next.run(request).await;
    };

    match state
        .rate_limiter
        .admit(&format!("global:{ip}"), state.global_rate_limit)
        .await
    {
        Ok(admission) if admission.allowed() => {
            let mut response = next.run(request).await;
            add_rate_limit_headers(response.headers_mut(), &admission);
            response
        }
        Ok(admission) => rate_limit_exceeded_response(&admission),
        Err(e) => {
            tracing::warn!(
                target: "rate_limit",
                client_ip = %ip,
                error = %e,
                "Rate limiter unavailable, admitting request"
            );
            next.run(request).await
        }
    }
}

/// Stamp `X-Process-Time` (seconds) on every response.
pub async fn process_time_middleware(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = format!("{:.6}", started.elapsed().as_secs_f64());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(PROCESS_TIME_HEADER), value);
    }
    response
}
