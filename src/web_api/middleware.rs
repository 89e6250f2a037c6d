//! Request gates composed ahead of endpoint dispatch
//!
//! Two gates, in order: the rate-limit gate, then HTTPS enforcement. A
//! rejection short-circuits the chain with a fixed response and never
//! reaches a handler.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Instant;

use crate::state::AppState;

/// Rate-limit gate: consult the sliding window for the remote address and
/// answer 429 without forwarding when the client is over its limit.
pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let client = addr.ip().to_string();
    if !state.rate_limiter.allow(&client, Instant::now()) {
        tracing::warn!(client = %client, "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "detail": "Too Many Requests" })),
        )
            .into_response();
    }
    next.run(request).await
}

/// HTTPS-enforcement gate: when `strict_https` is set, answer plaintext
/// requests with a redirect to the same URL under the https scheme.
pub async fn enforce_https(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.config.strict_https && !is_secure(&request) {
        if let Some(location) = https_location(request.uri(), request.headers()) {
            tracing::warn!(location = %location, "Redirecting plaintext request to https");
            return Redirect::temporary(&location).into_response();
        }
    }
    next.run(request).await
}

/// The service itself only terminates plain HTTP; a request counts as secure
/// when a TLS-terminating proxy says so via `x-forwarded-proto`.
fn is_secure(request: &Request) -> bool {
    if request.uri().scheme_str() == Some("https") {
        return true;
    }
    request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("https"))
        .unwrap_or(false)
}

/// Rebuild the request URL under the https scheme. None when no host is
/// known (the request then passes through instead of redirecting nowhere).
fn https_location(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    let host = uri.authority().map(|a| a.to_string()).or_else(|| {
        headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    })?;
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Some(format!("https://{host}{path}"))
}
