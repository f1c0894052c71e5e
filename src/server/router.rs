//! Demo routes: three prefixes with their own TTL override and a fallback
//! governed by the route table.

use std::time::Duration;

use axum::http::StatusCode;
use axum::{Json, Router, middleware, routing::any};
use jiff::Timestamp;
use serde_json::{Value, json};
use tower_http::timeout::TimeoutLayer;

use crate::Staticize;
use crate::config::ConfigError;
use crate::server::request_id_middleware;

/// Build the demo application.
///
/// - `/cache30s/...` cached 30 seconds, `/cache60s/...` 60 seconds
/// - `/cache0s/...` and every other path follow the `[routes]` table
///
/// Every handler answers with the current time, so a repeated body means
/// the response came from the cache.
pub fn demo_router(staticize: &Staticize, request_timeout: u64) -> Result<Router, ConfigError> {
    let now = any(current_time);

    Ok(Router::new()
        .nest_service(
            "/cache30s",
            now.clone().layer(staticize.cache_middleware(Some(30), None, None)?),
        )
        .nest_service(
            "/cache60s",
            now.clone().layer(staticize.cache_middleware(Some(60), None, None)?),
        )
        .nest_service(
            "/cache0s",
            now.clone().layer(staticize.cache_middleware(None, None, None)?),
        )
        .fallback_service(now.layer(staticize.layer()))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(request_timeout_layer(request_timeout)))
}

/// Requests running longer than `seconds` are answered with `408 Request Timeout`
fn request_timeout_layer(seconds: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(seconds))
}

async fn current_time() -> Json<Value> {
    Json(json!({ "time": Timestamp::now().to_string() }))
}
