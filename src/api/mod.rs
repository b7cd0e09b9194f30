//! HTTP surface

pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use crate::core::Counter;

/// Largest accepted request body (256 KiB)
pub const BODY_LIMIT: usize = 256 * 1024;

pub fn router(counter: Arc<Counter>) -> Router {
    Router::new()
        .route("/track", post(handlers::track_handler))
        .route("/count", get(handlers::count_handler))
        .route("/stats", get(handlers::stats_handler))
        .route("/", get(handlers::index_handler))
        .route("/ping", get(handlers::ping_handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(counter)
}

/// `*` allows every origin, otherwise a comma separated list
pub fn cors_layer(cors: &str) -> CorsLayer {
    if cors == "*" {
        CorsLayer::new()
            .allow_origin(AnyOrigin)
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin)
    } else {
        let origins: Vec<HeaderValue> = cors
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin)
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("Handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false })),
    )
        .into_response()
}
