//! API handlers

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::core::Counter;
use crate::static_files;

#[derive(Debug, Default, Deserialize)]
pub struct TrackRequest {
    #[serde(rename = "userId", default)]
    pub user_id: Option<Value>,
}

impl TrackRequest {
    /// Visitor id as a string. Empty strings, `0`, `false` and `null` are anonymous.
    /// Arrays and objects are kept as compact JSON text.
    pub fn visitor_id(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => number_id(n),
            Value::Bool(true) => Some("true".to_string()),
            v @ (Value::Array(_) | Value::Object(_)) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Body of POST /track. Requests without a JSON body are anonymous
    /// visits; malformed JSON is rejected.
    pub fn from_body(headers: &HeaderMap, body: &[u8]) -> Result<Self, JsonRejection> {
        if !is_json(headers) || body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Json::<Self>::from_bytes(body).map(|Json(request)| request)
    }
}

/// `1.0` and `1` name the same visitor
fn number_id(n: &serde_json::Number) -> Option<String> {
    if let Some(i) = n.as_i64() {
        return (i != 0).then(|| i.to_string());
    }
    if let Some(u) = n.as_u64() {
        return Some(u.to_string());
    }
    n.as_f64()
        .filter(|f| *f != 0.0 && !f.is_nan())
        .map(|f| f.to_string())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

pub async fn ping_handler() -> impl IntoResponse {
    "pong"
}

/// POST /track - Count one app open
pub async fn track_handler(
    State(counter): State<Arc<Counter>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match TrackRequest::from_body(&headers, &body) {
        Ok(request) => request,
        Err(rejection) => return rejection.into_response(),
    };
    let visitor = request.visitor_id();

    match counter.record_visit(visitor.as_deref()).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(e) => {
            tracing::error!("Failed to record visit: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false })),
            )
                .into_response()
        }
    }
}

/// GET /count - Today's figures as JSON
pub async fn count_handler(State(counter): State<Arc<Counter>>) -> impl IntoResponse {
    Json(counter.today_summary())
}

/// GET /stats - Today's figures as text
pub async fn stats_handler(State(counter): State<Arc<Counter>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        counter.today_summary().to_string(),
    )
}

/// GET / - Today's figures as an HTML page
pub async fn index_handler(State(counter): State<Arc<Counter>>) -> Response {
    static_files::serve_index(&counter.today_summary())
}
