//! HTML stats page with external override support
//!
//! Priority: ./static/index.html > embedded default

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::RustEmbed;
use std::path::PathBuf;

use crate::core::DailySummary;

#[derive(RustEmbed)]
#[folder = "static/"]
struct Assets;

const STATIC_DIR: &str = "static";
const INDEX: &str = "index.html";

/// Try to read from external static dir first, fallback to embedded
fn read_file(path: &str) -> Option<Vec<u8>> {
    let external_path = PathBuf::from(STATIC_DIR).join(path);
    if external_path.exists() {
        if let Ok(content) = std::fs::read(&external_path) {
            tracing::debug!("Serving external: {}", external_path.display());
            return Some(content);
        }
    }

    Assets::get(path).map(|f| f.data.to_vec())
}

/// Fill the page template with today's figures
pub fn render_index(summary: &DailySummary) -> Option<String> {
    let content = read_file(INDEX)?;
    let text = String::from_utf8_lossy(&content);
    Some(
        text.replace("{{DATE}}", &summary.date)
            .replace("{{UNIQUE}}", &summary.unique.to_string())
            .replace("{{TOTAL}}", &summary.total.to_string()),
    )
}

pub fn serve_index(summary: &DailySummary) -> Response {
    match render_index(summary) {
        Some(html) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            html,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}
