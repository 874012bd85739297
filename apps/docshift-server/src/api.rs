//! API handlers for the docshift gateway
//!
//! Provides REST endpoints for:
//! - Health checks
//! - Converting an uploaded file, inline HTML, or a remote URL

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection,
        DefaultBodyLimit, Multipart, State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ServerError;
use crate::fetch::parse_url;
use crate::pipeline;
use crate::source::{InlineHtml, RemoteDocument, UploadedFile};
use crate::state::AppState;

/// Build the gateway router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/convert/upload", post(handle_convert_upload))
        .route("/convert/html", post(handle_convert_html))
        .route("/convert/url", post(handle_convert_url))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Inline conversion request body
#[derive(Deserialize)]
pub struct HtmlRequest {
    #[serde(default)]
    pub html: Option<String>,
}

/// Remote conversion request body
#[derive(Deserialize)]
pub struct UrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

/// Handler: POST /convert/upload
pub async fn handle_convert_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let mut multipart = multipart.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    let upload = read_upload(&mut multipart).await?;
    info!("Convert request: upload");
    pipeline::convert(&state, upload).await
}

/// Handler: POST /convert/html
pub async fn handle_convert_html(
    State(state): State<AppState>,
    payload: Result<Json<HtmlRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    let html = req
        .html
        .filter(|html| !html.trim().is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("Field 'html' is required".to_string()))?;

    info!("Convert request: inline, {} bytes", html.len());
    pipeline::convert(&state, InlineHtml::new(html)).await
}

/// Handler: POST /convert/url
pub async fn handle_convert_url(
    State(state): State<AppState>,
    payload: Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let Json(req) = payload.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    let raw = req
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("Field 'url' is required".to_string()))?;
    let url = parse_url(&raw).map_err(ServerError::InvalidRequest)?;

    info!("Convert request: url={}", url);
    pipeline::convert(&state, RemoteDocument::new(url, state.fetcher.clone())).await
}

/// Pull the `file` part out of a multipart body
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedFile, ServerError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        ServerError::InvalidRequest(format!("Invalid multipart body: {}", e))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                ServerError::InvalidRequest("Uploaded file has no filename".to_string())
            })?;
        let bytes = field.bytes().await.map_err(invalid)?;
        return Ok(UploadedFile::new(file_name, bytes.to_vec()));
    }

    Err(ServerError::InvalidRequest(
        "Multipart field 'file' is required".to_string(),
    ))
}
