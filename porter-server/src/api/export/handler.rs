//! Export API Handlers

use axum::{
    Json,
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
};
use http::header;
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    pub product_ids: Vec<i64>,
}

/// POST /api/export
///
/// Streams the package from its temp file; the file is gone once the
/// stream is dropped.
pub async fn export(
    State(state): State<ServerState>,
    Json(req): Json<ExportRequest>,
) -> AppResult<Response> {
    let settings = state.settings.load().await?;
    let package = state.exporter.export(&req.product_ids, &settings).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", package.file_name),
        ),
        (header::CONTENT_LENGTH, package.size.to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(package.file));

    Ok((headers, body).into_response())
}
