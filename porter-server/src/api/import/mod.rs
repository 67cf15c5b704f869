//! Import API
//!
//! Setup uploads the package once; the client then drives batches until
//! `completed` and finally calls cleanup.

mod handler;

use axum::{Router, extract::DefaultBodyLimit, routing::post};

use crate::core::ServerState;

pub fn router(max_upload_bytes: usize) -> Router<ServerState> {
    Router::new().nest("/api/import", routes(max_upload_bytes))
}

fn routes(max_upload_bytes: usize) -> Router<ServerState> {
    Router::new()
        .route(
            "/setup",
            post(handler::setup).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/batch", post(handler::batch))
        .route("/cleanup", post(handler::cleanup))
}
