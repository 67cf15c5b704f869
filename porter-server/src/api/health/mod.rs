//! 健康检查路由
//!
//! ```json
//! { "status": "ok", "version": "0.1.0" }
//! ```
//!
//! `status` is `degraded` when the catalog database does not answer.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/health", get(health))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// ok | degraded
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let status = match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await
    {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unavailable");
            "degraded"
        }
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
    })
}
