//! Settings API Handlers

use axum::{Json, extract::State};
use shared::models::{PorterSettings, PorterSettingsUpdate};

use crate::core::ServerState;
use crate::utils::{ApiResponse, AppResult};

/// GET /api/settings
pub async fn get(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<PorterSettings>>> {
    let settings = state.settings.load().await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// PUT /api/settings
pub async fn update(
    State(state): State<ServerState>,
    Json(payload): Json<PorterSettingsUpdate>,
) -> AppResult<Json<ApiResponse<PorterSettings>>> {
    let settings = state.settings.save(&payload).await?;
    Ok(Json(ApiResponse::success(settings)))
}
