//! Import API Handlers

use axum::{
    Json,
    extract::{Multipart, State},
};
use serde::Deserialize;
use serde_json::Value;
use shared::models::record::lenient::{self, truthy};

use crate::core::ServerState;
use crate::import::{BatchResult, ImportError, SetupResult};
use crate::utils::{ApiResponse, AppError, AppResult};

const FIELD_FILE: &str = "import_file";
const FIELD_UPDATE_EXISTING: &str = "update_existing";

/// POST /api/import/setup
pub async fn setup(
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<SetupResult>>> {
    let mut package: Option<Vec<u8>> = None;
    let mut update_existing = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart request: {e}")))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(FIELD_FILE) => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?;
                package = Some(bytes.to_vec());
            }
            Some(FIELD_UPDATE_EXISTING) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::validation(format!("Multipart error: {e}")))?;
                update_existing = truthy(&Value::String(text));
            }
            _ => {}
        }
    }

    let package = package.ok_or(ImportError::MissingFile)?;
    let result = state.importer.setup(package, update_existing).await?;
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub import_id: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub batch: Option<i64>,
}

impl BatchRequest {
    /// Requested batch number, at least 1
    pub fn batch_number(&self) -> usize {
        usize::try_from(self.batch.unwrap_or(1).max(1)).unwrap_or(1)
    }
}

/// POST /api/import/batch
pub async fn batch(
    State(state): State<ServerState>,
    Json(req): Json<BatchRequest>,
) -> AppResult<Json<ApiResponse<BatchResult>>> {
    let result = state
        .importer
        .process_batch(req.import_id.trim(), req.batch_number())
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    #[serde(default)]
    pub import_id: Option<String>,
}

/// POST /api/import/cleanup
///
/// Always succeeds; a missing or unknown id is a no-op.
pub async fn cleanup(
    State(state): State<ServerState>,
    Json(req): Json<CleanupRequest>,
) -> Json<ApiResponse<()>> {
    if let Some(import_id) = req.import_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        state.importer.cleanup(import_id).await;
    }
    Json(ApiResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch_of(body: Value) -> usize {
        serde_json::from_value::<BatchRequest>(body).unwrap().batch_number()
    }

    #[test]
    fn test_batch_number_is_clamped() {
        assert_eq!(batch_of(json!({ "import_id": "abc" })), 1);
        assert_eq!(batch_of(json!({ "batch": 3 })), 3);
        assert_eq!(batch_of(json!({ "batch": "4" })), 4);
        assert_eq!(batch_of(json!({ "batch": 0 })), 1);
        assert_eq!(batch_of(json!({ "batch": -2 })), 1);
        assert_eq!(batch_of(json!({ "batch": "next" })), 1);
        assert_eq!(batch_of(json!({ "batch": null })), 1);
    }
}
