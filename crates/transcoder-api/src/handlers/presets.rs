//! Preset CRUD.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use transcoder_models::{CreatePresetRequest, Preset};

use crate::error::ApiResult;
use crate::state::AppState;

/// POST /presets
pub async fn create_preset(
    State(state): State<AppState>,
    Json(req): Json<CreatePresetRequest>,
) -> ApiResult<(StatusCode, Json<Preset>)> {
    let preset = state.presets.create(&req).await?;
    Ok((StatusCode::CREATED, Json(preset)))
}

/// GET /presets/:preset_id
pub async fn get_preset(
    State(state): State<AppState>,
    Path(preset_id): Path<i64>,
) -> ApiResult<Json<Preset>> {
    let preset = state
        .presets
        .get(preset_id)
        .await?
        .ok_or_else(|| crate::error::ApiError::not_found(format!("preset {preset_id} not found")))?;
    Ok(Json(preset))
}

/// GET /presets
pub async fn list_presets(State(state): State<AppState>) -> ApiResult<Json<Vec<Preset>>> {
    Ok(Json(state.presets.list().await?))
}

/// DELETE /presets/:preset_id
pub async fn delete_preset(
    State(state): State<AppState>,
    Path(preset_id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.presets.delete(preset_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
