//! Playlist creation and lookup.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use transcoder_models::{CreatePlaylistRequest, PlaylistWithJobs};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /playlists
pub async fn create_playlist(
    State(state): State<AppState>,
    Json(req): Json<CreatePlaylistRequest>,
) -> ApiResult<(StatusCode, Json<PlaylistWithJobs>)> {
    if req.preset_ids.is_empty() {
        return Err(ApiError::bad_request("preset_ids must not be empty"));
    }
    let playlist = state.dispatcher.submit_playlist(req).await?;
    Ok((StatusCode::CREATED, Json(playlist)))
}

/// GET /playlists/:playlist_id
pub async fn get_playlist(
    State(state): State<AppState>,
    Path(playlist_id): Path<i64>,
) -> ApiResult<Json<PlaylistWithJobs>> {
    let playlist = state
        .playlists
        .get(playlist_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("playlist {playlist_id} not found")))?;
    Ok(Json(playlist))
}
