//! Multipart upload and object download/presign, against the Blob Store
//! Client. Carries no business logic of its own: the remote key is handed
//! back for the caller to use as a job's `input_s3_path`.

use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
}

/// POST /upload — accepts a single-part multipart file, stores it under a
/// generated key, and returns the key for use as a job's `input_s3_path`.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
        .ok_or_else(|| ApiError::bad_request("multipart body has no fields"))?;

    let original_name = field.file_name().unwrap_or("upload.bin").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::bad_request(format!("failed to read upload body: {e}")))?;

    let key = format!("uploads/{}-{}", Uuid::new_v4(), original_name);
    state.blob.upload_bytes(data.to_vec(), &key, &content_type).await?;

    Ok(Json(UploadResponse { key }))
}

/// GET /download/:key — streams the object back to the caller.
pub async fn download(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Response> {
    let data = state.blob.download_bytes(&key).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        Body::from(data),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires_in_secs: u64,
}

/// GET /download/:key/signed — a time-limited presigned URL instead of a
/// proxied stream.
pub async fn download_signed(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SignedUrlResponse>> {
    let url = state.blob.presign(&key, DEFAULT_PRESIGN_EXPIRY).await?;
    Ok(Json(SignedUrlResponse {
        url,
        expires_in_secs: DEFAULT_PRESIGN_EXPIRY.as_secs(),
    }))
}
