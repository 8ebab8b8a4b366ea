//! Playlists: a single input fanned across an ordered list of presets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: i64,
    pub name: String,
    pub input_s3_path: String,
    pub created_at: DateTime<Utc>,
}

/// Request to create a playlist: one input, an ordered list of preset ids.
/// Member jobs are created atomically with the playlist row; see the job
/// store's `create_playlist_with_jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlaylistRequest {
    pub name: String,
    pub input_s3_path: String,
    pub preset_ids: Vec<i64>,
}

/// A playlist together with the external job ids it fanned out to, in order.
#[derive(Debug, Clone, Serialize)]
pub struct PlaylistWithJobs {
    pub playlist: Playlist,
    pub job_ids: Vec<String>,
}
