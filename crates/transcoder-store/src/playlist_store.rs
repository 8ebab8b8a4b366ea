//! Playlist creation: an input fanned atomically across an ordered preset list.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use transcoder_models::{CreatePlaylistRequest, Playlist, PlaylistWithJobs};

use crate::error::{StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct PlaylistRow {
    id: i64,
    name: String,
    input_s3_path: String,
    created_at: DateTime<Utc>,
}

impl From<PlaylistRow> for Playlist {
    fn from(row: PlaylistRow) -> Self {
        Playlist {
            id: row.id,
            name: row.name,
            input_s3_path: row.input_s3_path,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PlaylistStore {
    pool: PgPool,
}

impl PlaylistStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the playlist row and one job per preset, in a single
    /// transaction. Member jobs get deterministic external ids
    /// `{playlist_name}-{index}`. Callers must publish each job's
    /// submission message only after this call returns `Ok`.
    pub async fn create_playlist_with_jobs(
        &self,
        req: &CreatePlaylistRequest,
        resolved_pipelines: &[(i64, String)],
    ) -> StoreResult<PlaylistWithJobs> {
        if req.preset_ids.len() != resolved_pipelines.len() {
            return Err(StoreError::illegal_transition(
                "preset_ids and resolved_pipelines must have equal length",
            ));
        }

        let mut tx = self.pool.begin().await?;

        let playlist_row: PlaylistRow = sqlx::query_as(
            r#"
            INSERT INTO playlists (name, input_s3_path)
            VALUES ($1, $2)
            RETURNING id, name, input_s3_path, created_at
            "#,
        )
        .bind(&req.name)
        .bind(&req.input_s3_path)
        .fetch_one(&mut *tx)
        .await?;

        let mut job_ids = Vec::with_capacity(resolved_pipelines.len());
        for (position, (preset_id, pipeline)) in resolved_pipelines.iter().enumerate() {
            let job_id = format!("{}-{position}", req.name);

            sqlx::query(
                r#"
                INSERT INTO jobs (job_id, input_s3_path, output_s3_path, pipeline, preset_id, state)
                VALUES ($1, $2, $3, $4, $5, 'queued')
                "#,
            )
            .bind(&job_id)
            .bind(&req.input_s3_path)
            .bind(format!("{}/{}", req.name, position))
            .bind(pipeline)
            .bind(preset_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO playlist_jobs (playlist_id, job_id, position) VALUES ($1, $2, $3)",
            )
            .bind(playlist_row.id)
            .bind(&job_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;

            job_ids.push(job_id);
        }

        tx.commit().await?;

        Ok(PlaylistWithJobs {
            playlist: playlist_row.into(),
            job_ids,
        })
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<PlaylistWithJobs>> {
        let playlist_row: Option<PlaylistRow> = sqlx::query_as(
            "SELECT id, name, input_s3_path, created_at FROM playlists WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(playlist_row) = playlist_row else {
            return Ok(None);
        };

        let job_ids: Vec<String> = sqlx::query_scalar(
            "SELECT job_id FROM playlist_jobs WHERE playlist_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(PlaylistWithJobs {
            playlist: playlist_row.into(),
            job_ids,
        }))
    }
}
