//! Preset CRUD.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use transcoder_models::{CreatePresetRequest, Preset};

use crate::error::{StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct PresetRow {
    id: i64,
    name: String,
    input_kind: String,
    output_kind: String,
    pipeline: String,
    codec: Option<String>,
    bitrate: Option<i32>,
    resolution: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PresetRow> for Preset {
    fn from(row: PresetRow) -> Self {
        Preset {
            id: row.id,
            name: row.name,
            input_kind: row.input_kind,
            output_kind: row.output_kind,
            pipeline: row.pipeline,
            codec: row.codec,
            bitrate: row.bitrate,
            resolution: row.resolution,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const PRESET_COLUMNS: &str =
    "id, name, input_kind, output_kind, pipeline, codec, bitrate, resolution, created_at, updated_at";

#[derive(Clone)]
pub struct PresetStore {
    pool: PgPool,
}

impl PresetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: &CreatePresetRequest) -> StoreResult<Preset> {
        let row = sqlx::query_as::<_, PresetRow>(&format!(
            r#"
            INSERT INTO presets (name, input_kind, output_kind, pipeline, codec, bitrate, resolution)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRESET_COLUMNS}
            "#
        ))
        .bind(&req.name)
        .bind(&req.input_kind)
        .bind(&req.output_kind)
        .bind(&req.pipeline)
        .bind(&req.codec)
        .bind(req.bitrate)
        .bind(&req.resolution)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<Preset>> {
        let row = sqlx::query_as::<_, PresetRow>(&format!(
            "SELECT {PRESET_COLUMNS} FROM presets WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn list(&self) -> StoreResult<Vec<Preset>> {
        let rows = sqlx::query_as::<_, PresetRow>(&format!(
            "SELECT {PRESET_COLUMNS} FROM presets ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn delete(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM presets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("preset {id}")));
        }
        Ok(())
    }
}
