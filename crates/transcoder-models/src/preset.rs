//! Named, reusable pipeline templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named pipeline template. Immutable from the core's perspective; CRUD
/// is an external concern served by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub id: i64,
    pub name: String,
    pub input_kind: String,
    pub output_kind: String,
    pub pipeline: String,
    pub codec: Option<String>,
    pub bitrate: Option<i32>,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a preset.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePresetRequest {
    pub name: String,
    pub input_kind: String,
    pub output_kind: String,
    pub pipeline: String,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub bitrate: Option<i32>,
    #[serde(default)]
    pub resolution: Option<String>,
}
