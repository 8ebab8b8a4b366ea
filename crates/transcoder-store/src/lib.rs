//! Postgres-backed durable store for jobs, presets, and playlists.
//!
//! `JobStore::claim`/`finalize` are the only writers of job lifecycle state;
//! both rely on an atomic `UPDATE ... WHERE` to serialize concurrent access
//! without an explicit lock.

pub mod config;
pub mod error;
pub mod job_store;
pub mod playlist_store;
pub mod pool;
pub mod preset_store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use job_store::JobStore;
pub use playlist_store::PlaylistStore;
pub use preset_store::PresetStore;
