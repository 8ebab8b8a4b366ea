//! Shared data models for the transcoding orchestrator.
//!
//! This crate provides the types shared between the API, broker, store,
//! storage and worker crates: job identity and lifecycle state, the closed
//! error-kind enum, the wire message schemas exchanged over the broker, and
//! the preset/playlist entities.

pub mod error_kind;
pub mod job;
pub mod messages;
pub mod playlist;
pub mod preset;

pub use error_kind::ErrorKind;
pub use job::{ClaimOutcome, Job, JobId, JobState};
pub use messages::{JobProgressMessage, JobResultMessage, JobSubmissionMessage, ResultStatus};
pub use playlist::{CreatePlaylistRequest, Playlist, PlaylistWithJobs};
pub use preset::{CreatePresetRequest, Preset};
