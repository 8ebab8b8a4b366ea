//! Request handlers.

pub mod health;
pub mod jobs;
pub mod playlists;
pub mod presets;
pub mod upload;
