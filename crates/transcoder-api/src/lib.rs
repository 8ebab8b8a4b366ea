//! Axum HTTP/WebSocket API server for the transcoding orchestrator.
//!
//! Hosts the HTTP Surface (job/preset/playlist CRUD, upload/download,
//! health/ready/metrics), the Subscription Endpoint, and the two
//! background loops — the API-side Consumer and the Stall Detector — that
//! keep the Progress Tracker and Event Manager current.

pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod error;
pub mod event_manager;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod progress_tracker;
pub mod routes;
pub mod stall_detector;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use consumer::ApiConsumer;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use stall_detector::StallDetector;
pub use state::AppState;
