//! Worker Runner: claims jobs from the message bus, drives the pipeline
//! engine, and finalizes job state.
//!
//! A job is processed exactly once and never retried on failure (§1
//! Non-goals) — a failed pipeline run finalizes the job as `failed` with a
//! classified error kind, it does not requeue.

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod pipeline;
pub mod scratch;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::WorkerRunner;
pub use logging::JobLogger;
