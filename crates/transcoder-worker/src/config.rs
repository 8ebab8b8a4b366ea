//! Worker Runner configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Resource and timing discipline for a single worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// How many jobs this worker drives concurrently.
    pub max_concurrent_jobs: usize,
    /// No-progress watchdog: a pipeline that emits no progress event (and
    /// doesn't finish) within this window is killed and finalized as
    /// `pipeline_timeout`.
    pub pipeline_timeout: Duration,
    /// Scratch root for per-job input/output files.
    pub work_dir: PathBuf,
    /// Bound on how long graceful shutdown waits for in-flight jobs to
    /// finish before the process exits anyway.
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 1,
            pipeline_timeout: Duration::from_secs(60),
            work_dir: PathBuf::from("/tmp/transcoder-worker"),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.max_concurrent_jobs),
            pipeline_timeout: Duration::from_secs(
                std::env::var("WORKER_PIPELINE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.pipeline_timeout.as_secs()),
            ),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.work_dir),
            shutdown_timeout: Duration::from_secs(
                std::env::var("WORKER_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.shutdown_timeout.as_secs()),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        std::env::remove_var("WORKER_MAX_CONCURRENT_JOBS");
        std::env::remove_var("WORKER_PIPELINE_TIMEOUT_SECS");
        std::env::remove_var("WORKER_SHUTDOWN_TIMEOUT_SECS");
        let config = WorkerConfig::from_env();
        assert_eq!(config.max_concurrent_jobs, 1);
        assert_eq!(config.pipeline_timeout, Duration::from_secs(60));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(30));
    }

    #[test]
    fn pipeline_timeout_is_overridable() {
        std::env::set_var("WORKER_PIPELINE_TIMEOUT_SECS", "5");
        let config = WorkerConfig::from_env();
        assert_eq!(config.pipeline_timeout, Duration::from_secs(5));
        std::env::remove_var("WORKER_PIPELINE_TIMEOUT_SECS");
    }
}
