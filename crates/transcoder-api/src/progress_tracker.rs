//! Process-local mapping of job id to latest observed progress.
//!
//! The sole writer is the API-side Consumer, on each progress event off the
//! broker. Read by the Subscription Endpoint (replay last-known progress on
//! connect) and the Stall Detector (liveness). An entry is removed once a
//! result event arrives for that job.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use transcoder_models::JobProgressMessage;

#[derive(Debug, Clone)]
pub struct ProgressEntry {
    pub message: JobProgressMessage,
    pub observed_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct ProgressTracker {
    entries: RwLock<HashMap<String, ProgressEntry>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, message: JobProgressMessage) {
        let entry = ProgressEntry {
            observed_at: Utc::now(),
            message,
        };
        self.entries.write().await.insert(entry.message.job_id.clone(), entry);
    }

    pub async fn get(&self, job_id: &str) -> Option<ProgressEntry> {
        self.entries.read().await.get(job_id).cloned()
    }

    pub async fn remove(&self, job_id: &str) {
        self.entries.write().await.remove(job_id);
    }

    /// True if an entry exists for `job_id` and was observed within `window`.
    pub async fn is_live(&self, job_id: &str, window: Duration) -> bool {
        match self.get(job_id).await {
            Some(entry) => {
                let age = Utc::now().signed_duration_since(entry.observed_at);
                age <= chrono::Duration::from_std(window).unwrap_or_default()
            }
            None => false,
        }
    }

    /// All job ids with a tracked entry (used by the Stall Detector to
    /// decide liveness without issuing one lookup per stale job).
    pub async fn job_ids(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn update_then_get_round_trips() {
        let tracker = ProgressTracker::new();
        tracker
            .update(JobProgressMessage::new("job-1", "ab12c", 42.0, 0))
            .await;
        let entry = tracker.get("job-1").await.unwrap();
        assert_eq!(entry.message.progress, 42.0);
    }

    #[tokio::test]
    async fn remove_clears_entry() {
        let tracker = ProgressTracker::new();
        tracker
            .update(JobProgressMessage::new("job-1", "ab12c", 10.0, 0))
            .await;
        tracker.remove("job-1").await;
        assert!(tracker.get("job-1").await.is_none());
    }

    #[tokio::test]
    async fn is_live_false_without_entry() {
        let tracker = ProgressTracker::new();
        assert!(!tracker.is_live("job-1", Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn is_live_true_for_fresh_entry() {
        let tracker = ProgressTracker::new();
        tracker
            .update(JobProgressMessage::new("job-1", "ab12c", 10.0, 0))
            .await;
        assert!(tracker.is_live("job-1", Duration::from_secs(60)).await);
    }
}
