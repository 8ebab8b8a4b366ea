//! Periodic sweep reconciling the store against observed liveness.
//!
//! Every sixty seconds: list jobs claimed `in-progress` whose
//! `updated_at` is stale, and for each compute liveness from the Progress
//! Tracker (an entry observed within the last minute). A job with no live
//! entry is transitioned to `stalled` and a synthetic `JobResultMessage`
//! is both published to the results exchange (so the API-side Consumer and
//! any other results subscriber sees a uniform event) and broadcast
//! directly to local subscribers, since waiting a round trip through the
//! broker before closing a subscriber's own connection would be pointless.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use transcoder_broker::MessageBusAdapter;
use transcoder_models::{JobResultMessage, JobState};
use transcoder_store::JobStore;

use crate::event_manager::{EventManager, SubscriberEvent};
use crate::metrics;
use crate::progress_tracker::ProgressTracker;

/// A job is considered stale once its `in-progress` row hasn't moved in
/// this long, and not live unless the Progress Tracker saw it within the
/// same window.
const LIVENESS_WINDOW: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct StallDetector {
    jobs: JobStore,
    progress: Arc<ProgressTracker>,
    events: Arc<EventManager>,
    broker: Arc<MessageBusAdapter>,
}

impl StallDetector {
    pub fn new(
        jobs: JobStore,
        progress: Arc<ProgressTracker>,
        events: Arc<EventManager>,
        broker: Arc<MessageBusAdapter>,
    ) -> Self {
        Self { jobs, progress, events, broker }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = self.sweep().await {
                error!("stall detector sweep failed: {e}");
            }
        }
    }

    async fn sweep(&self) -> Result<(), transcoder_store::StoreError> {
        let threshold = Utc::now() - chrono::Duration::from_std(LIVENESS_WINDOW).unwrap_or_default();
        let stale = self.jobs.list_stale_in_progress(threshold).await?;

        if stale.is_empty() {
            return Ok(());
        }

        info!("stall detector found {} candidate job(s)", stale.len());

        for job in stale {
            let job_id = job.job_id.to_string();
            let live = self.progress.is_live(&job_id, LIVENESS_WINDOW).await;
            if live {
                continue;
            }

            match self.jobs.finalize(&job.job_id, JobState::Stalled, None, None).await {
                Ok(()) => {
                    warn!(job_id = %job_id, "job stalled, no liveness within window");
                    self.progress.remove(&job_id).await;

                    let result = JobResultMessage::stalled(job_id.clone());
                    if let Err(e) = self.broker.publish_result(&result).await {
                        warn!(job_id = %job_id, "failed to publish synthetic stalled result: {e}");
                    }
                    self.events.broadcast(&job_id, SubscriberEvent::Result(result)).await;
                    metrics::record_job_stalled();
                }
                Err(transcoder_store::StoreError::IllegalTransition(_)) => {
                    // Already finalized by a racing worker result in the window
                    // between the list and this finalize; nothing to do.
                }
                Err(e) => {
                    error!(job_id = %job_id, "failed to finalize stalled job: {e}");
                }
            }
        }

        Ok(())
    }
}
