//! API-side Consumer: binds the progress and results queues and feeds the
//! Progress Tracker and Event Manager.
//!
//! This consumer never writes job state — the Worker Runner already
//! persisted it before publishing. It is purely an observer on the fan-out
//! path: `on_progress` refreshes the tracker and broadcasts a progress
//! frame; `on_result` clears the tracker entry and broadcasts a terminal
//! frame. A `stalled` result published by the Stall Detector flows through
//! the same queue and is handled identically to a worker-originated result.

use std::sync::Arc;

use futures_util::StreamExt;
use lapin::options::BasicAckOptions;
use tracing::{debug, error, warn};
use transcoder_broker::MessageBusAdapter;
use transcoder_models::{JobId, JobProgressMessage, JobResultMessage, ResultStatus};
use transcoder_store::JobStore;

use crate::event_manager::{EventManager, SubscriberEvent};
use crate::metrics;
use crate::progress_tracker::ProgressTracker;

pub struct ApiConsumer {
    broker: Arc<MessageBusAdapter>,
    jobs: JobStore,
    progress: Arc<ProgressTracker>,
    events: Arc<EventManager>,
}

impl ApiConsumer {
    pub fn new(
        broker: Arc<MessageBusAdapter>,
        jobs: JobStore,
        progress: Arc<ProgressTracker>,
        events: Arc<EventManager>,
    ) -> Self {
        Self { broker, jobs, progress, events }
    }

    /// Runs both the progress and result consume loops until the process
    /// shuts down. Each loop reconnects via the adapter's own retry policy
    /// if the underlying connection drops.
    pub async fn run(self: Arc<Self>) {
        let progress_loop = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.run_progress_loop().await })
        };
        let results_loop = {
            let this = Arc::clone(&self);
            tokio::spawn(async move { this.run_results_loop().await })
        };

        let _ = tokio::join!(progress_loop, results_loop);
    }

    async fn run_progress_loop(&self) {
        loop {
            let mut consumer = match self.broker.consume_progress("api-progress-consumer").await {
                Ok(c) => c,
                Err(e) => {
                    error!("failed to open progress consumer: {e}, retrying in 5s");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else {
                    warn!("progress consumer delivery error");
                    continue;
                };
                match serde_json::from_slice::<JobProgressMessage>(&delivery.data) {
                    Ok(message) => self.on_progress(message).await,
                    Err(e) => warn!("failed to decode progress message: {e}"),
                }
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    warn!("failed to ack progress message: {e}");
                }
            }

            warn!("progress consumer stream ended, reconnecting");
        }
    }

    async fn run_results_loop(&self) {
        loop {
            let mut consumer = match self.broker.consume_results("api-results-consumer").await {
                Ok(c) => c,
                Err(e) => {
                    error!("failed to open results consumer: {e}, retrying in 5s");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else {
                    warn!("results consumer delivery error");
                    continue;
                };
                match serde_json::from_slice::<JobResultMessage>(&delivery.data) {
                    Ok(message) => self.on_result(message).await,
                    Err(e) => warn!("failed to decode result message: {e}"),
                }
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    warn!("failed to ack result message: {e}");
                }
            }

            warn!("results consumer stream ended, reconnecting");
        }
    }

    async fn on_progress(&self, message: JobProgressMessage) {
        match self.jobs.get_job(&JobId::from_string(message.job_id.clone())).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(job_id = %message.job_id, "progress observed for unknown job, dropping");
                return;
            }
            Err(e) => {
                warn!(job_id = %message.job_id, "failed to verify job existence: {e}");
                return;
            }
        }

        debug!(job_id = %message.job_id, progress = message.progress, "progress observed");
        self.events
            .broadcast(&message.job_id.clone(), SubscriberEvent::Progress(message.clone()))
            .await;
        self.progress.update(message).await;
    }

    async fn on_result(&self, message: JobResultMessage) {
        debug!(job_id = %message.job_id, status = ?message.status, "result observed");

        match self.jobs.get_job(&JobId::from_string(message.job_id.clone())).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                warn!(job_id = %message.job_id, "result observed for unknown job, broadcasting anyway");
            }
            Err(e) => {
                warn!(job_id = %message.job_id, "failed to verify job existence: {e}");
            }
        }

        self.progress.remove(&message.job_id).await;

        let should_broadcast = match message.status {
            ResultStatus::Completed => {
                metrics::record_job_completed();
                true
            }
            ResultStatus::Failed => {
                metrics::record_job_failed(message.error_type.map(|k| k.as_str()));
                true
            }
            ResultStatus::Stalled => {
                metrics::record_job_stalled();
                true
            }
            ResultStatus::Cancelled => false,
        };

        if should_broadcast {
            self.events
                .broadcast(&message.job_id.clone(), SubscriberEvent::Result(message))
                .await;
        }
    }
}
