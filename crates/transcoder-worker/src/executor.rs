//! Worker Runner: claims a job, downloads its input, hands the populated
//! pipeline to the pipeline engine, streams progress, and finalizes state.
//!
//! Consumption is prefetch = 1 (the broker's `consume_work` already sets
//! this). A claim is the sole gate on doing any work: `not_found`,
//! `cancelled`, `in-progress` (already claimed elsewhere), and terminal
//! states are acked and skipped without side effects; only `queued`
//! proceeds. There is no retry of a failed job (§1 Non-goals) — a failure
//! anywhere past the claim finalizes the job as `failed` exactly once.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use lapin::options::BasicAckOptions;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{error, info, warn};

use transcoder_broker::MessageBusAdapter;
use transcoder_models::{
    ClaimOutcome, ErrorKind, JobId, JobProgressMessage, JobResultMessage, JobState, JobSubmissionMessage,
};
use transcoder_storage::BlobStoreClient;
use transcoder_store::JobStore;

use crate::config::WorkerConfig;
use crate::logging::JobLogger;
use crate::pipeline::{populate_pipeline, PipelineEngine, PipelineEvent};
use crate::scratch::ScratchDir;

/// Fragment substituted for `{{progress}}` when driving the default shell
/// pipeline engine: ffmpeg's own progress-reporting flags.
const DEFAULT_PROGRESS_FRAGMENT: &str = "-progress pipe:1 -nostats";

pub struct WorkerRunner<E: PipelineEngine> {
    config: WorkerConfig,
    broker: Arc<MessageBusAdapter>,
    jobs: JobStore,
    blob: Arc<BlobStoreClient>,
    engine: Arc<E>,
    worker_id: String,
    job_permits: Arc<Semaphore>,
}

impl<E: PipelineEngine + 'static> WorkerRunner<E> {
    pub fn new(
        config: WorkerConfig,
        broker: Arc<MessageBusAdapter>,
        jobs: JobStore,
        blob: Arc<BlobStoreClient>,
        engine: E,
        worker_id: String,
    ) -> Self {
        let job_permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        Self {
            config,
            broker,
            jobs,
            blob,
            engine: Arc::new(engine),
            worker_id,
            job_permits,
        }
    }

    /// Consumes the work queue until `shutdown` is set, then stops
    /// accepting new deliveries and drains in-flight jobs, bounded by
    /// `shutdown_timeout`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        'reconnect: loop {
            if *shutdown.borrow() {
                break;
            }

            let consumer_tag = format!("worker-{}", self.worker_id);
            let mut consumer = match self.broker.consume_work(&consumer_tag).await {
                Ok(c) => c,
                Err(e) => {
                    error!("failed to open work consumer: {e}, retrying in 5s");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("shutdown requested, no longer accepting new work");
                            break 'reconnect;
                        }
                    }
                    delivery = consumer.next() => {
                        let Some(delivery) = delivery else {
                            warn!("work consumer stream ended, reconnecting");
                            break;
                        };
                        let delivery = match delivery {
                            Ok(delivery) => delivery,
                            Err(e) => {
                                warn!("work consumer delivery error: {e}");
                                continue;
                            }
                        };

                        let permit = match Arc::clone(&self.job_permits).acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => break 'reconnect,
                        };

                        let message: JobSubmissionMessage = match serde_json::from_slice(&delivery.data) {
                            Ok(m) => m,
                            Err(e) => {
                                warn!("failed to decode work message: {e}, acking and dropping");
                                let _ = delivery.ack(BasicAckOptions::default()).await;
                                drop(permit);
                                continue;
                            }
                        };

                        let this = Arc::clone(&self);
                        tokio::spawn(async move {
                            let _permit = permit;
                            this.process(message).await;
                            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                                warn!("failed to ack work message: {e}");
                            }
                        });
                    }
                }
            }
        }

        self.drain(self.config.shutdown_timeout).await;
    }

    /// Waits for every in-flight permit to return, bounded by `timeout`.
    async fn drain(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.job_permits.available_permits() < self.config.max_concurrent_jobs {
            if tokio::time::Instant::now() >= deadline {
                warn!("shutdown timeout reached with jobs still in flight");
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        info!("all in-flight jobs drained");
    }

    /// Claim-guard, download, populate, run, finalize. The caller acks
    /// unconditionally once this returns: every exit path here has either
    /// finalized the job or established that it required no action.
    async fn process(&self, message: JobSubmissionMessage) {
        let job_id = JobId::from_string(message.job_id.clone());

        let claim = match self.jobs.claim(&job_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %job_id, "claim failed: {e}");
                return;
            }
        };

        match claim {
            ClaimOutcome::Claimed => {}
            ClaimOutcome::NotFound => {
                warn!(job_id = %job_id, "work message observed for unknown job, skipping");
                return;
            }
            ClaimOutcome::Cancelled => {
                info!(job_id = %job_id, "job was cancelled before claim, skipping");
                return;
            }
            ClaimOutcome::AlreadyInProgress | ClaimOutcome::AlreadyTerminal => {
                info!(job_id = %job_id, ?claim, "claim skipped, job not in queued state");
                return;
            }
        }

        let logger = JobLogger::new(&job_id, "transcode");
        logger.log_start("claimed");

        let scratch = match ScratchDir::new(&self.config.work_dir, job_id.as_str()) {
            Ok(scratch) => scratch,
            Err(e) => {
                logger.log_error(&format!("failed to create scratch dir: {e}"));
                self.finalize_failed(&job_id, ErrorKind::Unknown, e.to_string()).await;
                return;
            }
        };

        let input_path = scratch.input_path();
        if let Err(e) = self.blob.download(&message.input_s3_path, &input_path).await {
            logger.log_error(&format!("input download failed: {e}"));
            self.finalize_failed(&job_id, ErrorKind::S3Download, e.to_string()).await;
            return;
        }

        let output_path = scratch.output_path();
        let pipeline = populate_pipeline(
            &message.transcode_options,
            &input_path.to_string_lossy(),
            &output_path.to_string_lossy(),
            DEFAULT_PROGRESS_FRAGMENT,
        );

        match self.drive_pipeline(&job_id, &logger, &pipeline).await {
            Ok(()) => {
                if let Err(e) = self
                    .blob
                    .upload(&output_path, &message.output_s3_path, "application/octet-stream")
                    .await
                {
                    logger.log_error(&format!("output upload failed: {e}"));
                    self.finalize_failed(&job_id, ErrorKind::S3Upload, e.to_string()).await;
                    return;
                }
                logger.log_completion("uploaded output");
                self.finalize_completed(&job_id, &message.output_s3_path).await;
            }
            Err((kind, message_text)) => {
                logger.log_error(&message_text);
                self.finalize_failed(&job_id, kind, message_text).await;
            }
        }
    }

    /// Runs the pipeline engine, racing each event against the
    /// no-progress watchdog. Publishes a `JobProgressMessage` on each
    /// progress event.
    async fn drive_pipeline(
        &self,
        job_id: &JobId,
        logger: &JobLogger,
        pipeline: &str,
    ) -> Result<(), (ErrorKind, String)> {
        let (tx, mut rx) = mpsc::channel(32);
        let engine = Arc::clone(&self.engine);
        let pipeline_owned = pipeline.to_string();
        let handle = tokio::spawn(async move {
            engine.run(&pipeline_owned, tx).await;
        });

        loop {
            match tokio::time::timeout(self.config.pipeline_timeout, rx.recv()).await {
                Ok(Some(PipelineEvent::Progress(fraction))) => {
                    logger.log_progress(&format!("{fraction:.2}%"));
                    let msg = JobProgressMessage::new(job_id.to_string(), self.worker_id.clone(), fraction, now_unix());
                    if let Err(e) = self.broker.publish_progress(&msg).await {
                        warn!(job_id = %job_id, "failed to publish progress: {e}");
                    }
                }
                Ok(Some(PipelineEvent::Success)) => {
                    handle.abort();
                    return Ok(());
                }
                Ok(Some(PipelineEvent::Error { kind, message })) => {
                    handle.abort();
                    return Err((kind, message));
                }
                Ok(None) => {
                    handle.abort();
                    return Err((
                        ErrorKind::Unknown,
                        "pipeline engine exited without a terminal event".to_string(),
                    ));
                }
                Err(_) => {
                    handle.abort();
                    return Err((
                        ErrorKind::PipelineTimeout,
                        format!("no progress within {:?}", self.config.pipeline_timeout),
                    ));
                }
            }
        }
    }

    async fn finalize_completed(&self, job_id: &JobId, output_path: &str) {
        if let Err(e) = self.jobs.finalize(job_id, JobState::Completed, None, None).await {
            error!(job_id = %job_id, "failed to finalize completed job: {e}");
            return;
        }
        let result = JobResultMessage::completed(job_id.to_string(), self.worker_id.clone(), output_path, now_unix());
        if let Err(e) = self.broker.publish_result(&result).await {
            warn!(job_id = %job_id, "failed to publish completed result: {e}");
        }
    }

    async fn finalize_failed(&self, job_id: &JobId, kind: ErrorKind, message: String) {
        if let Err(e) = self
            .jobs
            .finalize(job_id, JobState::Failed, Some(&message), Some(kind))
            .await
        {
            error!(job_id = %job_id, "failed to finalize failed job: {e}");
            return;
        }
        let result = JobResultMessage::failed(job_id.to_string(), self.worker_id.clone(), message, kind, now_unix());
        if let Err(e) = self.broker.publish_result(&result).await {
            warn!(job_id = %job_id, "failed to publish failed result: {e}");
        }
    }
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
