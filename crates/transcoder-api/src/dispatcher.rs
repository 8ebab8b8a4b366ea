//! Job submission: persist, then publish.
//!
//! A job or playlist is committed to the Job Store before its submission
//! message(s) reach the work queue. If the publish fails after a
//! successful commit, the job is left `queued` and orphaned until an
//! operator resubmits it or a future re-enqueue sweep picks it up; a
//! publish that only apparently fails (broker ack lost) but actually
//! succeeds risks a duplicate claim attempt, which `claim`'s compare-and-set
//! already makes safe.

use std::sync::Arc;

use transcoder_broker::MessageBusAdapter;
use transcoder_models::{CreatePlaylistRequest, Job, JobId, JobSubmissionMessage, PlaylistWithJobs};
use transcoder_store::{JobStore, PlaylistStore, PresetStore};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Request body for `POST /jobs`.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SubmitJobRequest {
    pub job_id: String,
    pub input_s3_path: String,
    pub output_s3_path: String,
    #[serde(default)]
    pub preset_id: Option<i64>,
    #[serde(default)]
    pub pipeline: Option<String>,
}

#[derive(Clone)]
pub struct Dispatcher {
    jobs: JobStore,
    presets: PresetStore,
    playlists: PlaylistStore,
    broker: Arc<MessageBusAdapter>,
}

impl Dispatcher {
    pub fn new(
        jobs: JobStore,
        presets: PresetStore,
        playlists: PlaylistStore,
        broker: Arc<MessageBusAdapter>,
    ) -> Self {
        Self {
            jobs,
            presets,
            playlists,
            broker,
        }
    }

    /// Resolves `preset_id` or `pipeline` (exactly one must be set), creates
    /// the job row, and publishes its submission message to the work queue.
    pub async fn submit(&self, req: SubmitJobRequest) -> ApiResult<Job> {
        let pipeline = self.resolve_pipeline(req.preset_id, req.pipeline.as_deref()).await?;

        let job_id = JobId::from_string(req.job_id);
        let job = self
            .jobs
            .create_job(&job_id, &req.input_s3_path, &req.output_s3_path, &pipeline, req.preset_id)
            .await?;

        let message = JobSubmissionMessage {
            job_id: job_id.to_string(),
            input_s3_path: req.input_s3_path,
            output_s3_path: req.output_s3_path,
            transcode_options: pipeline,
        };
        self.broker.publish_work(&message).await?;
        metrics::record_job_submitted();

        Ok(job)
    }

    /// Creates the playlist and its member jobs atomically, then publishes
    /// one submission message per member job.
    pub async fn submit_playlist(&self, req: CreatePlaylistRequest) -> ApiResult<PlaylistWithJobs> {
        let mut resolved = Vec::with_capacity(req.preset_ids.len());
        for preset_id in &req.preset_ids {
            let preset = self
                .presets
                .get(*preset_id)
                .await?
                .ok_or_else(|| ApiError::not_found(format!("preset {preset_id} not found")))?;
            resolved.push((*preset_id, preset.pipeline));
        }

        let result = self.playlists.create_playlist_with_jobs(&req, &resolved).await?;

        for job_id in &result.job_ids {
            let job = self
                .jobs
                .get_job(&JobId::from_string(job_id.clone()))
                .await?
                .ok_or_else(|| ApiError::internal(format!("playlist job {job_id} missing after commit")))?;

            let message = JobSubmissionMessage {
                job_id: job.job_id.to_string(),
                input_s3_path: job.input_s3_path.clone(),
                output_s3_path: job.output_s3_path.clone(),
                transcode_options: job.pipeline.clone(),
            };
            self.broker.publish_work(&message).await?;
            metrics::record_job_submitted();
        }

        Ok(result)
    }

    async fn resolve_pipeline(&self, preset_id: Option<i64>, pipeline: Option<&str>) -> ApiResult<String> {
        match (preset_id, pipeline) {
            (Some(preset_id), None) => {
                let preset = self
                    .presets
                    .get(preset_id)
                    .await?
                    .ok_or_else(|| ApiError::not_found(format!("preset {preset_id} not found")))?;
                Ok(preset.pipeline)
            }
            (None, Some(pipeline)) => Ok(pipeline.to_string()),
            (None, None) => Err(ApiError::bad_request(
                "exactly one of preset_id or pipeline is required",
            )),
            (Some(_), Some(_)) => Err(ApiError::bad_request(
                "provide only one of preset_id or pipeline, not both",
            )),
        }
    }
}
