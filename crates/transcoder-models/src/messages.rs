//! Wire messages exchanged over the message broker.

use serde::{Deserialize, Serialize};

use crate::error_kind::ErrorKind;

/// Published to the work queue by the Dispatcher, consumed by a Worker Runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmissionMessage {
    pub job_id: String,
    pub input_s3_path: String,
    pub output_s3_path: String,
    pub transcode_options: String,
}

/// Published to the progress exchange by a Worker Runner on each pipeline
/// progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobProgressMessage {
    /// Unix timestamp, seconds.
    pub timestamp: i64,
    /// Five-character lowercase alphanumeric worker id.
    pub worker_id: String,
    pub job_id: String,
    /// 0-100, four decimal places.
    pub progress: f64,
}

impl JobProgressMessage {
    pub fn new(job_id: impl Into<String>, worker_id: impl Into<String>, progress: f64, timestamp: i64) -> Self {
        Self {
            timestamp,
            worker_id: worker_id.into(),
            job_id: job_id.into(),
            progress: (progress.clamp(0.0, 100.0) * 10_000.0).round() / 10_000.0,
        }
    }
}

/// Terminal status of a job, as reported on the results exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Completed,
    Failed,
    Stalled,
    Cancelled,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
            ResultStatus::Failed => "failed",
            ResultStatus::Stalled => "stalled",
            ResultStatus::Cancelled => "cancelled",
        }
    }
}

/// Published to the results exchange by a Worker Runner (or synthesized by
/// the Stall Detector) on terminal outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResultMessage {
    pub job_id: String,
    pub status: ResultStatus,
    pub timestamp: Option<i64>,
    pub worker_id: Option<String>,
    pub output_s3_path: Option<String>,
    pub error: Option<String>,
    pub error_type: Option<ErrorKind>,
}

impl JobResultMessage {
    pub fn completed(job_id: impl Into<String>, worker_id: impl Into<String>, output_s3_path: impl Into<String>, timestamp: i64) -> Self {
        Self {
            job_id: job_id.into(),
            status: ResultStatus::Completed,
            timestamp: Some(timestamp),
            worker_id: Some(worker_id.into()),
            output_s3_path: Some(output_s3_path.into()),
            error: None,
            error_type: None,
        }
    }

    pub fn failed(
        job_id: impl Into<String>,
        worker_id: impl Into<String>,
        error: impl Into<String>,
        error_type: ErrorKind,
        timestamp: i64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: ResultStatus::Failed,
            timestamp: Some(timestamp),
            worker_id: Some(worker_id.into()),
            output_s3_path: None,
            error: Some(error.into()),
            error_type: Some(error_type),
        }
    }

    /// Synthesized by the Stall Detector; no worker is attributed.
    pub fn stalled(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: ResultStatus::Stalled,
            timestamp: None,
            worker_id: None,
            output_s3_path: None,
            error: None,
            error_type: None,
        }
    }

    pub fn cancelled(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: ResultStatus::Cancelled,
            timestamp: None,
            worker_id: None,
            output_s3_path: None,
            error: None,
            error_type: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_message_rounds_to_four_decimal_places() {
        let msg = JobProgressMessage::new("J1", "ab12c", 33.123456, 1_700_000_000);
        assert_eq!(msg.progress, 33.1235);
    }

    #[test]
    fn progress_message_clamps_to_0_100() {
        let msg = JobProgressMessage::new("J1", "ab12c", 150.0, 0);
        assert_eq!(msg.progress, 100.0);
        let msg = JobProgressMessage::new("J1", "ab12c", -5.0, 0);
        assert_eq!(msg.progress, 0.0);
    }

    #[test]
    fn stalled_result_has_null_output_and_error() {
        let msg = JobResultMessage::stalled("J2");
        assert_eq!(msg.status, ResultStatus::Stalled);
        assert!(msg.output_s3_path.is_none());
        assert!(msg.error.is_none());
        assert!(msg.error_type.is_none());
    }

    #[test]
    fn serializes_error_type_as_snake_case_tag() {
        let msg = JobResultMessage::failed("J3", "ab12c", "boom", ErrorKind::PipelineParse, 1);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["error_type"], "pipeline_parse");
        assert_eq!(json["status"], "failed");
    }
}
