//! The closed set of error kinds observable on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a worker-side failure. The tag is exactly the wire
/// `error_type` string, replacing the exception-hierarchy approach of the
/// system this was distilled from with an exhaustive sum type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    S3Download,
    S3Upload,
    PipelineParse,
    PipelinePlay,
    MidTranscode,
    PipelineTimeout,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::S3Download => "s3_download",
            ErrorKind::S3Upload => "s3_upload",
            ErrorKind::PipelineParse => "pipeline_parse",
            ErrorKind::PipelinePlay => "pipeline_play",
            ErrorKind::MidTranscode => "mid_transcode",
            ErrorKind::PipelineTimeout => "pipeline_timeout",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s3_download" => Ok(ErrorKind::S3Download),
            "s3_upload" => Ok(ErrorKind::S3Upload),
            "pipeline_parse" => Ok(ErrorKind::PipelineParse),
            "pipeline_play" => Ok(ErrorKind::PipelinePlay),
            "mid_transcode" => Ok(ErrorKind::MidTranscode),
            "pipeline_timeout" => Ok(ErrorKind::PipelineTimeout),
            "unknown" => Ok(ErrorKind::Unknown),
            other => Err(format!("unknown error kind: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_str() {
        for kind in [
            ErrorKind::S3Download,
            ErrorKind::S3Upload,
            ErrorKind::PipelineParse,
            ErrorKind::PipelinePlay,
            ErrorKind::MidTranscode,
            ErrorKind::PipelineTimeout,
            ErrorKind::Unknown,
        ] {
            let parsed: ErrorKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
