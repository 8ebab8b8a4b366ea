//! The pipeline engine: out of this system's scope to compose or validate
//! (§1 Non-goals), reached only through this narrow trait. Everything
//! about how a pipeline string is interpreted is the engine's business;
//! the Worker Runner only populates placeholders and watches the event
//! stream for a terminal outcome.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::debug;
use transcoder_models::ErrorKind;

/// One event emitted while a pipeline runs: zero or more `Progress`
/// fractions followed by exactly one terminal outcome.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// 0.0-100.0.
    Progress(f64),
    Success,
    Error { kind: ErrorKind, message: String },
}

/// Drives a populated pipeline string to completion, emitting progress and
/// exactly one terminal outcome on `events`.
#[async_trait]
pub trait PipelineEngine: Send + Sync {
    async fn run(&self, pipeline: &str, events: mpsc::Sender<PipelineEvent>);
}

/// Runs the populated pipeline string as a shell command and parses a
/// `progress=<0-100>` key=value line protocol from its stdout — the same
/// convention ffmpeg's own `-progress pipe:1` flag emits, which pipeline
/// templates are expected to request via their `{{progress}}` fragment.
pub struct ShellPipelineEngine;

#[async_trait]
impl PipelineEngine for ShellPipelineEngine {
    async fn run(&self, pipeline: &str, events: mpsc::Sender<PipelineEvent>) {
        let mut child = match Command::new("sh")
            .arg("-c")
            .arg(pipeline)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let _ = events
                    .send(PipelineEvent::Error {
                        kind: ErrorKind::PipelineParse,
                        message: format!("failed to spawn pipeline: {e}"),
                    })
                    .await;
                return;
            }
        };

        let stdout = child.stdout.take().expect("child spawned with piped stdout");
        let mut stdout_lines = BufReader::new(stdout).lines();

        let stderr_handle = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut collected = String::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    collected.push_str(&line);
                    collected.push('\n');
                }
                collected
            })
        });

        while let Ok(Some(line)) = stdout_lines.next_line().await {
            if let Some(progress) = parse_progress_line(&line) {
                if events.send(PipelineEvent::Progress(progress)).await.is_err() {
                    let _ = child.kill().await;
                    return;
                }
            } else {
                debug!(%line, "pipeline stdout");
            }
        }

        let status = match child.wait().await {
            Ok(status) => status,
            Err(e) => {
                let _ = events
                    .send(PipelineEvent::Error {
                        kind: ErrorKind::Unknown,
                        message: format!("failed to wait for pipeline: {e}"),
                    })
                    .await;
                return;
            }
        };

        let stderr_output = match stderr_handle {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            let _ = events.send(PipelineEvent::Success).await;
        } else {
            let kind = classify_failure(&stderr_output);
            let message = if stderr_output.trim().is_empty() {
                format!("pipeline exited with {status}")
            } else {
                stderr_output.trim().to_string()
            };
            let _ = events.send(PipelineEvent::Error { kind, message }).await;
        }
    }
}

/// Parses a `progress=NN.NN` line.
fn parse_progress_line(line: &str) -> Option<f64> {
    line.strip_prefix("progress=")?.trim().parse::<f64>().ok()
}

/// Best-effort classification of a non-zero exit into one of the wire
/// error kinds, from stderr text. Pipeline engines are free to emit
/// anything recognizable here; `unknown` is the catch-all.
fn classify_failure(stderr: &str) -> ErrorKind {
    let lower = stderr.to_lowercase();
    if lower.contains("unrecognized option") || lower.contains("invalid argument") || lower.contains("parse") {
        ErrorKind::PipelineParse
    } else if lower.contains("no such file") || lower.contains("could not open") || lower.contains("invalid data found") {
        ErrorKind::PipelinePlay
    } else if lower.contains("error while decoding") || lower.contains("error while filtering") || lower.contains("conversion failed") {
        ErrorKind::MidTranscode
    } else {
        ErrorKind::Unknown
    }
}

/// Substitutes the three named placeholders a pipeline template carries:
/// `{{input_file}}`, `{{output_file}}`, and `{{progress}}` (an
/// engine-specific progress-instrumentation fragment; the shell engine
/// emits `progress=<pct>` lines on its own stdout, so its fragment
/// requests ffmpeg's own `-progress pipe:1`).
pub fn populate_pipeline(template: &str, input_file: &str, output_file: &str, progress_fragment: &str) -> String {
    template
        .replace("{{input_file}}", input_file)
        .replace("{{output_file}}", output_file)
        .replace("{{progress}}", progress_fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_pipeline_substitutes_all_three_placeholders() {
        let out = populate_pipeline(
            "ffmpeg -i {{input_file}} {{progress}} {{output_file}}",
            "/tmp/in.mp4",
            "/tmp/out.mp4",
            "-progress pipe:1",
        );
        assert_eq!(out, "ffmpeg -i /tmp/in.mp4 -progress pipe:1 /tmp/out.mp4");
    }

    #[test]
    fn populate_pipeline_leaves_unmatched_text_alone() {
        let out = populate_pipeline("echo hello", "in", "out", "");
        assert_eq!(out, "echo hello");
    }

    #[test]
    fn parse_progress_line_reads_percentage() {
        assert_eq!(parse_progress_line("progress=42.5000"), Some(42.5));
        assert_eq!(parse_progress_line("frame=120"), None);
    }

    #[test]
    fn classify_failure_recognizes_known_patterns() {
        assert_eq!(classify_failure("Unrecognized option 'foo'"), ErrorKind::PipelineParse);
        assert_eq!(classify_failure("No such file or directory"), ErrorKind::PipelinePlay);
        assert_eq!(classify_failure("Error while decoding stream #0:0"), ErrorKind::MidTranscode);
        assert_eq!(classify_failure("segmentation fault"), ErrorKind::Unknown);
    }
}
