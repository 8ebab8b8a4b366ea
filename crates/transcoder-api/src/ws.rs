//! Subscription Endpoint: per-job progress/result fan-out over WebSocket.
//!
//! `GET /progress/:job_id` accepts the subscriber, replays whatever state
//! already exists (terminal result or last-known progress), then registers
//! with the Event Manager and idles until disconnect. Inbound frames after
//! registration are discarded — the protocol is unidirectional from core to
//! client once subscribed.

use std::sync::atomic::{AtomicI64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;
use transcoder_models::{Job, JobId, JobResultMessage, JobState, ResultStatus};

use crate::event_manager::SubscriberEvent;
use crate::metrics;
use crate::state::AppState;

static ACTIVE_SUBSCRIPTIONS: AtomicI64 = AtomicI64::new(0);

const SUBSCRIBER_BUFFER_SIZE: usize = 32;

pub async fn subscribe(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    metrics::record_ws_connection("progress");
    ws.on_upgrade(move |socket| async move {
        let count = ACTIVE_SUBSCRIPTIONS.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_ws_active_connections(count);

        handle_subscription(socket, job_id, state).await;

        let count = ACTIVE_SUBSCRIPTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

async fn handle_subscription(socket: WebSocket, job_id: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let job = match state.jobs.get_job(&JobId::from_string(job_id.clone())).await {
        Ok(job) => job,
        Err(e) => {
            debug!(job_id = %job_id, "failed to look up job for subscription: {e}");
            None
        }
    };

    match job {
        None => {
            let _ = send_json(&mut sender, &serde_json::json!({"error": "job not yet submitted"})).await;
        }
        Some(job) if job.is_terminal() => {
            let _ = send_json(&mut sender, &synthesize_result(&job)).await;
            let _ = sender.close().await;
            return;
        }
        Some(_) => {}
    }

    if let Some(entry) = state.progress.get(&job_id).await {
        metrics::record_ws_message_sent("progress", "progress");
        let _ = send_json(&mut sender, &entry.message).await;
    }

    let (tx, mut rx) = mpsc::channel::<SubscriberEvent>(SUBSCRIBER_BUFFER_SIZE);
    let subscriber_id = state.events.add(&job_id, tx).await;

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Some(SubscriberEvent::Progress(message)) => {
                        metrics::record_ws_message_sent("progress", "progress");
                        if send_json(&mut sender, &message).await.is_err() {
                            break;
                        }
                    }
                    Some(SubscriberEvent::Result(message)) => {
                        metrics::record_ws_message_sent("progress", "result");
                        let _ = send_json(&mut sender, &message).await;
                        let _ = sender.close().await;
                        break;
                    }
                    None => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        metrics::record_ws_message_received("progress");
                        continue;
                    }
                    Some(Err(_)) => break,
                }
            }
        }
    }

    state.events.remove(&job_id, subscriber_id).await;
}

async fn send_json(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    value: &impl Serialize,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    sender.send(Message::Text(text)).await
}

/// Builds the terminal frame for a job that was already terminal when the
/// subscriber connected — no worker id is known at this remove, only what
/// the store retained.
fn synthesize_result(job: &Job) -> JobResultMessage {
    let status = match job.state {
        JobState::Completed => ResultStatus::Completed,
        JobState::Failed => ResultStatus::Failed,
        JobState::Cancelled => ResultStatus::Cancelled,
        JobState::Stalled => ResultStatus::Stalled,
        JobState::Queued | JobState::InProgress => unreachable!("caller only invokes for terminal jobs"),
    };

    JobResultMessage {
        job_id: job.job_id.to_string(),
        status,
        timestamp: job.transcode_completed_at.map(|t| t.timestamp()),
        worker_id: None,
        output_s3_path: (status == ResultStatus::Completed).then(|| job.output_s3_path.clone()),
        error: job.error.clone(),
        error_type: job.error_type,
    }
}
