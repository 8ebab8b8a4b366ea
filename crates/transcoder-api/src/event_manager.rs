//! Per-job subscriber registry and broadcast.
//!
//! Holds, for each job id with at least one live subscriber, a map of
//! subscriber id to an mpsc sender the Subscription Endpoint drains into
//! the WebSocket. The sole writers are the API-side Consumer (progress and
//! completion) and the Stall Detector (synthetic stalled completion).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use transcoder_models::{JobProgressMessage, JobResultMessage};

pub type SubscriberId = u64;

/// A fan-out event delivered to one job's subscribers.
#[derive(Debug, Clone)]
pub enum SubscriberEvent {
    Progress(JobProgressMessage),
    Result(JobResultMessage),
}

/// Registry of live subscribers, keyed by job id.
#[derive(Default)]
pub struct EventManager {
    subscribers: RwLock<HashMap<String, HashMap<SubscriberId, mpsc::Sender<SubscriberEvent>>>>,
    next_id: AtomicU64,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for `job_id`. Returns an id to pass to `remove`.
    pub async fn add(&self, job_id: &str, sender: mpsc::Sender<SubscriberEvent>) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subs = self.subscribers.write().await;
        subs.entry(job_id.to_string()).or_default().insert(id, sender);
        id
    }

    pub async fn remove(&self, job_id: &str, id: SubscriberId) {
        let mut subs = self.subscribers.write().await;
        if let Some(job_subs) = subs.get_mut(job_id) {
            job_subs.remove(&id);
            if job_subs.is_empty() {
                subs.remove(job_id);
            }
        }
    }

    /// Delivers `event` to every live subscriber of `job_id`. A dead
    /// subscriber (channel closed) is dropped from the registry; a subscriber
    /// send failure never fails the broadcast for the others. A `Result`
    /// event is terminal: every subscriber of this job is dropped from the
    /// registry afterward, since the Subscription Endpoint closes the
    /// connection once it forwards a terminal frame.
    pub async fn broadcast(&self, job_id: &str, event: SubscriberEvent) {
        let is_terminal = matches!(event, SubscriberEvent::Result(_));

        let targets: Vec<(SubscriberId, mpsc::Sender<SubscriberEvent>)> = {
            let subs = self.subscribers.read().await;
            match subs.get(job_id) {
                Some(job_subs) => job_subs.iter().map(|(id, tx)| (*id, tx.clone())).collect(),
                None => return,
            }
        };

        let mut dead = Vec::new();
        for (id, tx) in &targets {
            if tx.send(event.clone()).await.is_err() {
                dead.push(*id);
            }
        }

        if is_terminal || !dead.is_empty() {
            let mut subs = self.subscribers.write().await;
            if let Some(job_subs) = subs.get_mut(job_id) {
                if is_terminal {
                    job_subs.clear();
                } else {
                    for id in &dead {
                        job_subs.remove(id);
                    }
                }
                if job_subs.is_empty() {
                    subs.remove(job_id);
                }
            }
        }
    }

    pub async fn subscriber_count(&self, job_id: &str) -> usize {
        self.subscribers
            .read()
            .await
            .get(job_id)
            .map(HashMap::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transcoder_models::JobProgressMessage;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let manager = EventManager::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        manager.add("job-1", tx1).await;
        manager.add("job-1", tx2).await;

        manager
            .broadcast(
                "job-1",
                SubscriberEvent::Progress(JobProgressMessage::new("job-1", "ab12c", 50.0, 0)),
            )
            .await;

        assert!(matches!(rx1.try_recv(), Ok(SubscriberEvent::Progress(_))));
        assert!(matches!(rx2.try_recv(), Ok(SubscriberEvent::Progress(_))));
    }

    #[tokio::test]
    async fn terminal_broadcast_clears_subscribers() {
        let manager = EventManager::new();
        let (tx, _rx) = mpsc::channel(4);
        manager.add("job-1", tx).await;
        assert_eq!(manager.subscriber_count("job-1").await, 1);

        manager
            .broadcast("job-1", SubscriberEvent::Result(transcoder_models::JobResultMessage::cancelled("job-1")))
            .await;

        assert_eq!(manager.subscriber_count("job-1").await, 0);
    }

    #[tokio::test]
    async fn broadcast_to_unknown_job_is_a_no_op() {
        let manager = EventManager::new();
        manager
            .broadcast(
                "missing",
                SubscriberEvent::Progress(JobProgressMessage::new("missing", "ab12c", 1.0, 0)),
            )
            .await;
    }
}
