//! Training progress broadcaster for real-time status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Phase of a training run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    Queued,
    Extracting,
    Indexing,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingPhase::Queued => write!(f, "Queued"),
            TrainingPhase::Extracting => write!(f, "Extracting slides"),
            TrainingPhase::Indexing => write!(f, "Indexing content"),
            TrainingPhase::Completed => write!(f, "Completed"),
            TrainingPhase::Failed => write!(f, "Failed"),
            TrainingPhase::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Progress event for a training job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProgressEvent {
    pub job_id: String,
    pub phase: TrainingPhase,
    /// Percent complete, 0-100. Never moves backwards within a job.
    pub progress: u8,
    pub processed_count: u64,
    pub total_count: u64,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TrainingProgressEvent {
    pub fn new(job_id: &str, phase: TrainingPhase, message: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            phase,
            progress: 0,
            processed_count: 0,
            total_count: 0,
            message: message.to_string(),
            timestamp: Utc::now(),
            error: None,
        }
    }
}

/// Broadcasts training progress events for streaming. Sending never fails:
/// no active receivers is fine.
#[derive(Clone)]
pub struct TrainingBroadcaster {
    sender: Arc<broadcast::Sender<TrainingProgressEvent>>,
}

impl TrainingBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn send(&self, event: TrainingProgressEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrainingProgressEvent> {
        self.sender.subscribe()
    }

    /// Convenience for mid-run progress events.
    pub fn progress(
        &self,
        job_id: &str,
        phase: TrainingPhase,
        progress: u8,
        processed: u64,
        total: u64,
        message: &str,
    ) {
        let mut event = TrainingProgressEvent::new(job_id, phase, message);
        event.progress = progress;
        event.processed_count = processed;
        event.total_count = total;
        self.send(event);
    }
}

impl Default for TrainingBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_receive() {
        let broadcaster = TrainingBroadcaster::new(10);
        let mut rx = broadcaster.subscribe();

        broadcaster.progress("job-1", TrainingPhase::Indexing, 50, 1, 2, "halfway");

        let event = rx.try_recv().unwrap();
        assert_eq!(event.job_id, "job-1");
        assert_eq!(event.phase, TrainingPhase::Indexing);
        assert_eq!(event.progress, 50);
        assert_eq!(event.total_count, 2);
    }

    #[test]
    fn test_send_without_receivers_is_fine() {
        let broadcaster = TrainingBroadcaster::new(10);
        broadcaster.send(TrainingProgressEvent::new(
            "job-1",
            TrainingPhase::Queued,
            "queued",
        ));
    }
}
