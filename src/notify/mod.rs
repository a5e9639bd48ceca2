//! Best-effort notification delivery for run summaries.
//!
//! Delivery is fire-and-forget: a failure is logged by the caller and never
//! affects the run outcome. When no destination is configured the sink is
//! simply not constructed and the notify phase is skipped.

mod sns;

use std::sync::Mutex;

use async_trait::async_trait;
pub use sns::SnsNotifier;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Publish failed: {0}")]
    Publish(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Best-effort delivery channel for run summaries.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a message with the given subject.
    async fn publish(&self, subject: &str, message: &str) -> NotifyResult<()>;
}

/// In-memory sink that records published messages (for testing only).
#[derive(Default)]
pub struct MemoryNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published so far, as (subject, body) pairs.
    pub fn published(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotifier {
    async fn publish(&self, subject: &str, message: &str) -> NotifyResult<()> {
        self.messages
            .lock()
            .unwrap()
            .push((subject.to_string(), message.to_string()));
        Ok(())
    }
}
