use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of moderation work, published by intake and consumed by the
/// worker pool. Immutable once published except for `retry_count`, which is
/// bumped by exactly one on each requeue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMessage {
    pub task_id: i64,
    pub item_id: i64,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl TaskMessage {
    pub fn new(task_id: i64, item_id: i64) -> Self {
        Self {
            task_id,
            item_id,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }

    /// Copy of this message for the delayed-retry channel.
    pub fn requeued(&self) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            ..self.clone()
        }
    }
}

/// Terminal wrapper published to the dead-letter topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEnvelope {
    pub original_message: TaskMessage,
    pub failure_reason: String,
    pub retry_count_at_failure: u32,
    pub dead_lettered_at: DateTime<Utc>,
}

impl DeadLetterEnvelope {
    pub fn new(original_message: TaskMessage, failure_reason: impl Into<String>) -> Self {
        let retry_count_at_failure = original_message.retry_count;
        Self {
            original_message,
            failure_reason: failure_reason.into(),
            retry_count_at_failure,
            dead_lettered_at: Utc::now(),
        }
    }
}
