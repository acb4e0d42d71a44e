use std::sync::Arc;

use crate::db::{ItemStore, ResultStore, StoreError};
use crate::models::moderation::ModerationResult;
use crate::models::task::TaskMessage;
use crate::services::bus::{BusError, MessageBus, TASK_TOPIC};

/// Intake and lookup boundary for asynchronous moderation.
pub struct ModerationService {
    results: Arc<dyn ResultStore>,
    items: Arc<dyn ItemStore>,
    bus: Arc<dyn MessageBus>,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("item not found: item_id={0}")]
    ItemNotFound(i64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to publish task: {0}")]
    Publish(#[from] BusError),
}

impl ModerationService {
    pub fn new(
        results: Arc<dyn ResultStore>,
        items: Arc<dyn ItemStore>,
        bus: Arc<dyn MessageBus>,
    ) -> Self {
        Self {
            results,
            items,
            bus,
        }
    }

    /// Accept an ad for moderation: verify it exists, create the pending
    /// record, then publish the task. The record is written strictly before
    /// the publish so a consumer can never observe a task with no backing
    /// row; a failed publish fails the record instead of leaving it pending
    /// forever.
    pub async fn submit(&self, item_id: i64) -> Result<i64, SubmitError> {
        if self.items.get(item_id).await?.is_none() {
            return Err(SubmitError::ItemNotFound(item_id));
        }

        let task_id = self.results.create_pending(item_id).await?;
        let task = TaskMessage::new(task_id, item_id);
        let payload = serde_json::to_string(&task).map_err(BusError::from)?;

        if let Err(e) = self.bus.publish(TASK_TOPIC, &payload).await {
            tracing::error!(task_id, item_id, error = %e, "Failed to publish moderation task");
            if let Err(fail_err) = self
                .results
                .fail(task_id, &format!("failed to publish task: {e}"))
                .await
            {
                tracing::error!(task_id, error = %fail_err, "Failed to mark unpublished task as failed");
            }
            return Err(e.into());
        }

        metrics::counter!("moderation_tasks_submitted").increment(1);
        tracing::info!(task_id, item_id, "Moderation task published");
        Ok(task_id)
    }

    /// Plain state read of the result record; no side effects.
    pub async fn lookup(&self, task_id: i64) -> Result<Option<ModerationResult>, StoreError> {
        self.results.get(task_id).await
    }
}
