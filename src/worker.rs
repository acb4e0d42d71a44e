use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::db::{ItemStore, ResultStore, StoreError};
use crate::ml::{ModelError, ViolationModel};
use crate::models::moderation::Prediction;
use crate::models::task::{DeadLetterEnvelope, TaskMessage};
use crate::services::bus::{BusError, Delivery, MessageBus, DLQ_TOPIC, TASK_TOPIC};
use crate::services::cache::{fingerprint, PredictionCache};
use crate::services::policy::{self, FailureKind, RouteAction};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of processing one task to a terminal decision.
#[derive(Debug)]
enum Outcome {
    /// Exactly this delivery transitioned the record to completed.
    Completed(Prediction),
    /// The record was already terminal (redelivery, or a lost race on the
    /// conditional update): nothing was written.
    Duplicate,
}

/// Failure raised while processing a single task. Never propagates across
/// task boundaries; `kind()` feeds the retry/DLQ policy.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("malformed task payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("item not found: item_id={0}")]
    ItemNotFound(i64),

    #[error("no moderation record for task_id={0}")]
    RecordMissing(i64),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProcessError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::MalformedPayload(_) | Self::ItemNotFound(_) | Self::RecordMissing(_) => {
                FailureKind::Permanent
            }
            Self::Model(_) | Self::Store(_) => FailureKind::Transient,
        }
    }
}

/// One member of the worker pool. Processes a single delivery end-to-end
/// before fetching the next; all members share the same immutable model
/// reference and the same bus/store/cache handles.
#[derive(Clone)]
pub struct Worker {
    bus: Arc<dyn MessageBus>,
    results: Arc<dyn ResultStore>,
    items: Arc<dyn ItemStore>,
    cache: Arc<dyn PredictionCache>,
    model: Arc<dyn ViolationModel>,
}

impl Worker {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        results: Arc<dyn ResultStore>,
        items: Arc<dyn ItemStore>,
        cache: Arc<dyn PredictionCache>,
        model: Arc<dyn ViolationModel>,
    ) -> Self {
        Self {
            bus,
            results,
            items,
            cache,
            model,
        }
    }

    /// Fetch-and-process loop with graceful shutdown: when the signal flips,
    /// stop fetching and let the in-flight task finish. An ungraceful kill
    /// simply leaves an unacked delivery behind, which redelivery plus the
    /// idempotent short-circuit absorb.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                tracing::info!("Worker draining complete, exiting loop");
                break;
            }

            match self.poll_once().await {
                Ok(true) => {
                    tracing::debug!("Task processed, checking for next task");
                }
                Ok(false) => {
                    tokio::select! {
                        _ = sleep(POLL_INTERVAL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Bus error while processing, backing off");
                    tokio::select! {
                        _ = sleep(POLL_INTERVAL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
    }

    /// Consume and fully handle one message from the task topic. Returns
    /// `Ok(false)` when no message is visible. A `BusError` here means the
    /// delivery could not be routed or acked; it stays in the processing
    /// list and will be redelivered.
    pub async fn poll_once(&self) -> Result<bool, BusError> {
        let Some(delivery) = self.bus.consume(TASK_TOPIC).await? else {
            return Ok(false);
        };

        let start = std::time::Instant::now();

        let task: TaskMessage = match serde_json::from_str(&delivery.payload) {
            Ok(task) => task,
            Err(e) => {
                // No task id to fail in the store; wrap a placeholder message
                // so the poison payload is still visible on the DLQ.
                tracing::error!(error = %e, payload = %delivery.payload, "Malformed task payload");
                let placeholder = TaskMessage::new(0, 0);
                let envelope = DeadLetterEnvelope::new(
                    placeholder,
                    format!("malformed task payload: {e}; raw: {}", delivery.payload),
                );
                self.publish_dead_letter(&envelope).await?;
                self.bus.ack(&delivery).await?;
                metrics::counter!("moderation_tasks_dead_lettered").increment(1);
                return Ok(true);
            }
        };

        match self.process(&task).await {
            Ok(Outcome::Completed(prediction)) => {
                self.bus.ack(&delivery).await?;
                metrics::counter!("moderation_tasks_completed").increment(1);
                metrics::histogram!("moderation_processing_seconds")
                    .record(start.elapsed().as_secs_f64());
                tracing::info!(
                    task_id = task.task_id,
                    item_id = task.item_id,
                    is_violation = prediction.is_violation,
                    probability = prediction.probability,
                    "Task completed"
                );
            }
            Ok(Outcome::Duplicate) => {
                self.bus.ack(&delivery).await?;
                metrics::counter!("moderation_tasks_duplicate").increment(1);
                tracing::info!(
                    task_id = task.task_id,
                    "Record already terminal, discarding redelivered task"
                );
            }
            Err(e) => {
                self.route_failure(&delivery, &task, &e).await?;
            }
        }

        Ok(true)
    }

    /// The per-task state machine: idempotent short-circuit, item load,
    /// cache lookup, model invocation, conditional terminal write.
    async fn process(&self, task: &TaskMessage) -> Result<Outcome, ProcessError> {
        match self.results.get(task.task_id).await? {
            None => return Err(ProcessError::RecordMissing(task.task_id)),
            Some(record) if record.status.is_terminal() => return Ok(Outcome::Duplicate),
            Some(_) => {}
        }

        let item = self
            .items
            .get(task.item_id)
            .await?
            .ok_or(ProcessError::ItemNotFound(task.item_id))?;

        let fp = fingerprint(&item);
        let prediction = match self.cache.get(&fp).await {
            Some(prediction) => {
                metrics::counter!("moderation_cache_hits").increment(1);
                tracing::debug!(task_id = task.task_id, "Prediction cache hit");
                prediction
            }
            None => {
                let prediction = self.model.predict(&item).await?;
                // Best-effort write-back; the cache logs its own failures.
                self.cache.put(&fp, &prediction).await;
                prediction
            }
        };

        let transitioned = self
            .results
            .complete(task.task_id, prediction.is_violation, prediction.probability)
            .await?;

        if transitioned {
            Ok(Outcome::Completed(prediction))
        } else {
            // Another delivery won the conditional update.
            Ok(Outcome::Duplicate)
        }
    }

    /// Convert a classified failure into a routing action: delayed requeue
    /// with the counter bumped, or dead-letter plus a failed record. The
    /// original delivery is acked only once the replacement is durable.
    async fn route_failure(
        &self,
        delivery: &Delivery,
        task: &TaskMessage,
        error: &ProcessError,
    ) -> Result<(), BusError> {
        match policy::decide(error.kind(), task.retry_count) {
            RouteAction::Retry { delay } => {
                let requeued = task.requeued();
                let payload = serde_json::to_string(&requeued)?;
                self.bus
                    .publish_delayed(TASK_TOPIC, &payload, delay)
                    .await?;
                self.bus.ack(delivery).await?;
                metrics::counter!("moderation_tasks_retried").increment(1);
                tracing::warn!(
                    task_id = task.task_id,
                    retry_count = requeued.retry_count,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "Transient failure, task requeued with delay"
                );
            }
            RouteAction::DeadLetter => {
                let reason = match error.kind() {
                    FailureKind::Transient => {
                        format!(
                            "exhausted retries after {} attempts: {error}",
                            task.retry_count + 1
                        )
                    }
                    FailureKind::Permanent => error.to_string(),
                };

                // The lookup endpoint reports failure from the store, so the
                // record is failed before the envelope goes out. A no-op here
                // means the record is already terminal.
                if let Err(e) = self.results.fail(task.task_id, &reason).await {
                    tracing::error!(
                        task_id = task.task_id,
                        error = %e,
                        "Failed to mark record as failed while dead-lettering"
                    );
                }

                let envelope = DeadLetterEnvelope::new(task.clone(), reason);
                self.publish_dead_letter(&envelope).await?;
                self.bus.ack(delivery).await?;
                metrics::counter!("moderation_tasks_dead_lettered").increment(1);
                tracing::error!(
                    task_id = task.task_id,
                    item_id = task.item_id,
                    retry_count = task.retry_count,
                    reason = %envelope.failure_reason,
                    "Task dead-lettered"
                );
            }
        }

        Ok(())
    }

    async fn publish_dead_letter(&self, envelope: &DeadLetterEnvelope) -> Result<(), BusError> {
        let payload = serde_json::to_string(envelope)?;
        self.bus.publish(DLQ_TOPIC, &payload).await
    }
}
