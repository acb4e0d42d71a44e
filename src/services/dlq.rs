use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;

use crate::models::task::DeadLetterEnvelope;
use crate::services::bus::{BusError, MessageBus, DLQ_TOPIC, TASK_TOPIC};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Stateless consumer over the dead-letter topic. Tails envelopes for
/// operator inspection; has no effect on the correctness of the main
/// pipeline.
pub struct DlqMonitor {
    bus: Arc<dyn MessageBus>,
}

impl DlqMonitor {
    pub fn new(bus: Arc<dyn MessageBus>) -> Self {
        Self { bus }
    }

    /// Pop and log the next dead-letter envelope, if any. An unparseable
    /// payload is logged and dropped rather than poisoning the monitor.
    pub async fn poll_once(&self) -> Result<Option<DeadLetterEnvelope>, BusError> {
        let Some(delivery) = self.bus.consume(DLQ_TOPIC).await? else {
            return Ok(None);
        };

        let envelope = match serde_json::from_str::<DeadLetterEnvelope>(&delivery.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, payload = %delivery.payload, "Unparseable dead-letter payload");
                self.bus.ack(&delivery).await?;
                return Ok(None);
            }
        };

        tracing::warn!(
            task_id = envelope.original_message.task_id,
            item_id = envelope.original_message.item_id,
            retry_count_at_failure = envelope.retry_count_at_failure,
            dead_lettered_at = %envelope.dead_lettered_at,
            reason = %envelope.failure_reason,
            "Dead-letter envelope"
        );

        self.bus.ack(&delivery).await?;
        Ok(Some(envelope))
    }

    /// Republish the original task with its retry budget reset. Only ever
    /// invoked on an explicit operator trigger; automatic replay would loop
    /// a permanently failing task forever.
    pub async fn replay(&self, envelope: &DeadLetterEnvelope) -> Result<(), BusError> {
        let mut task = envelope.original_message.clone();
        task.retry_count = 0;
        let payload = serde_json::to_string(&task)?;
        self.bus.publish(TASK_TOPIC, &payload).await?;
        tracing::info!(
            task_id = task.task_id,
            item_id = task.item_id,
            "Dead-letter task replayed to the task topic"
        );
        Ok(())
    }

    /// Tail loop for the standalone monitor binary.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                tracing::info!("DLQ monitor exiting");
                break;
            }

            match self.poll_once().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tokio::select! {
                        _ = sleep(POLL_INTERVAL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "DLQ monitor bus error, backing off");
                    tokio::select! {
                        _ = sleep(POLL_INTERVAL) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
    }
}
