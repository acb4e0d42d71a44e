use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use std::time::Duration;

/// Main task topic consumed by the worker pool.
pub const TASK_TOPIC: &str = "moderation:tasks";
/// Terminal channel for tasks that exhausted retries or failed permanently.
pub const DLQ_TOPIC: &str = "moderation:dlq";

/// A consumed message plus the receipt needed to acknowledge it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub topic: String,
    pub payload: String,
}

/// Publish/consume/ack abstraction over the task bus.
///
/// Delivery is at-least-once: a message consumed but never acked (worker
/// crash, process kill) is redelivered later, so consumers must be
/// idempotent. `publish_delayed` hides the message until the delay elapses;
/// ordering across messages is not guaranteed.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError>;

    async fn publish_delayed(
        &self,
        topic: &str,
        payload: &str,
        delay: Duration,
    ) -> Result<(), BusError>;

    /// Pop the next visible message, or `None` when the topic is empty.
    async fn consume(&self, topic: &str) -> Result<Option<Delivery>, BusError>;

    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Redis-backed bus. Each topic is a list; consuming moves the payload into
/// a per-topic processing list (RPOPLPUSH) and acking removes it (LREM), so
/// an unacked payload survives a worker crash. Delayed messages sit in a
/// per-topic sorted set scored by their visible-at time and are promoted
/// into the list on consume.
pub struct RedisBus {
    client: redis::Client,
}

fn processing_key(topic: &str) -> String {
    format!("{topic}:processing")
}

fn delayed_key(topic: &str) -> String {
    format!("{topic}:delayed")
}

impl RedisBus {
    pub fn new(redis_url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url).map_err(BusError::Redis)?;
        Ok(Self { client })
    }

    /// Move due entries from the delayed set into the main list. ZREM is the
    /// ownership check: only the connection that removed the member pushes
    /// it, so concurrent consumers cannot promote the same payload twice.
    async fn promote_due(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        topic: &str,
    ) -> Result<(), BusError> {
        let now = Utc::now().timestamp_millis();
        let due: Vec<String> = conn
            .zrangebyscore(delayed_key(topic), 0, now)
            .await
            .map_err(BusError::Redis)?;

        for payload in due {
            let removed: i64 = conn
                .zrem(delayed_key(topic), &payload)
                .await
                .map_err(BusError::Redis)?;
            if removed == 1 {
                conn.lpush::<_, _, ()>(topic, &payload)
                    .await
                    .map_err(BusError::Redis)?;
            }
        }

        Ok(())
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), BusError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(BusError::Redis)?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(BusError::Redis)?;
        Ok(())
    }

    /// Current number of visible messages on a topic.
    pub async fn depth(&self, topic: &str) -> Result<u64, BusError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(BusError::Redis)?;
        let depth: u64 = conn.llen(topic).await.map_err(BusError::Redis)?;
        Ok(depth)
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(BusError::Redis)?;
        conn.lpush::<_, _, ()>(topic, payload)
            .await
            .map_err(BusError::Redis)?;
        Ok(())
    }

    async fn publish_delayed(
        &self,
        topic: &str,
        payload: &str,
        delay: Duration,
    ) -> Result<(), BusError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(BusError::Redis)?;
        let visible_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        conn.zadd::<_, _, _, ()>(delayed_key(topic), payload, visible_at)
            .await
            .map_err(BusError::Redis)?;
        Ok(())
    }

    async fn consume(&self, topic: &str) -> Result<Option<Delivery>, BusError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(BusError::Redis)?;

        self.promote_due(&mut conn, topic).await?;

        let result: Option<String> = conn
            .rpoplpush(topic, processing_key(topic))
            .await
            .map_err(BusError::Redis)?;

        Ok(result.map(|payload| Delivery {
            topic: topic.to_string(),
            payload,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(BusError::Redis)?;
        conn.lrem::<_, _, ()>(processing_key(&delivery.topic), 1, &delivery.payload)
            .await
            .map_err(BusError::Redis)?;
        Ok(())
    }
}
