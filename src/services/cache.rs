use async_trait::async_trait;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;

use crate::models::item::Item;
use crate::models::moderation::Prediction;

const KEY_PREFIX: &str = "prediction:item";
// 15 minutes: enough to absorb bursts of repeated requests for the same ad
// while keeping the window for stale results on edited ads bounded.
const TTL_SECONDS: u64 = 15 * 60;

/// Deterministic fingerprint of the content fields the model scores. Two
/// items with identical content hash to the same key regardless of item id,
/// so recomputation is shared across resubmissions.
pub fn fingerprint(item: &Item) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item.name.as_bytes());
    hasher.update([0x1f]);
    hasher.update(item.description.as_bytes());
    hasher.update([0x1f]);
    hasher.update(item.category.to_le_bytes());
    hasher.update(item.images_qty.to_le_bytes());
    hasher.update([u8::from(item.seller_is_verified)]);

    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Read-through cache mapping a content fingerprint to a prior prediction.
///
/// Strictly an optimization: both operations are best-effort and infallible
/// at the call site. A miss, an eviction, or a backend outage costs one model
/// invocation, never correctness.
#[async_trait]
pub trait PredictionCache: Send + Sync {
    async fn get(&self, fingerprint: &str) -> Option<Prediction>;
    async fn put(&self, fingerprint: &str, prediction: &Prediction);
}

/// Redis-backed prediction cache with a TTL per entry.
pub struct RedisPredictionCache {
    client: redis::Client,
}

impl RedisPredictionCache {
    pub fn new(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    fn key(fingerprint: &str) -> String {
        format!("{KEY_PREFIX}:{fingerprint}")
    }
}

#[async_trait]
impl PredictionCache for RedisPredictionCache {
    async fn get(&self, fingerprint: &str) -> Option<Prediction> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Prediction cache unreachable, treating as miss");
                return None;
            }
        };

        let raw: Option<String> = match conn.get(Self::key(fingerprint)).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Prediction cache read failed, treating as miss");
                return None;
            }
        };

        raw.and_then(|payload| match serde_json::from_str(&payload) {
            Ok(prediction) => Some(prediction),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unparseable cache entry");
                None
            }
        })
    }

    async fn put(&self, fingerprint: &str, prediction: &Prediction) {
        let payload = match serde_json::to_string(prediction) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize prediction for cache");
                return;
            }
        };

        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "Prediction cache unreachable, skipping write");
                return;
            }
        };

        if let Err(e) = conn
            .set_ex::<_, _, ()>(Self::key(fingerprint), payload, TTL_SECONDS)
            .await
        {
            tracing::warn!(error = %e, "Prediction cache write failed");
        }
    }
}
