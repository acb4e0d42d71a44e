//! In-memory fakes for the pipeline's trait seams, used by the async
//! pipeline tests. Each fake honors the same contract as its production
//! counterpart (conditional terminal updates, FIFO topics, best-effort
//! cache) and exposes inspection hooks for assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use ad_moderation::db::{ItemStore, ResultStore, StoreError};
use ad_moderation::ml::{ModelError, ViolationModel};
use ad_moderation::models::item::Item;
use ad_moderation::models::moderation::{ModerationResult, ModerationStatus, Prediction};
use ad_moderation::services::bus::{BusError, Delivery, MessageBus};
use ad_moderation::services::cache::PredictionCache;

pub fn test_item(id: i64, seller_is_verified: bool, images_qty: i32) -> Item {
    Item {
        id,
        seller_id: id * 10,
        name: format!("Test ad {id}"),
        description: "A perfectly ordinary second-hand thing".to_string(),
        category: 5,
        images_qty,
        is_closed: false,
        seller_is_verified,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[derive(Debug, Clone)]
pub struct DelayedMessage {
    pub topic: String,
    pub payload: String,
    pub delay: Duration,
}

/// FIFO topic map with a held-back delayed channel. Delayed messages become
/// visible only when a test calls `promote_delayed`, which lets tests step
/// the retry schedule deterministically.
#[derive(Default)]
pub struct InMemoryBus {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    processing: Mutex<Vec<Delivery>>,
    delayed: Mutex<Vec<DelayedMessage>>,
    fail_publish: AtomicBool,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail, simulating a bus outage.
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    /// Visible messages on a topic, oldest first.
    pub fn visible(&self, topic: &str) -> Vec<String> {
        self.queues
            .lock()
            .unwrap()
            .get(topic)
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn delayed_messages(&self) -> Vec<DelayedMessage> {
        self.delayed.lock().unwrap().clone()
    }

    /// Move every delayed message into its topic, returning the delays they
    /// were scheduled with (in publish order).
    pub fn promote_delayed(&self) -> Vec<Duration> {
        let mut delayed = self.delayed.lock().unwrap();
        let mut queues = self.queues.lock().unwrap();
        let mut delays = Vec::with_capacity(delayed.len());
        for message in delayed.drain(..) {
            delays.push(message.delay);
            queues
                .entry(message.topic)
                .or_default()
                .push_back(message.payload);
        }
        delays
    }

    pub fn unacked_count(&self) -> usize {
        self.processing.lock().unwrap().len()
    }

    fn outage_error() -> BusError {
        BusError::Redis(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "publish disabled by test",
        )))
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Self::outage_error());
        }
        self.queues
            .lock()
            .unwrap()
            .entry(topic.to_string())
            .or_default()
            .push_back(payload.to_string());
        Ok(())
    }

    async fn publish_delayed(
        &self,
        topic: &str,
        payload: &str,
        delay: Duration,
    ) -> Result<(), BusError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(Self::outage_error());
        }
        self.delayed.lock().unwrap().push(DelayedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
            delay,
        });
        Ok(())
    }

    async fn consume(&self, topic: &str) -> Result<Option<Delivery>, BusError> {
        let popped = self
            .queues
            .lock()
            .unwrap()
            .get_mut(topic)
            .and_then(VecDeque::pop_front);

        Ok(popped.map(|payload| {
            let delivery = Delivery {
                topic: topic.to_string(),
                payload,
            };
            self.processing.lock().unwrap().push(delivery.clone());
            delivery
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), BusError> {
        let mut processing = self.processing.lock().unwrap();
        if let Some(pos) = processing
            .iter()
            .position(|d| d.topic == delivery.topic && d.payload == delivery.payload)
        {
            processing.remove(pos);
        }
        Ok(())
    }
}

/// Result store over a map, with the same conditional-transition semantics
/// as the Postgres implementation.
pub struct InMemoryResultStore {
    records: Mutex<HashMap<i64, ModerationResult>>,
    next_id: AtomicI64,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Seed a pending record under an explicit task id.
    pub fn insert_pending(&self, task_id: i64, item_id: i64) {
        let mut records = self.records.lock().unwrap();
        records.insert(
            task_id,
            ModerationResult {
                id: task_id,
                item_id,
                status: ModerationStatus::Pending,
                is_violation: None,
                probability: None,
                error_message: None,
                created_at: Utc::now(),
                processed_at: None,
            },
        );
        self.next_id.fetch_max(task_id + 1, Ordering::SeqCst);
    }

    pub fn record(&self, task_id: i64) -> Option<ModerationResult> {
        self.records.lock().unwrap().get(&task_id).cloned()
    }

    pub fn terminal_write_count(&self) -> usize {
        self.records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status.is_terminal())
            .count()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn create_pending(&self, item_id: i64) -> Result<i64, StoreError> {
        let task_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.insert_pending(task_id, item_id);
        Ok(task_id)
    }

    async fn get(&self, task_id: i64) -> Result<Option<ModerationResult>, StoreError> {
        Ok(self.record(task_id))
    }

    async fn complete(
        &self,
        task_id: i64,
        is_violation: bool,
        probability: f64,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&task_id) {
            Some(record) if record.status == ModerationStatus::Pending => {
                record.status = ModerationStatus::Completed;
                record.is_violation = Some(is_violation);
                record.probability = Some(probability);
                record.processed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail(&self, task_id: i64, error_message: &str) -> Result<bool, StoreError> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&task_id) {
            Some(record) if record.status == ModerationStatus::Pending => {
                record.status = ModerationStatus::Failed;
                record.error_message = Some(error_message.to_string());
                record.processed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct InMemoryItemStore {
    items: Mutex<HashMap<i64, Item>>,
}

impl InMemoryItemStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        let store = Self::new();
        for item in items {
            store.insert(item);
        }
        store
    }

    pub fn insert(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id, item);
    }
}

#[async_trait]
impl ItemStore for InMemoryItemStore {
    async fn get(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        Ok(self.items.lock().unwrap().get(&item_id).cloned())
    }
}

/// Cache fake that records hit/write counts.
#[derive(Default)]
pub struct RecordingCache {
    entries: Mutex<HashMap<String, Prediction>>,
    hits: AtomicUsize,
    writes: AtomicUsize,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, fingerprint: &str, prediction: Prediction) {
        self.entries
            .lock()
            .unwrap()
            .insert(fingerprint.to_string(), prediction);
    }

    pub fn entry(&self, fingerprint: &str) -> Option<Prediction> {
        self.entries.lock().unwrap().get(fingerprint).copied()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PredictionCache for RecordingCache {
    async fn get(&self, fingerprint: &str) -> Option<Prediction> {
        let found = self.entries.lock().unwrap().get(fingerprint).copied();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        found
    }

    async fn put(&self, fingerprint: &str, prediction: &Prediction) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(fingerprint.to_string(), *prediction);
    }
}

/// Scripted model: consumes a queue of step outcomes, then falls back to a
/// fixed prediction. Counts invocations so tests can assert that cache hits
/// and duplicate discards never touch the model.
pub struct ScriptedModel {
    steps: Mutex<VecDeque<ScriptStep>>,
    fallback: Prediction,
    calls: AtomicUsize,
}

#[derive(Debug, Clone, Copy)]
pub enum ScriptStep {
    Succeed(Prediction),
    FailTransient,
}

impl ScriptedModel {
    pub fn always(prediction: Prediction) -> Self {
        Self {
            steps: Mutex::new(VecDeque::new()),
            fallback: prediction,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn scripted(steps: impl IntoIterator<Item = ScriptStep>, fallback: Prediction) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ViolationModel for ScriptedModel {
    async fn predict(&self, _item: &Item) -> Result<Prediction, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.steps.lock().unwrap().pop_front() {
            Some(ScriptStep::Succeed(prediction)) => Ok(prediction),
            Some(ScriptStep::FailTransient) => {
                Err(ModelError::Unavailable("scripted outage".to_string()))
            }
            None => Ok(self.fallback),
        }
    }
}
