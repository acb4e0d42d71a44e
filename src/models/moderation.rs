use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a moderation task. `Completed` and `Failed` are
/// terminal: once a record reaches either, it never changes again.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Completed,
    Failed,
}

impl ModerationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One row of the result store, keyed by task id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationResult {
    pub id: i64,
    pub item_id: i64,
    pub status: ModerationStatus,
    pub is_violation: Option<bool>,
    pub probability: Option<f64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Model output for a single item: violation flag plus the probability the
/// flag was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub is_violation: bool,
    pub probability: f64,
}

/// Request to submit an ad for asynchronous moderation.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitRequest {
    #[garde(range(min = 1))]
    pub item_id: i64,
}

/// Response after submitting an ad for moderation.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: i64,
    pub status: ModerationStatus,
    pub message: String,
}

/// Response for querying a moderation task.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModerationStatusResponse {
    pub task_id: i64,
    pub status: ModerationStatus,
    pub is_violation: Option<bool>,
    pub probability: Option<f64>,
    pub error_message: Option<String>,
}

impl From<ModerationResult> for ModerationStatusResponse {
    fn from(result: ModerationResult) -> Self {
        Self {
            task_id: result.id,
            status: result.status,
            is_violation: result.is_violation,
            probability: result.probability,
            error_message: result.error_message,
        }
    }
}

/// Full ad payload for the synchronous rule-based predict endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct PredictRequest {
    #[garde(range(min = 1))]
    pub seller_id: i64,
    #[garde(skip)]
    pub is_verified_seller: bool,
    #[garde(range(min = 1))]
    pub item_id: i64,
    #[garde(length(min = 1))]
    pub name: String,
    #[garde(length(min = 1))]
    pub description: String,
    #[garde(range(min = 0))]
    pub category: i32,
    #[garde(range(min = 0))]
    pub images_qty: i32,
}
