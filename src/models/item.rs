use chrono::{DateTime, Utc};

/// A marketplace ad joined with its seller's verification flag. The content
/// fields (name, description, category, images_qty, seller_is_verified) feed
/// both the model features and the prediction-cache fingerprint.
#[derive(Debug, Clone)]
pub struct Item {
    pub id: i64,
    pub seller_id: i64,
    pub name: String,
    pub description: String,
    pub category: i32,
    pub images_qty: i32,
    pub is_closed: bool,
    pub seller_is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
