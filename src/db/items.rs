use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::db::store::StoreError;
use crate::models::item::Item;

/// Read access to ads. A missing item is a permanent condition for the
/// pipeline: the referenced ad will not appear on a retry.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get(&self, item_id: i64) -> Result<Option<Item>, StoreError>;
}

/// PostgreSQL-backed item store joining each ad with its seller's
/// verification flag.
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn get(&self, item_id: i64) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT a.id, a.seller_id, a.name, a.description,
                   a.category, a.images_qty, a.is_closed, a.created_at, a.updated_at,
                   s.is_verified AS seller_is_verified
            FROM ads a
            JOIN sellers s ON a.seller_id = s.id
            WHERE a.id = $1
            "#,
        )
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match row {
            Some(r) => Some(Item {
                id: r.try_get("id")?,
                seller_id: r.try_get("seller_id")?,
                name: r.try_get("name")?,
                description: r.try_get("description")?,
                category: r.try_get("category")?,
                images_qty: r.try_get("images_qty")?,
                is_closed: r.try_get("is_closed")?,
                seller_is_verified: r.try_get("seller_is_verified")?,
                created_at: r.try_get("created_at")?,
                updated_at: r.try_get("updated_at")?,
            }),
            None => None,
        })
    }
}
