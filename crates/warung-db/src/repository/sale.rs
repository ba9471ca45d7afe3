//! # Sale Repository
//!
//! Read-side database operations for sales. Sales are written only by
//! the [`SaleLedger`](crate::service::sale_ledger::SaleLedger) inside a
//! transaction and are immutable afterwards, so this repository exposes
//! no update or delete.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use warung_core::{PaymentMethod, Sale, SaleItem};

const ITEM_COLUMNS: &str =
    "id, sale_id, product_id, product_name, quantity, price_cents, total_cents, created_at";

/// Raw sale row; `scanned_tags` is stored as a JSON array of strings.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    total_cents: i64,
    payment_method: PaymentMethod,
    scanned_tags: String,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> DbResult<Sale> {
        let scanned_tags: Vec<String> = serde_json::from_str(&self.scanned_tags)?;
        Ok(Sale {
            id: self.id,
            total_cents: self.total_cents,
            payment_method: self.payment_method,
            scanned_tags,
            created_at: self.created_at,
            items,
        })
    }
}

/// Repository for sale read operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale with its items by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(
            "SELECT id, total_cents, payment_method, scanned_tags, created_at \
             FROM sales WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let items = self.get_items(id).await?;
                Ok(Some(row.into_sale(items)?))
            }
            None => Ok(None),
        }
    }

    /// Gets all items for a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists recent sales (without items), newest first.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let rows = sqlx::query_as::<_, SaleRow>(
            "SELECT id, total_cents, payment_method, scanned_tags, created_at \
             FROM sales ORDER BY created_at DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| row.into_sale(Vec::new()))
            .collect()
    }

    /// Counts all sales (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
