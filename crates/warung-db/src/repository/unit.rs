//! # Unit Repository
//!
//! Database operations for the unit store: one row per physical
//! inventory unit.
//!
//! ## Conditional Consume (CAS)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Race-Free Unit Consumption                             │
//! │                                                                         │
//! │  ❌ WRONG: select-then-mutate (two terminals can sell the same unit)   │
//! │     SELECT id FROM product_units WHERE status = 'in_stock' ...         │
//! │     UPDATE product_units SET status = 'sold' WHERE id = ?              │
//! │                                                                         │
//! │  ✅ CORRECT: conditional transition, checked by rows_affected          │
//! │     UPDATE product_units                                               │
//! │        SET status = 'sold', sale_id = ?, sold_at = ?                   │
//! │      WHERE id = ? AND status = 'in_stock'                              │
//! │                                                                         │
//! │  rows_affected = 0 → another sale won this unit; refetch and retry     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use warung_core::Unit;

const UNIT_COLUMNS: &str = "id, product_id, tag, status, sold_at, sale_id, created_at";

/// Per-product stock counts derived from the unit store in one pass.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnitStockCount {
    pub product_id: String,
    /// Units with a tag, regardless of status.
    pub barcode_count: i64,
    /// Units with a tag AND status in_stock - the sellable quantity.
    pub ready_count: i64,
}

/// Repository for unit store operations.
#[derive(Debug, Clone)]
pub struct UnitRepository {
    pool: SqlitePool,
}

impl UnitRepository {
    /// Creates a new UnitRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UnitRepository { pool }
    }

    /// Gets a unit by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Unit>> {
        let unit = sqlx::query_as::<_, Unit>(&format!(
            "SELECT {UNIT_COLUMNS} FROM product_units WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    /// Inserts a new unit.
    pub async fn insert(&self, unit: &Unit) -> DbResult<()> {
        debug!(id = %unit.id, product_id = %unit.product_id, "Inserting unit");

        sqlx::query(
            r#"
            INSERT INTO product_units (
                id, product_id, tag, status, sold_at, sale_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.product_id)
        .bind(&unit.tag)
        .bind(unit.status)
        .bind(unit.sold_at)
        .bind(&unit.sale_id)
        .bind(unit.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Finds the oldest free unit of a product: in stock and untagged.
    ///
    /// Used by tag assignment - an existing free unit absorbs the tag
    /// before any new unit is created.
    pub async fn find_free_untagged(&self, product_id: &str) -> DbResult<Option<Unit>> {
        let unit = sqlx::query_as::<_, Unit>(&format!(
            r#"
            SELECT {UNIT_COLUMNS} FROM product_units
            WHERE product_id = ?1 AND status = 'in_stock' AND tag IS NULL
            ORDER BY created_at, id
            LIMIT 1
            "#
        ))
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(unit)
    }

    /// Attaches a tag to an existing unit.
    ///
    /// The partial UNIQUE index on `tag` turns a lost race into a
    /// `DbError::UniqueViolation`, which the stock service translates to
    /// `DuplicateTag`.
    pub async fn attach_tag(&self, unit_id: &str, tag: &str) -> DbResult<()> {
        debug!(unit_id = %unit_id, tag = %tag, "Attaching tag to unit");

        sqlx::query("UPDATE product_units SET tag = ?2 WHERE id = ?1")
            .bind(unit_id)
            .bind(tag)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Checks whether any unit of any product carries this tag.
    pub async fn tag_exists(&self, tag: &str) -> DbResult<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM product_units WHERE tag = ?1")
                .bind(tag)
                .fetch_one(&self.pool)
                .await?;

        Ok(count > 0)
    }

    /// Finds all units carrying a tag, in deterministic order.
    ///
    /// The UNIQUE index means at most one row should come back; callers
    /// treat more than one as a data-integrity anomaly to be logged.
    pub async fn find_by_tag(&self, tag: &str) -> DbResult<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>(&format!(
            r#"
            SELECT {UNIT_COLUMNS} FROM product_units
            WHERE tag = ?1
            ORDER BY created_at, id
            "#
        ))
        .bind(tag)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    /// Lists all units of a product, oldest first.
    pub async fn list_for_product(&self, product_id: &str) -> DbResult<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>(&format!(
            r#"
            SELECT {UNIT_COLUMNS} FROM product_units
            WHERE product_id = ?1
            ORDER BY created_at, id
            "#
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    /// Selects sellable units (tagged, in stock) oldest-first.
    ///
    /// This is only a candidate list: actual consumption must go through
    /// [`consume`](Self::consume), which re-checks the status.
    pub async fn select_sellable(&self, product_id: &str, limit: i64) -> DbResult<Vec<Unit>> {
        let units = sqlx::query_as::<_, Unit>(&format!(
            r#"
            SELECT {UNIT_COLUMNS} FROM product_units
            WHERE product_id = ?1 AND status = 'in_stock' AND tag IS NOT NULL
            ORDER BY created_at, id
            LIMIT ?2
            "#
        ))
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(units)
    }

    /// Atomically transitions one unit `in_stock → sold`.
    ///
    /// ## Returns
    /// * `Ok(true)` - this call consumed the unit
    /// * `Ok(false)` - the unit was no longer in stock (lost race)
    pub async fn consume(
        &self,
        unit_id: &str,
        sale_id: &str,
        sold_at: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE product_units
            SET status = 'sold', sale_id = ?2, sold_at = ?3
            WHERE id = ?1 AND status = 'in_stock'
            "#,
        )
        .bind(unit_id)
        .bind(sale_id)
        .bind(sold_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Counts ready (tagged, in-stock) units for one product.
    pub async fn ready_count(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM product_units
            WHERE product_id = ?1 AND status = 'in_stock' AND tag IS NOT NULL
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Derives stock counts for ALL products in one grouped pass.
    ///
    /// This is the read half of the stock aggregator: one bulk query
    /// over the unit store regardless of catalog size, never a per-product
    /// loop of COUNT queries.
    pub async fn stock_counts(&self) -> DbResult<Vec<UnitStockCount>> {
        let counts = sqlx::query_as::<_, UnitStockCount>(
            r#"
            SELECT
                product_id,
                SUM(CASE WHEN tag IS NOT NULL THEN 1 ELSE 0 END) AS barcode_count,
                SUM(CASE WHEN tag IS NOT NULL AND status = 'in_stock' THEN 1 ELSE 0 END)
                    AS ready_count
            FROM product_units
            GROUP BY product_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

/// Helper to generate a new unit ID.
pub fn generate_unit_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::product::generate_product_id;
    use warung_core::{Product, StockMode, UnitStatus};

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            name: "Rokok".to_string(),
            category: "umum".to_string(),
            price_cents: 2_500_000,
            min_stock: 2,
            stock_mode: StockMode::UnitTracked,
            manual_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap();
        (db, product.id)
    }

    fn in_stock_unit(product_id: &str, tag: Option<&str>) -> Unit {
        Unit {
            id: generate_unit_id(),
            product_id: product_id.to_string(),
            tag: tag.map(str::to_string),
            status: UnitStatus::InStock,
            sold_at: None,
            sale_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_tag_unique_across_products() {
        let (db, product_a) = setup().await;
        let units = db.units();

        let now = Utc::now();
        let product_b = Product {
            id: generate_product_id(),
            name: "Korek".to_string(),
            category: "umum".to_string(),
            price_cents: 300_000,
            min_stock: 1,
            stock_mode: StockMode::UnitTracked,
            manual_stock: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product_b).await.unwrap();

        units
            .insert(&in_stock_unit(&product_a, Some("TAG-1")))
            .await
            .unwrap();

        // Same tag on a different product's unit must hit the UNIQUE index
        let err = units
            .insert(&in_stock_unit(&product_b.id, Some("TAG-1")))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_untagged_units_do_not_collide() {
        let (db, product_id) = setup().await;
        let units = db.units();

        units.insert(&in_stock_unit(&product_id, None)).await.unwrap();
        units.insert(&in_stock_unit(&product_id, None)).await.unwrap();

        assert_eq!(units.ready_count(&product_id).await.unwrap(), 0);
        assert_eq!(units.list_for_product(&product_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_consume_is_conditional() {
        let (db, product_id) = setup().await;
        let units = db.units();

        let unit = in_stock_unit(&product_id, Some("TAG-9"));
        units.insert(&unit).await.unwrap();

        let now = Utc::now();
        assert!(units.consume(&unit.id, "sale-1", now).await.unwrap());
        // Second attempt loses: the unit is already sold
        assert!(!units.consume(&unit.id, "sale-2", now).await.unwrap());

        let sold = units.get_by_id(&unit.id).await.unwrap().unwrap();
        assert_eq!(sold.status, UnitStatus::Sold);
        assert_eq!(sold.sale_id.as_deref(), Some("sale-1"));
        assert!(sold.sold_at.is_some());
    }

    #[tokio::test]
    async fn test_stock_counts_single_pass() {
        let (db, product_id) = setup().await;
        let units = db.units();

        units
            .insert(&in_stock_unit(&product_id, Some("A")))
            .await
            .unwrap();
        units
            .insert(&in_stock_unit(&product_id, Some("B")))
            .await
            .unwrap();
        units.insert(&in_stock_unit(&product_id, None)).await.unwrap();

        let sold = in_stock_unit(&product_id, Some("C"));
        units.insert(&sold).await.unwrap();
        units.consume(&sold.id, "sale-1", Utc::now()).await.unwrap();

        let counts = units.stock_counts().await.unwrap();
        assert_eq!(counts.len(), 1);
        assert_eq!(counts[0].product_id, product_id);
        // Tagged: A, B, C. Ready: A, B (C sold, untagged unit not counted)
        assert_eq!(counts[0].barcode_count, 3);
        assert_eq!(counts[0].ready_count, 2);
    }
}
