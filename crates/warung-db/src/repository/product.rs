//! # Product Repository
//!
//! Database operations for the product catalog.
//!
//! ## Key Operations
//! - CRUD with soft delete
//! - Manual stock updates (conditional, never negative)
//! - Recomputing the unit-count mirror after unit mutations
//!
//! ## The manual_stock Mirror
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock_mode = 'manual'        manual_stock is AUTHORITATIVE            │
//! │  stock_mode = 'unit_tracked'  manual_stock MIRRORS the unit store      │
//! │                                                                         │
//! │  The mirror is recomputed inside a single UPDATE from a subselect,     │
//! │  so it can never drift for longer than one mutation:                   │
//! │                                                                         │
//! │  UPDATE products SET manual_stock =                                    │
//! │      (SELECT COUNT(*) FROM product_units                               │
//! │        WHERE product_id = ?1 AND status = 'in_stock')                  │
//! │  WHERE id = ?1                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use warung_core::Product;

const PRODUCT_COLUMNS: &str = "id, name, category, price_cents, min_stock, \
     stock_mode, manual_stock, is_active, created_at, updated_at";

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products, ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active = 1 ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, price_cents, min_stock,
                stock_mode, manual_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.min_stock)
        .bind(product.stock_mode)
        .bind(product.manual_stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates an existing product.
    ///
    /// ## Returns
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn update(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                category = ?3,
                price_cents = ?4,
                min_stock = ?5,
                stock_mode = ?6,
                manual_stock = ?7,
                is_active = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price_cents)
        .bind(product.min_stock)
        .bind(product.stock_mode)
        .bind(product.manual_stock)
        .bind(product.is_active)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Recomputes the `manual_stock` mirror for a unit-tracked product.
    ///
    /// Runs as a single UPDATE with a subselect so the mirror and the
    /// unit store cannot be observed out of sync by another connection.
    pub async fn recompute_unit_mirror(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Recomputing unit-count mirror");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products SET
                manual_stock = (
                    SELECT COUNT(*) FROM product_units
                    WHERE product_id = ?1 AND status = 'in_stock'
                ),
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sales, units and audit results still reference the row
    /// (orphan retention), so it is never physically deleted.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use warung_core::StockMode;

    fn sample_product(name: &str, mode: StockMode, manual_stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: generate_product_id(),
            name: name.to_string(),
            category: "minuman".to_string(),
            price_cents: 500_000,
            min_stock: 5,
            stock_mode: mode,
            manual_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = sample_product("Teh Botol", StockMode::Manual, 10);
        repo.insert(&product).await.unwrap();

        let loaded = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Teh Botol");
        assert_eq!(loaded.stock_mode, StockMode::Manual);
        assert_eq!(loaded.manual_stock, 10);
    }

    #[tokio::test]
    async fn test_list_active_skips_soft_deleted() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let keep = sample_product("Kopi", StockMode::Manual, 3);
        let drop = sample_product("Susu", StockMode::Manual, 3);
        repo.insert(&keep).await.unwrap();
        repo.insert(&drop).await.unwrap();

        repo.soft_delete(&drop.id).await.unwrap();

        let active = repo.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, keep.id);

        // Soft-deleted row is retained, not gone
        assert!(repo.get_by_id(&drop.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_missing_product() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let ghost = sample_product("Ghost", StockMode::Manual, 0);
        let err = repo.update(&ghost).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
