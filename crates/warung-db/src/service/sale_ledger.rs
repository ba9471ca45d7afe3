//! # Sale Ledger
//!
//! Transactional sale creation. A sale either commits in full - sale
//! row, line items, consumed units, mirror update, movements - or not
//! at all.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │ BEGIN                                                                   │
//! │   for each line: load product, check ready stock, price the line       │
//! │   INSERT sales (so items and units can reference it)                   │
//! │   for each line:                                                       │
//! │     manual       → conditional decrement (guarded, never negative)     │
//! │     unit-tracked → consume N units oldest-first, each by               │
//! │                    conditional UPDATE checked via rows_affected,       │
//! │                    refetching candidates on a lost race (bounded)      │
//! │                  → recompute unit-count mirror                         │
//! │     INSERT sale_items (name/price snapshot)                            │
//! │     INSERT stock_movements (out, 'sale')                               │
//! │ COMMIT                                                                  │
//! │                                                                         │
//! │ Any error before COMMIT rolls everything back: no partial sale,        │
//! │ no stranded 'sold' units, ready stock unchanged.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::DbResult;
use warung_core::validation::validate_quantity;
use warung_core::{
    CoreError, PaymentMethod, Product, Sale, SaleItem, SaleLine, StockMode, ValidationError,
    MAX_CONSUME_RETRIES,
};

const PRODUCT_COLUMNS: &str = "id, name, category, price_cents, min_stock, \
     stock_mode, manual_stock, is_active, created_at, updated_at";

/// Writes the transactional sale ledger.
#[derive(Debug, Clone)]
pub struct SaleLedger {
    pool: SqlitePool,
}

impl SaleLedger {
    /// Creates a new SaleLedger over a connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        SaleLedger { pool }
    }

    /// Creates a sale from priced catalog lines.
    ///
    /// `scanned_tags` is whatever the register scanned while building
    /// the basket; it is stored verbatim on the sale for traceability.
    ///
    /// ## Errors
    /// * `CoreError::ProductNotFound` - unknown or inactive product
    /// * `CoreError::InsufficientStock` - a line exceeds ready stock;
    ///   the whole sale is rejected and nothing is committed
    pub async fn create_sale(
        &self,
        lines: &[SaleLine],
        payment_method: PaymentMethod,
        scanned_tags: &[String],
    ) -> DbResult<Sale> {
        if lines.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "items".to_string(),
            })
            .into());
        }
        for line in lines {
            validate_quantity(line.quantity).map_err(CoreError::from)?;
        }

        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        // Pricing pass: load each product and verify ready stock up
        // front, so a doomed sale fails before any row is written.
        let mut priced: Vec<(Product, i64)> = Vec::with_capacity(lines.len());
        let mut total_cents: i64 = 0;

        for line in lines {
            let product = sqlx::query_as::<_, Product>(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND is_active = 1"
            ))
            .bind(&line.product_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

            let available = match product.stock_mode {
                StockMode::Manual => product.manual_stock,
                StockMode::UnitTracked => ready_count(&mut tx, &product.id).await?,
            };
            if line.quantity > available {
                return Err(CoreError::InsufficientStock {
                    product_id: product.id,
                    available,
                    requested: line.quantity,
                }
                .into());
            }

            total_cents += product.price_cents * line.quantity;
            priced.push((product, line.quantity));
        }

        let tags_json = serde_json::to_string(scanned_tags)?;
        sqlx::query(
            r#"
            INSERT INTO sales (id, total_cents, payment_method, scanned_tags, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&sale_id)
        .bind(total_cents)
        .bind(payment_method)
        .bind(&tags_json)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // Consumption pass
        let mut items = Vec::with_capacity(priced.len());
        for (product, quantity) in &priced {
            match product.stock_mode {
                StockMode::Manual => {
                    decrement_manual(&mut tx, product, *quantity, now).await?;
                }
                StockMode::UnitTracked => {
                    consume_units(&mut tx, &product.id, *quantity, &sale_id, now).await?;
                    recompute_mirror(&mut tx, &product.id, now).await?;
                }
            }

            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                quantity: *quantity,
                price_cents: product.price_cents,
                total_cents: product.price_cents * quantity,
                created_at: now,
            };
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, product_name,
                    quantity, price_cents, total_cents, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price_cents)
            .bind(item.total_cents)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO stock_movements (
                    id, product_id, kind, quantity, reason, reference_id, created_at
                ) VALUES (?1, ?2, 'out', ?3, 'sale', ?4, ?5)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&product.id)
            .bind(*quantity)
            .bind(&sale_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            items.push(item);
        }

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            total_cents = %total_cents,
            lines = lines.len(),
            "Sale committed"
        );

        Ok(Sale {
            id: sale_id,
            total_cents,
            payment_method,
            scanned_tags: scanned_tags.to_vec(),
            created_at: now,
            items,
        })
    }
}

/// Ready (tagged, in-stock) unit count inside the transaction.
async fn ready_count(tx: &mut Transaction<'_, Sqlite>, product_id: &str) -> DbResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM product_units
        WHERE product_id = ?1 AND status = 'in_stock' AND tag IS NOT NULL
        "#,
    )
    .bind(product_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(count)
}

/// Conditional manual-stock decrement. The `manual_stock >= ?` guard in
/// the WHERE clause is what keeps the stock from going negative under a
/// concurrent sale; rows_affected = 0 means the guard failed.
async fn decrement_manual(
    tx: &mut Transaction<'_, Sqlite>,
    product: &Product,
    quantity: i64,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET manual_stock = manual_stock - ?2, updated_at = ?3
        WHERE id = ?1 AND manual_stock >= ?2
        "#,
    )
    .bind(&product.id)
    .bind(quantity)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        let available: i64 = sqlx::query_scalar("SELECT manual_stock FROM products WHERE id = ?1")
            .bind(&product.id)
            .fetch_one(&mut **tx)
            .await?;
        return Err(CoreError::InsufficientStock {
            product_id: product.id.clone(),
            available,
            requested: quantity,
        }
        .into());
    }

    Ok(())
}

/// Consumes `quantity` sellable units oldest-first.
///
/// Selection gives only candidates; each unit is taken by a conditional
/// `in_stock → sold` UPDATE checked via rows_affected. A lost race
/// (rows_affected = 0) drops the candidate and the next round refetches
/// a fresh list, bounded by `MAX_CONSUME_RETRIES`. On exhaustion nothing
/// is committed - the enclosing transaction rolls back.
async fn consume_units(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: &str,
    quantity: i64,
    sale_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    let mut remaining = quantity;

    for _round in 0..=MAX_CONSUME_RETRIES {
        if remaining == 0 {
            return Ok(());
        }

        let candidates: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT id FROM product_units
            WHERE product_id = ?1 AND status = 'in_stock' AND tag IS NOT NULL
            ORDER BY created_at, id
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(remaining)
        .fetch_all(&mut **tx)
        .await?;

        if candidates.is_empty() {
            break;
        }

        for unit_id in candidates {
            let result = sqlx::query(
                r#"
                UPDATE product_units
                SET status = 'sold', sale_id = ?2, sold_at = ?3
                WHERE id = ?1 AND status = 'in_stock'
                "#,
            )
            .bind(&unit_id)
            .bind(sale_id)
            .bind(now)
            .execute(&mut **tx)
            .await?;

            if result.rows_affected() == 1 {
                remaining -= 1;
            }
        }
    }

    if remaining == 0 {
        return Ok(());
    }

    // Units consumed so far in this transaction roll back with it, so
    // they still count as available from the caller's perspective.
    let still_ready = ready_count(tx, product_id).await?;
    Err(CoreError::InsufficientStock {
        product_id: product_id.to_string(),
        available: still_ready + (quantity - remaining),
        requested: quantity,
    }
    .into())
}

/// Recomputes the unit-count mirror within the transaction.
async fn recompute_mirror(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
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
    .bind(product_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::pool::{Database, DbConfig};
    use crate::service::stock::NewProduct;
    use warung_core::{MovementKind, UnitStatus};

    async fn setup() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn tracked_product(db: &Database, name: &str, tags: &[&str]) -> Product {
        let product = db
            .stock()
            .create_product(NewProduct {
                name: name.to_string(),
                category: "minuman".to_string(),
                price_cents: 500_000,
                min_stock: 1,
                stock_mode: StockMode::UnitTracked,
                initial_stock: 0,
            })
            .await
            .unwrap();
        for tag in tags {
            db.stock().assign_tag(&product.id, tag).await.unwrap();
        }
        product
    }

    async fn manual_product(db: &Database, name: &str, stock: i64) -> Product {
        db.stock()
            .create_product(NewProduct {
                name: name.to_string(),
                category: "makanan".to_string(),
                price_cents: 200_000,
                min_stock: 2,
                stock_mode: StockMode::Manual,
                initial_stock: stock,
            })
            .await
            .unwrap()
    }

    fn line(product: &Product, quantity: i64) -> SaleLine {
        SaleLine {
            product_id: product.id.clone(),
            quantity,
        }
    }

    #[tokio::test]
    async fn test_sale_consumes_oldest_units_first() {
        let db = setup().await;
        let product = tracked_product(&db, "Teh Botol", &["T-1", "T-2", "T-3"]).await;

        let sale = db
            .sale_ledger()
            .create_sale(&[line(&product, 2)], PaymentMethod::Cash, &["T-1".into()])
            .await
            .unwrap();

        assert_eq!(sale.total_cents, 1_000_000);
        assert_eq!(sale.items.len(), 1);
        assert_eq!(sale.items[0].product_name, "Teh Botol");
        assert_eq!(sale.scanned_tags, vec!["T-1".to_string()]);

        let units = db.units().list_for_product(&product.id).await.unwrap();
        let sold: Vec<_> = units
            .iter()
            .filter(|u| u.status == UnitStatus::Sold)
            .collect();
        assert_eq!(sold.len(), 2);
        // Oldest-first: T-1 and T-2 were assigned before T-3
        assert!(sold.iter().all(|u| u.sale_id.as_deref() == Some(sale.id.as_str())));
        assert!(units
            .iter()
            .any(|u| u.tag.as_deref() == Some("T-3") && u.status == UnitStatus::InStock));

        // Mirror tracks the remaining in-stock unit
        let reloaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.manual_stock, 1);
    }

    #[tokio::test]
    async fn test_insufficient_units_rejects_whole_sale() {
        let db = setup().await;
        let product = tracked_product(&db, "Aqua", &["A-1"]).await;

        let err = db
            .sale_ledger()
            .create_sale(&[line(&product, 2)], PaymentMethod::Cash, &[])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 1,
                requested: 2,
                ..
            })
        ));

        // Rolled back: nothing committed, unit untouched
        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(db.units().ready_count(&product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_untagged_units_are_not_sellable() {
        let db = setup().await;
        let product = tracked_product(&db, "Kopi", &[]).await;

        // Two physical units exist, neither tagged
        for _ in 0..2 {
            db.units()
                .insert(&warung_core::Unit {
                    id: crate::repository::unit::generate_unit_id(),
                    product_id: product.id.clone(),
                    tag: None,
                    status: UnitStatus::InStock,
                    sold_at: None,
                    sale_id: None,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let err = db
            .sale_ledger()
            .create_sale(&[line(&product, 1)], PaymentMethod::Cash, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_manual_stock_decrement_and_movement() {
        let db = setup().await;
        let product = manual_product(&db, "Indomie", 10).await;

        let sale = db
            .sale_ledger()
            .create_sale(&[line(&product, 4)], PaymentMethod::Qris, &[])
            .await
            .unwrap();

        let reloaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.manual_stock, 6);

        let movements = db.movements().list_for_reference(&sale.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].kind, MovementKind::Out);
        assert_eq!(movements[0].quantity, 4);
        assert_eq!(movements[0].reason, "sale");
    }

    #[tokio::test]
    async fn test_manual_overdraw_rejected() {
        let db = setup().await;
        let product = manual_product(&db, "Gula", 3).await;

        let err = db
            .sale_ledger()
            .create_sale(&[line(&product, 5)], PaymentMethod::Cash, &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 3,
                requested: 5,
                ..
            })
        ));

        let reloaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.manual_stock, 3);
    }

    #[tokio::test]
    async fn test_mixed_basket_is_all_or_nothing() {
        let db = setup().await;
        let tracked_p = tracked_product(&db, "Rokok", &["R-1", "R-2"]).await;
        let manual_p = manual_product(&db, "Korek", 1).await;

        // Manual line overdraws, so the already-valid tracked line must
        // roll back with it
        let err = db
            .sale_ledger()
            .create_sale(
                &[line(&tracked_p, 1), line(&manual_p, 3)],
                PaymentMethod::Cash,
                &[],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));

        assert_eq!(db.units().ready_count(&tracked_p.id).await.unwrap(), 2);
        assert_eq!(db.sales().count().await.unwrap(), 0);
        assert_eq!(db.movements().count().await.unwrap(), 1); // only "initial"
    }

    #[tokio::test]
    async fn test_sale_snapshot_survives_price_change() {
        let db = setup().await;
        let product = manual_product(&db, "Sabun", 5).await;

        let sale = db
            .sale_ledger()
            .create_sale(&[line(&product, 1)], PaymentMethod::Cash, &[])
            .await
            .unwrap();

        // Price changes later; the sale keeps the frozen snapshot
        db.stock()
            .update_product(
                &product.id,
                crate::service::stock::ProductPatch {
                    price_cents: Some(999_999),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let loaded = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.items[0].price_cents, 200_000);
        assert_eq!(loaded.total_cents, 200_000);
    }

    #[tokio::test]
    async fn test_empty_and_invalid_lines_rejected() {
        let db = setup().await;
        let product = manual_product(&db, "Teh", 5).await;

        let ledger = db.sale_ledger();
        assert!(ledger
            .create_sale(&[], PaymentMethod::Cash, &[])
            .await
            .is_err());
        assert!(ledger
            .create_sale(&[line(&product, 0)], PaymentMethod::Cash, &[])
            .await
            .is_err());
        assert!(ledger
            .create_sale(&[line(&product, 1000)], PaymentMethod::Cash, &[])
            .await
            .is_err());
    }
}
