//! # Stock Service
//!
//! Catalog maintenance, tag assignment, and the stock aggregator.
//!
//! ## The Aggregator's Fixed Query Cost
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  products_with_stock() issues exactly TWO bulk reads:                  │
//! │                                                                         │
//! │    1. SELECT ... FROM products WHERE is_active = 1                     │
//! │    2. SELECT product_id, SUM(...) FROM product_units GROUP BY ...      │
//! │                                                                         │
//! │  joined in memory by product ID. Query count stays flat as the         │
//! │  catalog grows - never a per-product loop of COUNT queries.            │
//! │                                                                         │
//! │  ready_stock   = tagged AND in_stock units   (unit-tracked)            │
//! │                = manual_stock                (manual)                  │
//! │  barcode_count = tagged units, any status    (unit-tracked)            │
//! │                = 0                           (manual)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tag Assignment
//! A new tag first looks for an existing free (in-stock, untagged) unit
//! to absorb it; only when none exists is a fresh unit created. The
//! partial UNIQUE index backs the uniqueness check, so a race between
//! two terminals assigning the same tag surfaces as `DuplicateTag`
//! instead of a second unit.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::movement::{generate_movement_id, MovementRepository};
use crate::repository::product::{generate_product_id, ProductRepository};
use crate::repository::unit::{generate_unit_id, UnitRepository};
use warung_core::validation::{
    validate_price_cents, validate_product_name, validate_stock_level, validate_tag,
};
use warung_core::{
    CoreError, MovementKind, Product, ProductWithStock, StockMode, StockMovement, Unit,
    UnitStatus,
};

/// Input for creating a catalog product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price_cents: i64,
    pub min_stock: i64,
    pub stock_mode: StockMode,
    /// Opening stock for manual products. Ignored for unit-tracked
    /// products, whose stock only ever comes from tagged units.
    pub initial_stock: i64,
}

/// Partial update for a catalog product. `None` fields are left as-is.
///
/// `stock_mode` is deliberately absent: switching a product between
/// tracking modes mid-life would orphan its units or its manual count.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub min_stock: Option<i64>,
    /// New authoritative stock for manual products. The delta against the
    /// current value is recorded as an adjustment movement.
    pub manual_stock: Option<i64>,
}

/// Catalog, unit-store, and stock-aggregation operations.
#[derive(Debug, Clone)]
pub struct StockService {
    products: ProductRepository,
    units: UnitRepository,
    movements: MovementRepository,
}

impl StockService {
    /// Creates a new StockService over a connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        StockService {
            products: ProductRepository::new(pool.clone()),
            units: UnitRepository::new(pool.clone()),
            movements: MovementRepository::new(pool),
        }
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    /// Creates a product. Manual products may carry opening stock, which
    /// is recorded as an inbound movement.
    pub async fn create_product(&self, input: NewProduct) -> DbResult<Product> {
        validate_product_name(&input.name).map_err(CoreError::from)?;
        validate_price_cents(input.price_cents).map_err(CoreError::from)?;
        validate_stock_level(input.min_stock).map_err(CoreError::from)?;
        validate_stock_level(input.initial_stock).map_err(CoreError::from)?;

        let now = Utc::now();
        let manual_stock = match input.stock_mode {
            StockMode::Manual => input.initial_stock,
            StockMode::UnitTracked => 0,
        };

        let product = Product {
            id: generate_product_id(),
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            price_cents: input.price_cents,
            min_stock: input.min_stock,
            stock_mode: input.stock_mode,
            manual_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.products.insert(&product).await?;

        if product.stock_mode == StockMode::Manual && product.manual_stock > 0 {
            self.movements
                .insert(&StockMovement {
                    id: generate_movement_id(),
                    product_id: product.id.clone(),
                    kind: MovementKind::In,
                    quantity: product.manual_stock,
                    reason: "initial".to_string(),
                    reference_id: None,
                    created_at: now,
                })
                .await?;
        }

        info!(id = %product.id, name = %product.name, "Product created");
        Ok(product)
    }

    /// Applies a partial update to a product.
    ///
    /// A manual-stock change is recorded as an adjustment movement for
    /// the delta; for unit-tracked products the `manual_stock` field of
    /// the patch is rejected since their mirror is derived, not set.
    pub async fn update_product(&self, id: &str, patch: ProductPatch) -> DbResult<Product> {
        let mut product = self
            .products
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))?;

        if let Some(name) = patch.name {
            validate_product_name(&name).map_err(CoreError::from)?;
            product.name = name.trim().to_string();
        }
        if let Some(category) = patch.category {
            product.category = category.trim().to_string();
        }
        if let Some(price_cents) = patch.price_cents {
            validate_price_cents(price_cents).map_err(CoreError::from)?;
            product.price_cents = price_cents;
        }
        if let Some(min_stock) = patch.min_stock {
            validate_stock_level(min_stock).map_err(CoreError::from)?;
            product.min_stock = min_stock;
        }

        let mut adjustment: Option<i64> = None;
        if let Some(manual_stock) = patch.manual_stock {
            if product.is_unit_tracked() {
                return Err(CoreError::NotUnitTracked {
                    product_id: product.id.clone(),
                }
                .into());
            }
            validate_stock_level(manual_stock).map_err(CoreError::from)?;
            let delta = manual_stock - product.manual_stock;
            if delta != 0 {
                adjustment = Some(delta);
            }
            product.manual_stock = manual_stock;
        }

        self.products.update(&product).await?;

        if let Some(delta) = adjustment {
            let kind = if delta > 0 {
                MovementKind::In
            } else {
                MovementKind::Out
            };
            self.movements
                .insert(&StockMovement {
                    id: generate_movement_id(),
                    product_id: product.id.clone(),
                    kind,
                    quantity: delta.abs(),
                    reason: "adjustment".to_string(),
                    reference_id: None,
                    created_at: Utc::now(),
                })
                .await?;
        }

        Ok(product)
    }

    /// Soft-deletes a product. Its units, sales, and audit rows remain.
    pub async fn delete_product(&self, id: &str) -> DbResult<()> {
        match self.products.soft_delete(id).await {
            Err(DbError::NotFound { .. }) => {
                Err(CoreError::ProductNotFound(id.to_string()).into())
            }
            other => other,
        }
    }

    /// Gets an active product, mapping absence to the domain error.
    pub async fn get_active_product(&self, id: &str) -> DbResult<Product> {
        match self.products.get_by_id(id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(CoreError::ProductNotFound(id.to_string()).into()),
        }
    }

    // -------------------------------------------------------------------------
    // Tag Assignment
    // -------------------------------------------------------------------------

    /// Assigns a globally unique tag within a product's unit store.
    ///
    /// ## Flow
    /// ```text
    /// validate tag ──► product must be unit-tracked
    ///              ──► tag must not exist anywhere (any product)
    ///              ──► free untagged unit absorbs the tag,
    ///                  otherwise a new in-stock unit is created
    ///              ──► unit-count mirror recomputed
    /// ```
    pub async fn assign_tag(&self, product_id: &str, tag: &str) -> DbResult<Unit> {
        let tag = validate_tag(tag).map_err(CoreError::from)?;

        let product = self.get_active_product(product_id).await?;
        if !product.is_unit_tracked() {
            return Err(CoreError::NotUnitTracked {
                product_id: product.id,
            }
            .into());
        }

        if self.units.tag_exists(&tag).await? {
            return Err(CoreError::DuplicateTag { tag }.into());
        }

        // The pre-check above can lose a race; the UNIQUE index is the
        // authority, so a violation here still maps to DuplicateTag.
        let duplicate = |err: DbError, tag: &str| {
            if err.is_unique_violation() {
                CoreError::DuplicateTag {
                    tag: tag.to_string(),
                }
                .into()
            } else {
                err
            }
        };

        let unit = match self.units.find_free_untagged(product_id).await? {
            Some(mut unit) => {
                self.units
                    .attach_tag(&unit.id, &tag)
                    .await
                    .map_err(|e| duplicate(e, &tag))?;
                unit.tag = Some(tag.clone());
                unit
            }
            None => {
                let unit = Unit {
                    id: generate_unit_id(),
                    product_id: product_id.to_string(),
                    tag: Some(tag.clone()),
                    status: UnitStatus::InStock,
                    sold_at: None,
                    sale_id: None,
                    created_at: Utc::now(),
                };
                self.units
                    .insert(&unit)
                    .await
                    .map_err(|e| duplicate(e, &tag))?;
                unit
            }
        };

        self.products.recompute_unit_mirror(product_id).await?;

        info!(product_id = %product_id, tag = %tag, unit_id = %unit.id, "Tag assigned");
        Ok(unit)
    }

    /// Resolves a scanned tag to its unit and owning product.
    ///
    /// At most one unit should carry a tag; if the store ever holds more,
    /// that is a data-integrity anomaly worth a warning, and the oldest
    /// match wins deterministically.
    pub async fn find_by_tag(&self, tag: &str) -> DbResult<Option<(Product, Unit)>> {
        let tag = validate_tag(tag).map_err(CoreError::from)?;

        let matches = self.units.find_by_tag(&tag).await?;
        if matches.len() > 1 {
            warn!(tag = %tag, count = matches.len(), "Multiple units carry one tag");
        }

        let Some(unit) = matches.into_iter().next() else {
            return Ok(None);
        };

        let product = self
            .products
            .get_by_id(&unit.product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &unit.product_id))?;

        Ok(Some((product, unit)))
    }

    // -------------------------------------------------------------------------
    // Stock Aggregation
    // -------------------------------------------------------------------------

    /// Joins every active product with its derived stock counts.
    ///
    /// Exactly two bulk reads regardless of catalog size.
    pub async fn products_with_stock(&self) -> DbResult<Vec<ProductWithStock>> {
        let products = self.products.list_active().await?;
        let counts = self.units.stock_counts().await?;

        let by_product: HashMap<String, (i64, i64)> = counts
            .into_iter()
            .map(|c| (c.product_id, (c.ready_count, c.barcode_count)))
            .collect();

        let view = products
            .into_iter()
            .map(|product| {
                let (ready_stock, barcode_count) = match product.stock_mode {
                    StockMode::Manual => (product.manual_stock, 0),
                    StockMode::UnitTracked => by_product
                        .get(&product.id)
                        .copied()
                        .unwrap_or((0, 0)),
                };
                ProductWithStock {
                    product,
                    ready_stock,
                    barcode_count,
                }
            })
            .collect();

        Ok(view)
    }

    /// Sellable quantity for one product.
    pub async fn ready_stock(&self, product_id: &str) -> DbResult<i64> {
        let product = self.get_active_product(product_id).await?;
        match product.stock_mode {
            StockMode::Manual => Ok(product.manual_stock),
            StockMode::UnitTracked => self.units.ready_count(product_id).await,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
