//! # Domain Types
//!
//! Core domain types for the unit-level stock ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Unit       │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  stock_mode     │   │  tag (Option)   │   │  items[]        │       │
//! │  │  manual_stock   │   │  status         │   │  scanned_tags[] │       │
//! │  │  min_stock      │   │  sale_id (FK)   │   │  total_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  AuditSession   │   │  AuditResult    │   │ StockMovement   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  date (unique)  │   │  system_stock   │   │  In / Out       │       │
//! │  │  results[]      │   │  physical_stock │   │  append-only    │       │
//! │  └─────────────────┘   │  scanned_units  │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Stock Mode
// =============================================================================

/// How a product's stock is tracked.
///
/// Modeled as a tagged variant rather than a boolean flag so the stock
/// aggregator and sale ledger can dispatch exhaustively - a new mode
/// forces every `match` to be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockMode {
    /// Stock derived from counting tagged physical units in the unit store.
    UnitTracked,
    /// Stock maintained as a plain integer on the product record.
    Manual,
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product (SKU).
///
/// For `StockMode::Manual` products, `manual_stock` is the authoritative
/// stock. For `StockMode::UnitTracked` products it is only a cached
/// mirror of the in-stock unit count and is recomputed after every unit
/// mutation - it must never drift from the unit store's true count for
/// more than the duration of one mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Category label for grouping.
    pub category: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Low-stock threshold used by audit variance classification.
    pub min_stock: i64,

    /// How stock is tracked for this product.
    pub stock_mode: StockMode,

    /// Authoritative stock (manual mode) or cached unit-count mirror
    /// (unit-tracked mode). Invariant: never negative.
    pub manual_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// True when stock is derived from the unit store.
    #[inline]
    pub fn is_unit_tracked(&self) -> bool {
        self.stock_mode == StockMode::UnitTracked
    }
}

// =============================================================================
// Unit
// =============================================================================

/// Lifecycle status of a physical inventory unit.
///
/// A unit transitions `InStock → Sold` only through sale consumption and
/// never transitions back (returns/restocking are out of scope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    /// Unit is on the shelf and may be sold (once tagged).
    InStock,
    /// Unit was consumed by a sale; carries the sale reference.
    Sold,
}

impl UnitStatus {
    /// Stable string form, used in error messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::InStock => "in_stock",
            UnitStatus::Sold => "sold",
        }
    }
}

/// One physical inventory unit, owned exclusively by its product.
///
/// A unit with `tag = None` exists but cannot be counted as ready until
/// tagged. When non-null, the tag is globally unique across all units of
/// all products.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Unit {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Owning product.
    pub product_id: String,

    /// Scannable identifier, unique across the whole store when set.
    pub tag: Option<String>,

    /// Lifecycle status.
    pub status: UnitStatus,

    /// When the unit was sold. Set together with `sale_id`.
    pub sold_at: Option<DateTime<Utc>>,

    /// Sale that consumed this unit. Invariant: present iff `status = Sold`.
    pub sale_id: Option<String>,

    /// When the unit record was created.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
///
/// The QRIS provider handshake itself is out of scope; the ledger only
/// records the terminal outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// QRIS payment reported successful by the external provider.
    Qris,
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale. Immutable once created - never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    /// Tags scanned at the register while building this sale.
    pub scanned_tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Line items, snapshotting product name and price at time of sale.
    pub items: Vec<SaleItem>,
}

/// A line item in a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub product_name: String,
    /// Quantity sold.
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub price_cents: i64,
    /// Line total (price × quantity).
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

/// A requested sale line, before pricing and consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: String,
    pub quantity: i64,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock entering the store (restock, upward adjustment).
    In,
    /// Stock leaving the store (sale, downward adjustment).
    Out,
}

/// An append-only stock movement record. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub kind: MovementKind,
    pub quantity: i64,
    /// Why the stock moved: "sale", "adjustment", ...
    pub reason: String,
    /// ID of the record that caused the movement (e.g., sale ID).
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit Session
// =============================================================================

/// Per-product completion state within an audit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Counting in progress (or not started).
    Pending,
    /// Count frozen by explicit finalize or manual entry.
    Completed,
}

impl AuditStatus {
    /// Stable string form, used in error messages and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Completed => "completed",
        }
    }
}

/// Reconciliation state for one product within an audit session.
///
/// `system_stock` is a snapshot taken when the product entered the
/// session; it is deliberately NOT refreshed by concurrent sales.
/// `physical_stock` stays `None` until the first observation arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResult {
    pub product_id: String,
    /// Product name at session time (frozen for the report).
    pub product_name: String,
    pub stock_mode: StockMode,
    /// Ready stock recorded when this product entered the session.
    pub system_stock: i64,
    /// Low-stock threshold at session time (frozen).
    pub min_stock: i64,
    /// Physically counted stock; `None` while never counted.
    pub physical_stock: Option<i64>,
    /// Unit IDs confirmed present by scanning, in scan order.
    pub scanned_unit_ids: Vec<String>,
    pub status: AuditStatus,
    pub updated_at: DateTime<Utc>,
}

impl AuditResult {
    /// Physical minus system count, defined only once a count exists.
    #[inline]
    pub fn variance(&self) -> Option<i64> {
        self.physical_stock.map(|p| p - self.system_stock)
    }
}

/// A calendar-day reconciliation session across all products.
///
/// At most one session exists per calendar date; re-opening an existing
/// date loads prior results instead of overwriting them. The session
/// stays live and resumable indefinitely - closing it only exports an
/// immutable numbered [`AuditReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSession {
    /// Calendar date key (YYYY-MM-DD).
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Per-product results, ordered by product name.
    pub results: Vec<AuditResult>,
}

impl AuditSession {
    /// Looks up the result for a product, if any.
    pub fn result(&self, product_id: &str) -> Option<&AuditResult> {
        self.results.iter().find(|r| r.product_id == product_id)
    }
}

/// What to do with prior scans when a completed item is re-opened.
///
/// The observed behavior of re-audit is ambiguous, so the policy is an
/// explicit parameter instead of a hard-coded guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReopenPolicy {
    /// Keep the accumulated scans; new scans append to them.
    KeepScans,
    /// Discard prior scans and count from scratch.
    ResetScans,
}

// =============================================================================
// Audit Report
// =============================================================================

/// One classified line of an audit report or live overview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLine {
    pub product_id: String,
    pub product_name: String,
    pub system_stock: i64,
    pub min_stock: i64,
    pub physical_stock: Option<i64>,
    pub variance: Option<i64>,
    pub status: AuditStatus,
    pub label: crate::variance::VarianceLabel,
}

/// An immutable, sequentially numbered point-in-time audit export.
///
/// Distinct from the resumable by-date [`AuditSession`]: the report is a
/// frozen snapshot, the session remains live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Sequential integer ID from the counter store.
    pub id: i64,
    /// Zero-padded rendering of `id` (e.g., "0000012").
    pub report_number: String,
    pub session_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<AuditLine>,
}

// =============================================================================
// Aggregated Stock View
// =============================================================================

/// A product joined with its derived stock counts.
///
/// `ready_stock` is the sellable quantity: for unit-tracked products the
/// count of tagged, unsold units; for manual products the manual stock.
/// Always recomputed from source units - never served from a stale cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductWithStock {
    #[serde(flatten)]
    pub product: Product,
    /// Sellable quantity (tagged AND in stock, or manual stock).
    pub ready_stock: i64,
    /// Count of tagged units regardless of status. Zero for manual products.
    pub barcode_count: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn result(system: i64, physical: Option<i64>) -> AuditResult {
        AuditResult {
            product_id: "p-1".to_string(),
            product_name: "Kopi Susu".to_string(),
            stock_mode: StockMode::UnitTracked,
            system_stock: system,
            min_stock: 0,
            physical_stock: physical,
            scanned_unit_ids: Vec::new(),
            status: AuditStatus::Pending,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_variance_defined_only_when_counted() {
        assert_eq!(result(10, None).variance(), None);
        assert_eq!(result(10, Some(7)).variance(), Some(-3));
        assert_eq!(result(10, Some(12)).variance(), Some(2));
    }

    #[test]
    fn test_unit_status_as_str() {
        assert_eq!(UnitStatus::InStock.as_str(), "in_stock");
        assert_eq!(UnitStatus::Sold.as_str(), "sold");
    }

    #[test]
    fn test_session_result_lookup() {
        let session = AuditSession {
            date: NaiveDate::from_ymd_opt(2026, 8, 28).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            results: vec![result(5, None)],
        };
        assert!(session.result("p-1").is_some());
        assert!(session.result("p-2").is_none());
    }
}
