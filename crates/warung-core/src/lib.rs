//! # warung-core: Pure Business Logic for Warung POS
//!
//! This crate is the **heart** of the unit-level stock ledger. It contains
//! all business rules as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Warung POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ warung-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │ variance  │  │ validation│                  │   │
//! │  │   │  Product  │  │  labels   │  │   rules   │                  │   │
//! │  │   │   Unit    │  │  filters  │  │  checks   │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  warung-db (Database Layer)                     │   │
//! │  │     SQLite unit ledger, sale ledger, audit session engine       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Unit, Sale, AuditResult, etc.)
//! - [`error`] - Domain error types
//! - [`variance`] - Audit variance classification and result filtering
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64), never floats
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;
pub mod variance;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;
pub use variance::{AuditFilter, VarianceLabel};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum refetch-and-retry rounds for unit consumption during a sale.
///
/// ## Why a bound?
/// The precondition check (`quantity <= ready_stock`) and the per-unit
/// conditional transition are not atomic as a pair. A concurrent sale can
/// win individual units between the check and the consumption, so the
/// ledger retries selection with a fresh unit list. The bound keeps a
/// pathological contention storm from looping forever; once exhausted the
/// sale fails with `InsufficientStock` and nothing is committed.
pub const MAX_CONSUME_RETRIES: usize = 3;

/// Maximum quantity of a single line item in a sale.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum length of a scannable unit tag.
pub const MAX_TAG_LENGTH: usize = 64;

/// Zero-padding width of sequential audit report numbers.
///
/// Report 7 renders as "0000007".
pub const REPORT_NUMBER_WIDTH: usize = 7;
