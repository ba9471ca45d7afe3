//! # Error Types
//!
//! Domain-specific error types for warung-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  warung-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  warung-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → Caller/UI               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Error Taxonomy
//! - **Validation**: bad input shape, rejected synchronously, never
//!   partially applied.
//! - **Conflict** (`DuplicateTag`, `DuplicateScan`, `TagMismatch`,
//!   `UnitNotAvailable`): caller-correctable, surfaced as a retryable
//!   prompt, never silently swallowed.
//! - **Insufficiency** (`InsufficientStock`): blocks the mutating
//!   operation entirely; no partial sale is committed.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations in the stock ledger
/// and audit engine. They should be caught and translated to operator
/// prompts by the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (unknown ID or soft-deleted).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Operation requires a unit-tracked product.
    ///
    /// ## When This Occurs
    /// - Assigning a tag to a manual-stock product
    /// - Recording a scan against a manual-stock product
    #[error("Product {product_id} does not use unit tracking")]
    NotUnitTracked { product_id: String },

    /// Tag is already attached to a unit, possibly of another product.
    ///
    /// Tags are globally unique across all units of all products; this is
    /// enforced at assignment time.
    #[error("Tag '{tag}' is already assigned to another unit")]
    DuplicateTag { tag: String },

    /// No unit carries the scanned tag.
    #[error("Tag '{tag}' does not match any unit")]
    TagNotFound { tag: String },

    /// Insufficient stock to complete a sale line.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell (qty: 5)
    ///      │
    ///      ▼
    /// ready_stock = 3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 in stock"
    /// ```
    #[error("Insufficient stock for {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// Scanned tag resolves to a different product than the one under audit.
    #[error("Tag '{tag}' belongs to product {actual_product_id}, not {expected_product_id}")]
    TagMismatch {
        tag: String,
        expected_product_id: String,
        actual_product_id: String,
    },

    /// Scanned unit is not in stock (e.g., sold between session start and
    /// the scan attempt). A sold unit must never be counted as physically
    /// present.
    #[error("Unit {unit_id} is not available for counting (status: {status})")]
    UnitNotAvailable { unit_id: String, status: String },

    /// Unit was already recorded for this product in this session.
    ///
    /// Makes the audit engine idempotent against repeated scans of the
    /// same physical item.
    #[error("Unit {unit_id} was already scanned in this session")]
    DuplicateScan { unit_id: String },

    /// No audit session exists for the given date.
    #[error("No audit session for date {0}")]
    SessionNotFound(String),

    /// The session exists but holds no result row for the product.
    #[error("No audit entry for product {product_id} in session {date}")]
    AuditItemNotFound { date: String, product_id: String },

    /// Item is not in the state the requested transition needs.
    ///
    /// ## When This Occurs
    /// - Finalizing an already-completed item
    /// - Finalizing a manual-stock item (manual entries complete directly)
    #[error("Audit item {product_id} is {status}, cannot {operation}")]
    InvalidAuditTransition {
        product_id: String,
        status: String,
        operation: String,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must be zero or greater.
    #[error("{field} must not be negative")]
    MustBeNonNegative { field: String },

    /// Invalid format (e.g., invalid UUID, whitespace in a tag).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for p-1: available 3, requested 5"
        );

        let err = CoreError::DuplicateTag {
            tag: "TAG-001".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Tag 'TAG-001' is already assigned to another unit"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "tag".to_string(),
        };
        assert_eq!(err.to_string(), "tag is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "tag".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
